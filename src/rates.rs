// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Currency-pair rate lookup with a read-through TTL cache. The provider
//! never lets a source failure escape: callers see `None` and decide what
//! that means for them.

use log::warn;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const TABLE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const SYMBOLS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upstream rate feed: a full table relative to one base currency, plus
/// the supported symbol set.
pub trait RateSource {
    fn latest(&self, base: &str) -> anyhow::Result<HashMap<String, Decimal>>;
    fn symbols(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    symbols: HashMap<String, String>,
}

/// `latest?base=X` / `symbols` style HTTP API.
pub struct HttpRateSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRateSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: crate::utils::http_client()?,
        })
    }
}

impl RateSource for HttpRateSource {
    fn latest(&self, base: &str) -> anyhow::Result<HashMap<String, Decimal>> {
        let url = format!("{}/latest?base={}", self.base_url, base);
        let resp: LatestResponse = self.client.get(url).send()?.error_for_status()?.json()?;
        Ok(resp.rates)
    }

    fn symbols(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/symbols", self.base_url);
        let resp: SymbolsResponse = self.client.get(url).send()?.error_for_status()?.json()?;
        let mut codes: Vec<String> = resp.symbols.into_keys().collect();
        codes.sort();
        Ok(codes)
    }
}

pub struct RateProvider<S: RateSource> {
    source: S,
    base: String,
    table: Option<(Instant, HashMap<String, Decimal>)>,
    pairs: HashMap<(String, String), (Instant, Decimal)>,
    symbols: Option<(Instant, Vec<String>)>,
}

impl<S: RateSource> RateProvider<S> {
    pub fn new(source: S, base: &str) -> Self {
        Self {
            source,
            base: base.to_uppercase(),
            table: None,
            pairs: HashMap::new(),
            symbols: None,
        }
    }

    /// Destination-units-per-source-unit, or `None` when no rate can be
    /// obtained. Same-currency pairs short-circuit to 1 with no fetch.
    pub fn get_rate(&mut self, from: &str, to: &str) -> Option<Decimal> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Some(Decimal::ONE);
        }
        let key = (from.clone(), to.clone());
        if let Some((at, rate)) = self.pairs.get(&key) {
            if at.elapsed() < TABLE_TTL {
                return Some(*rate);
            }
        }
        let rate = self.cross_rate(&from, &to)?;
        self.pairs.insert(key, (Instant::now(), rate));
        Some(rate)
    }

    /// Convert and round to 2 decimal places (half-up).
    pub fn convert(&mut self, amount: Decimal, from: &str, to: &str) -> Option<Decimal> {
        let rate = self.get_rate(from, to)?;
        Some((amount * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn supported(&mut self) -> Option<Vec<String>> {
        if let Some((at, codes)) = &self.symbols {
            if at.elapsed() < SYMBOLS_TTL {
                return Some(codes.clone());
            }
        }
        match self.source.symbols() {
            Ok(codes) => {
                self.symbols = Some((Instant::now(), codes.clone()));
                Some(codes)
            }
            Err(e) => {
                warn!("symbols fetch failed: {}", e);
                None
            }
        }
    }

    pub fn clear_cache(&mut self) {
        self.table = None;
        self.pairs.clear();
        self.symbols = None;
    }

    fn cross_rate(&mut self, from: &str, to: &str) -> Option<Decimal> {
        self.refresh_table()?;
        let (_, table) = self.table.as_ref()?;
        // Direct when the base is one side, else via the base hub.
        if from == self.base {
            return table.get(to).copied();
        }
        if to == self.base {
            let r = table.get(from).copied()?;
            if r.is_zero() {
                return None;
            }
            return Some(Decimal::ONE / r);
        }
        let from_rate = table.get(from).copied()?;
        let to_rate = table.get(to).copied()?;
        if from_rate.is_zero() {
            return None;
        }
        Some(to_rate / from_rate)
    }

    fn refresh_table(&mut self) -> Option<()> {
        if matches!(&self.table, Some((at, _)) if at.elapsed() < TABLE_TTL) {
            return Some(());
        }
        match self.source.latest(&self.base) {
            Ok(mut table) => {
                // The base maps to itself so lookups need no special case.
                table.insert(self.base.clone(), Decimal::ONE);
                self.table = Some((Instant::now(), table));
                Some(())
            }
            Err(e) => {
                warn!("rate table fetch for base {} failed: {}", self.base, e);
                None
            }
        }
    }
}
