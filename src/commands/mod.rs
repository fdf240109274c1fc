// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod budgets;
pub mod categories;
pub mod currencies;
pub mod doctor;
pub mod fx;
pub mod notifications;
pub mod scanner;
pub mod transactions;
pub mod transfers;
pub mod users;
