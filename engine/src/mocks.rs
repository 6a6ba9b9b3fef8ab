//! Test collaborators for the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use inu_types::{Ledger, LedgerError, UserId};

use crate::animator::{FrameSink, RoundFrame};

/// In-memory ledger with the same conditional-adjust contract as the real
/// store: an adjustment only lands if the resulting balance stays
/// non-negative.
#[derive(Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<UserId, i64>>,
}

impl MockLedger {
    pub fn seed(&self, user: UserId, amount: i64) {
        self.balances.lock().unwrap().insert(user, amount);
    }

    pub fn balance_of(&self, user: UserId) -> i64 {
        *self.balances.lock().unwrap().get(&user).unwrap_or(&0)
    }
}

impl Ledger for MockLedger {
    async fn balance(&self, user: UserId) -> Result<i64, LedgerError> {
        Ok(self.balance_of(user))
    }

    async fn adjust(&self, user: UserId, delta: i64) -> Result<bool, LedgerError> {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry(user).or_insert(0);
        if *entry + delta < 0 {
            return Ok(false);
        }
        *entry += delta;
        Ok(true)
    }
}

/// Sink that records every published frame.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<RoundFrame>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<RoundFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingSink {
    async fn publish(&self, frame: RoundFrame) {
        self.frames.lock().unwrap().push(frame);
    }
}
