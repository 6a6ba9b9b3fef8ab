//! Active round registry.
//!
//! One live round per scope (the channel a game was started in). Rounds are
//! inserted on creation and removed once terminal; a stale handle whose round
//! already finished is reaped by the next `begin`. This replaces any notion
//! of a process-global table of games: lifecycle is explicit.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use inu_types::{ChannelId, Ledger};

use crate::round::Round;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a crash round is already in progress here")]
    RoundInProgress,
}

pub struct RoundRegistry<L: Ledger> {
    rounds: Mutex<HashMap<ChannelId, Arc<Round<L>>>>,
}

impl<L: Ledger> Default for RoundRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Ledger> RoundRegistry<L> {
    pub fn new() -> Self {
        Self {
            rounds: Mutex::new(HashMap::new()),
        }
    }

    /// Register a round for the scope. Refused while a non-terminal round is
    /// registered there; a finished one is replaced.
    pub async fn begin(
        &self,
        scope: ChannelId,
        round: Arc<Round<L>>,
    ) -> Result<(), RegistryError> {
        let mut rounds = self.rounds.lock().await;
        if let Some(existing) = rounds.get(&scope) {
            if !existing.phase().await.is_terminal() {
                return Err(RegistryError::RoundInProgress);
            }
        }
        rounds.insert(scope, round);
        Ok(())
    }

    pub async fn get(&self, scope: ChannelId) -> Option<Arc<Round<L>>> {
        self.rounds.lock().await.get(&scope).cloned()
    }

    /// Remove the scope's round if it has reached a terminal phase. Returns
    /// whether an entry was removed.
    pub async fn finish(&self, scope: ChannelId) -> bool {
        let mut rounds = self.rounds.lock().await;
        let terminal = match rounds.get(&scope) {
            Some(round) => round.phase().await.is_terminal(),
            None => return false,
        };
        if terminal {
            rounds.remove(&scope);
        }
        terminal
    }

    pub async fn len(&self) -> usize {
        self.rounds.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rounds.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;
    use crate::round::GameConfig;
    use inu_types::UserId;

    fn new_round(ledger: &Arc<MockLedger>) -> Arc<Round<MockLedger>> {
        Arc::new(Round::with_crash_point(
            GameConfig::default(),
            2.0,
            ledger.clone(),
        ))
    }

    #[tokio::test]
    async fn test_second_round_in_scope_is_refused_while_live() {
        let ledger = Arc::new(MockLedger::default());
        let registry = RoundRegistry::new();
        let scope = ChannelId(1);

        registry.begin(scope, new_round(&ledger)).await.unwrap();
        let err = registry.begin(scope, new_round(&ledger)).await.unwrap_err();
        assert!(matches!(err, RegistryError::RoundInProgress));
    }

    #[tokio::test]
    async fn test_terminal_round_is_reaped_on_next_begin() {
        let ledger = Arc::new(MockLedger::default());
        let registry = RoundRegistry::new();
        let scope = ChannelId(1);

        let first = new_round(&ledger);
        registry.begin(scope, first.clone()).await.unwrap();
        first.cancel().await;

        registry.begin(scope, new_round(&ledger)).await.unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_finish_only_removes_terminal_rounds() {
        let ledger = Arc::new(MockLedger::default());
        ledger.seed(UserId(1), 100);
        let registry = RoundRegistry::new();
        let scope = ChannelId(1);

        let round = new_round(&ledger);
        registry.begin(scope, round.clone()).await.unwrap();
        assert!(!registry.finish(scope).await);

        round.join(UserId(1), 100).await.unwrap();
        round.lock_betting().await;
        round.advance(2.0).await;
        assert!(registry.finish(scope).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_independent_scopes_do_not_interfere() {
        let ledger = Arc::new(MockLedger::default());
        let registry = RoundRegistry::new();

        registry.begin(ChannelId(1), new_round(&ledger)).await.unwrap();
        registry.begin(ChannelId(2), new_round(&ledger)).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }
}
