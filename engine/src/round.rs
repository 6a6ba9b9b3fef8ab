//! Crash round state machine.
//!
//! A round moves `Betting -> Running -> Settled`, or `Betting -> Cancelled`
//! when nobody joins or the round is abandoned. [`RoundState`] is the pure
//! state machine; [`Round`] wraps it in the per-round critical section and
//! talks to the balance ledger.
//!
//! Money flow: a bet is debited when the player is admitted (pessimistic
//! reservation, both-or-neither with admission). A cashout credits
//! `floor(bet * multiplier)` immediately; players still in at the crash
//! receive nothing further, their reservation already belongs to the house.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use inu_types::{Ledger, LedgerError, UserId};

use crate::animator::AnimatorConfig;
use crate::outcome::CrashSampler;

/// Multiplier floor; every round starts here.
pub const MIN_MULTIPLIER: f64 = 1.0;

/// Per-round tunables. Defaults match the production bot.
#[derive(Clone, Copy, Debug)]
pub struct GameConfig {
    pub min_bet: u64,
    pub max_bet: u64,
    pub max_players: usize,
    pub betting_window: Duration,
    pub animation: AnimatorConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_bet: 10,
            max_bet: 1_000_000,
            max_players: 20,
            betting_window: Duration::from_secs(15),
            animation: AnimatorConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Betting,
    Running,
    Settled,
    Cancelled,
}

impl RoundPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundPhase::Settled | RoundPhase::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Betting => "betting",
            RoundPhase::Running => "running",
            RoundPhase::Settled => "settled",
            RoundPhase::Cancelled => "cancelled",
        }
    }
}

/// One player's position within a round, in join order.
#[derive(Clone, Debug, Serialize)]
pub struct PlayerPosition {
    pub user: UserId,
    pub bet: u64,
    /// Locked multiplier, immutable once set.
    pub cashout: Option<f64>,
}

impl PlayerPosition {
    /// Credited amount for a cashed-out position.
    pub fn winnings(&self) -> Option<u64> {
        self.cashout.map(|m| (self.bet as f64 * m) as u64)
    }
}

/// Typed refusals. Every rejected action carries a reason the interaction
/// layer can show verbatim.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("the betting phase is over")]
    BettingClosed,
    #[error("you have already joined this round")]
    AlreadyJoined,
    #[error("the round is full")]
    RoundFull,
    #[error("bet must be between {min} and {max}")]
    BetOutOfRange { min: u64, max: u64 },
    #[error("you don't have enough funds for that bet")]
    InsufficientFunds,
    #[error("the round is not running")]
    NotRunning,
    #[error("you are not part of this round")]
    NotJoined,
    #[error("you have already cashed out")]
    AlreadyCashedOut,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result of closing the betting window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// At least one player joined; the round is Running.
    Started,
    /// Nobody joined; the round is Cancelled.
    Cancelled,
    /// A previous call already decided the transition.
    AlreadyDecided,
}

/// Result of one scheduler advance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    pub multiplier: f64,
    pub settled: bool,
}

/// A render-ready view of the round. The crash point is only revealed once
/// the round has settled.
#[derive(Clone, Debug, Serialize)]
pub struct RoundSnapshot {
    pub phase: RoundPhase,
    pub multiplier: f64,
    pub crash_point: Option<f64>,
    pub players: Vec<PlayerPosition>,
}

/// Pure round state. All methods are synchronous; callers provide the
/// critical section.
#[derive(Clone, Debug)]
pub struct RoundState {
    config: GameConfig,
    crash_point: f64,
    multiplier: f64,
    phase: RoundPhase,
    players: Vec<PlayerPosition>,
}

impl RoundState {
    pub fn new(config: GameConfig, crash_point: f64) -> Self {
        Self {
            config,
            crash_point: crash_point.max(MIN_MULTIPLIER),
            multiplier: MIN_MULTIPLIER,
            phase: RoundPhase::Betting,
            players: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// The pre-committed terminal multiplier. Hidden from players until
    /// settlement; only the scheduler reads it while the round is live.
    pub fn crash_point(&self) -> f64 {
        self.crash_point
    }

    pub fn players(&self) -> &[PlayerPosition] {
        &self.players
    }

    pub fn position(&self, user: UserId) -> Option<&PlayerPosition> {
        self.players.iter().find(|p| p.user == user)
    }

    /// Everything that can refuse a join except funds, which only the ledger
    /// can decide.
    pub fn check_join(&self, user: UserId, bet: u64) -> Result<(), RoundError> {
        if self.phase != RoundPhase::Betting {
            return Err(RoundError::BettingClosed);
        }
        if self.position(user).is_some() {
            return Err(RoundError::AlreadyJoined);
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoundError::RoundFull);
        }
        if bet < self.config.min_bet || bet > self.config.max_bet {
            return Err(RoundError::BetOutOfRange {
                min: self.config.min_bet,
                max: self.config.max_bet,
            });
        }
        Ok(())
    }

    /// Record an admitted player. Callers must have passed [`check_join`]
    /// within the same critical section.
    ///
    /// [`check_join`]: RoundState::check_join
    pub fn admit(&mut self, user: UserId, bet: u64) {
        debug_assert!(self.check_join(user, bet).is_ok());
        self.players.push(PlayerPosition {
            user,
            bet,
            cashout: None,
        });
    }

    /// Close the betting window. Idempotent: only the first call after
    /// Betting decides the transition.
    pub fn lock(&mut self) -> LockOutcome {
        if self.phase != RoundPhase::Betting {
            return LockOutcome::AlreadyDecided;
        }
        if self.players.is_empty() {
            self.phase = RoundPhase::Cancelled;
            LockOutcome::Cancelled
        } else {
            self.phase = RoundPhase::Running;
            LockOutcome::Started
        }
    }

    /// Lock in the current multiplier for a player. Valid once per player,
    /// only while Running.
    pub fn cashout(&mut self, user: UserId) -> Result<f64, RoundError> {
        if self.phase != RoundPhase::Running {
            return Err(RoundError::NotRunning);
        }
        let multiplier = self.multiplier;
        let position = self
            .players
            .iter_mut()
            .find(|p| p.user == user)
            .ok_or(RoundError::NotJoined)?;
        if position.cashout.is_some() {
            return Err(RoundError::AlreadyCashedOut);
        }
        position.cashout = Some(multiplier);
        Ok(multiplier)
    }

    /// Advance toward the crash point. The multiplier never decreases and
    /// never exceeds the crash point; reaching it settles the round.
    pub fn advance(&mut self, multiplier: f64) -> Tick {
        if self.phase != RoundPhase::Running {
            return Tick {
                multiplier: self.multiplier,
                settled: self.phase == RoundPhase::Settled,
            };
        }
        self.multiplier = multiplier.clamp(self.multiplier, self.crash_point);
        let settled = self.multiplier >= self.crash_point;
        if settled {
            self.phase = RoundPhase::Settled;
        }
        Tick {
            multiplier: self.multiplier,
            settled,
        }
    }

    /// Cancel a round that never left Betting, returning the reservations to
    /// refund. No-op once Running: those bets are committed.
    pub fn cancel(&mut self) -> Vec<PlayerPosition> {
        if self.phase != RoundPhase::Betting {
            return Vec::new();
        }
        self.phase = RoundPhase::Cancelled;
        std::mem::take(&mut self.players)
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            phase: self.phase,
            multiplier: self.multiplier,
            crash_point: (self.phase == RoundPhase::Settled).then_some(self.crash_point),
            players: self.players.clone(),
        }
    }
}

/// A successful cashout receipt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cashout {
    pub multiplier: f64,
    pub winnings: u64,
}

/// A live round: the pure state machine behind the per-round lock, plus the
/// ledger used for reservations and payouts.
pub struct Round<L: Ledger> {
    id: Uuid,
    config: GameConfig,
    ledger: Arc<L>,
    state: Mutex<RoundState>,
}

impl<L: Ledger> Round<L> {
    /// Build a round with a pre-committed crash point. Prefer [`Round::create`]
    /// outside tests.
    pub fn with_crash_point(config: GameConfig, crash_point: f64, ledger: Arc<L>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            ledger,
            state: Mutex::new(RoundState::new(config, crash_point)),
        }
    }

    /// Create a round, drawing the crash point now. The outcome is committed
    /// before the first player joins and never re-rolled.
    pub fn create<R: rand::Rng>(
        config: GameConfig,
        sampler: &CrashSampler,
        rng: &mut R,
        ledger: Arc<L>,
    ) -> Self {
        let crash_point = sampler.sample(rng);
        Self::with_crash_point(config, crash_point, ledger)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// Admit a player, reserving the bet. The ledger debit and the admission
    /// happen under the round lock, so concurrent joins cannot double-admit
    /// one player or exceed the cap, and a failed debit leaves no trace.
    pub async fn join(&self, user: UserId, bet: u64) -> Result<(), RoundError> {
        let mut state = self.state.lock().await;
        state.check_join(user, bet)?;
        if !self.ledger.adjust(user, -(bet as i64)).await? {
            return Err(RoundError::InsufficientFunds);
        }
        state.admit(user, bet);
        Ok(())
    }

    /// Close the betting window. Idempotent.
    pub async fn lock_betting(&self) -> LockOutcome {
        self.state.lock().await.lock()
    }

    /// Lock in the current multiplier and credit the winnings immediately.
    /// Settlement of the round and rejection of late cashouts share the same
    /// lock, so a cashout can never land after the crash.
    pub async fn cashout(&self, user: UserId) -> Result<Cashout, RoundError> {
        let mut state = self.state.lock().await;
        let multiplier = state.cashout(user)?;
        let bet = state.position(user).map(|p| p.bet).unwrap_or_default();
        let winnings = (bet as f64 * multiplier) as u64;
        match self.ledger.adjust(user, winnings as i64).await {
            Ok(true) => {}
            Ok(false) => warn!(%user, winnings, "cashout credit rejected by ledger"),
            Err(err) => {
                warn!(%user, winnings, ?err, "cashout credit failed");
                return Err(err.into());
            }
        }
        Ok(Cashout {
            multiplier,
            winnings,
        })
    }

    /// Scheduler entry point.
    pub async fn advance(&self, multiplier: f64) -> Tick {
        self.state.lock().await.advance(multiplier)
    }

    /// Force-cancel an abandoned Betting round and refund every reservation.
    /// Returns the number of refunds issued.
    pub async fn cancel(&self) -> usize {
        let refunds = self.state.lock().await.cancel();
        for position in &refunds {
            if let Err(err) = self.ledger.adjust(position.user, position.bet as i64).await {
                warn!(user = %position.user, bet = position.bet, ?err, "refund failed");
            }
        }
        refunds.len()
    }

    pub async fn phase(&self) -> RoundPhase {
        self.state.lock().await.phase()
    }

    /// Crash point for the scheduler. Not part of any rendered output until
    /// settlement.
    pub async fn crash_point(&self) -> f64 {
        self.state.lock().await.crash_point()
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        self.state.lock().await.snapshot()
    }
}
