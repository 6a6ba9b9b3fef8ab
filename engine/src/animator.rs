//! Multiplier animation loop.
//!
//! One animator task per live round; rounds animate independently of each
//! other. The loop recomputes the eased multiplier from a monotonic
//! elapsed-time base on every tick (robust to scheduling jitter), pushes
//! every Nth frame to the sink to respect delivery rate limits, and always
//! pushes a final frame whose multiplier equals the crash point exactly.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time;
use tracing::debug;

use inu_types::Ledger;

use crate::easing::ease_in_cubic;
use crate::round::{LockOutcome, Round, RoundSnapshot, MIN_MULTIPLIER};

/// Animation tunables.
#[derive(Clone, Copy, Debug)]
pub struct AnimatorConfig {
    /// Total climb time from 1.0x to the crash point.
    pub duration: Duration,
    /// Multiplier recompute cadence.
    pub tick: Duration,
    /// Push every Nth computed sample; the final frame is always pushed.
    pub frame_stride: usize,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            tick: Duration::from_millis(200),
            frame_stride: 3,
        }
    }
}

/// A frame handed to the sink: the round view plus the multiplier series a
/// renderer can chart.
#[derive(Clone, Debug, Serialize)]
pub struct RoundFrame {
    pub snapshot: RoundSnapshot,
    pub samples: Vec<f64>,
}

/// Receives render-ready frames. Delivery is fire-and-forget from the
/// engine's point of view: the round state machine never depends on
/// rendering succeeding.
pub trait FrameSink: Send + Sync {
    fn publish(&self, frame: RoundFrame) -> impl Future<Output = ()> + Send;
}

impl<S: FrameSink> FrameSink for &S {
    fn publish(&self, frame: RoundFrame) -> impl Future<Output = ()> + Send {
        (**self).publish(frame)
    }
}

/// Drive `round` from the betting window through settlement.
///
/// Sleeps out the betting window, locks betting, and animates only if the
/// round actually started; a round nobody joined cancels with a single
/// terminal frame.
pub async fn run<L: Ledger, S: FrameSink>(round: Arc<Round<L>>, sink: S) {
    let config = round.config();
    time::sleep(config.betting_window).await;

    match round.lock_betting().await {
        LockOutcome::Started => {}
        LockOutcome::Cancelled | LockOutcome::AlreadyDecided => {
            // Nothing to animate; let watchers see the terminal state.
            let snapshot = round.snapshot().await;
            sink.publish(RoundFrame {
                snapshot,
                samples: vec![MIN_MULTIPLIER],
            })
            .await;
            return;
        }
    }

    animate_running(round, config.animation, sink).await;
}

/// Animate a round that is already Running.
pub async fn animate_running<L: Ledger, S: FrameSink>(
    round: Arc<Round<L>>,
    config: AnimatorConfig,
    sink: S,
) {
    let crash_point = round.crash_point().await;
    let started = Instant::now();
    let mut interval = time::interval(config.tick);
    let mut samples = vec![MIN_MULTIPLIER];
    let stride = config.frame_stride.max(1);

    loop {
        interval.tick().await;

        // Terminal state is checked before doing any work; a round settled
        // from elsewhere must not produce further ticks.
        if round.phase().await.is_terminal() {
            break;
        }

        let progress =
            (started.elapsed().as_secs_f64() / config.duration.as_secs_f64()).min(1.0);
        let target = MIN_MULTIPLIER + (crash_point - MIN_MULTIPLIER) * ease_in_cubic(progress);
        let tick = round.advance(target).await;
        samples.push(tick.multiplier);

        if tick.settled {
            break;
        }
        if samples.len() % stride == 0 {
            let snapshot = round.snapshot().await;
            sink.publish(RoundFrame {
                snapshot,
                samples: samples.clone(),
            })
            .await;
        }
    }

    // The final frame reflects the settled multiplier exactly.
    let snapshot = round.snapshot().await;
    debug!(round = %round.id(), multiplier = snapshot.multiplier, "round finished");
    sink.publish(RoundFrame { snapshot, samples }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockLedger, RecordingSink};
    use crate::round::{GameConfig, RoundPhase};
    use inu_types::UserId;

    fn fast_config() -> GameConfig {
        GameConfig {
            betting_window: Duration::from_millis(20),
            animation: AnimatorConfig {
                duration: Duration::from_millis(200),
                tick: Duration::from_millis(10),
                frame_stride: 3,
            },
            ..GameConfig::default()
        }
    }

    #[tokio::test]
    async fn test_round_without_players_cancels_with_one_frame() {
        let ledger = Arc::new(MockLedger::default());
        let round = Arc::new(Round::with_crash_point(fast_config(), 3.0, ledger));
        let sink = RecordingSink::default();

        run(round.clone(), &sink).await;

        assert_eq!(round.phase().await, RoundPhase::Cancelled);
        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].snapshot.phase, RoundPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_final_frame_lands_exactly_on_crash_point() {
        let ledger = Arc::new(MockLedger::default());
        ledger.seed(UserId(1), 1_000);
        let round = Arc::new(Round::with_crash_point(fast_config(), 2.5, ledger));
        round.join(UserId(1), 100).await.unwrap();

        let sink = RecordingSink::default();
        run(round.clone(), &sink).await;

        assert_eq!(round.phase().await, RoundPhase::Settled);
        let frames = sink.frames();
        let last = frames.last().unwrap();
        assert_eq!(last.snapshot.multiplier, 2.5);
        assert_eq!(last.snapshot.crash_point, Some(2.5));
        assert_eq!(*last.samples.last().unwrap(), 2.5);
    }

    #[tokio::test]
    async fn test_samples_are_monotone_and_bounded() {
        let ledger = Arc::new(MockLedger::default());
        ledger.seed(UserId(1), 1_000);
        let round = Arc::new(Round::with_crash_point(fast_config(), 4.0, ledger));
        round.join(UserId(1), 100).await.unwrap();

        let sink = RecordingSink::default();
        run(round.clone(), &sink).await;

        let frames = sink.frames();
        let samples = &frames.last().unwrap().samples;
        let mut last = 0.0;
        for sample in samples {
            assert!(*sample >= last, "samples regressed: {samples:?}");
            assert!(*sample <= 4.0);
            last = *sample;
        }
    }

    #[tokio::test]
    async fn test_in_flight_frames_hide_crash_point() {
        let ledger = Arc::new(MockLedger::default());
        ledger.seed(UserId(1), 1_000);
        let round = Arc::new(Round::with_crash_point(fast_config(), 5.0, ledger));
        round.join(UserId(1), 100).await.unwrap();

        let sink = RecordingSink::default();
        run(round.clone(), &sink).await;

        let frames = sink.frames();
        assert!(frames.len() > 1, "expected intermediate frames");
        for frame in &frames[..frames.len() - 1] {
            assert_eq!(frame.snapshot.crash_point, None);
        }
    }
}
