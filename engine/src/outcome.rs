//! Crash-point sampling.
//!
//! House rule: one round in a hundred crashes instantly at 1.00x. All other
//! rounds draw from an inverse-CDF heavy tail tuned so that a player cashing
//! out at any multiplier `m` collects `m` with probability `house_edge / m`:
//! the expected payout per wagered unit is the house edge at every exit
//! point. Most rounds crash below 2x; crashes at or above 100x stay under 1%
//! combined.

use rand::Rng;

/// Probability of an instant 1.00x crash.
pub const INSTANT_CRASH_PROB: f64 = 0.01;

/// Fraction of each wager returned to players in expectation (1% edge).
pub const DEFAULT_HOUSE_EDGE: f64 = 0.99;

#[derive(Clone, Copy, Debug)]
pub struct CrashSampler {
    house_edge: f64,
}

impl Default for CrashSampler {
    fn default() -> Self {
        Self::new(DEFAULT_HOUSE_EDGE)
    }
}

impl CrashSampler {
    /// `house_edge` must be in (0, 1]; out-of-range values are clamped.
    pub fn new(house_edge: f64) -> Self {
        Self {
            house_edge: house_edge.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }

    pub fn house_edge(&self) -> f64 {
        self.house_edge
    }

    /// Draw a crash point. Always >= 1.0.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if rng.gen::<f64>() < INSTANT_CRASH_PROB {
            return 1.0;
        }
        // Conditioned on surviving the instant-crash branch:
        // P(crash >= m) = scale / m, so overall P(crash >= m) = house_edge / m.
        let u: f64 = rng.gen();
        let scale = self.house_edge / (1.0 - INSTANT_CRASH_PROB);
        (scale / (1.0 - u)).max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TRIALS: usize = 1_000_000;

    fn sample_all(seed: u64) -> Vec<f64> {
        let sampler = CrashSampler::default();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..TRIALS).map(|_| sampler.sample(&mut rng)).collect()
    }

    #[test]
    fn test_samples_never_below_one() {
        for crash in sample_all(1) {
            assert!(crash >= 1.0, "crash point {crash} below 1.0");
        }
    }

    #[test]
    fn test_instant_crash_rate_near_one_percent() {
        let samples = sample_all(2);
        let instant = samples.iter().filter(|c| **c == 1.0).count();
        let rate = instant as f64 / TRIALS as f64;
        assert!(
            (rate - INSTANT_CRASH_PROB).abs() < 0.003,
            "instant crash rate {rate} too far from {INSTANT_CRASH_PROB}"
        );
    }

    #[test]
    fn test_high_multipliers_are_rare() {
        let samples = sample_all(3);
        let over_100 = samples.iter().filter(|c| **c >= 100.0).count();
        let rate = over_100 as f64 / TRIALS as f64;
        // Law: house_edge / 100, i.e. just under 1%.
        assert!(rate < 0.012, "P(crash >= 100) = {rate}");
        assert!(rate > 0.006, "P(crash >= 100) = {rate}");
    }

    #[test]
    fn test_low_multipliers_dominate() {
        let samples = sample_all(4);
        let below_2 = samples.iter().filter(|c| **c < 2.0).count();
        let rate = below_2 as f64 / TRIALS as f64;
        assert!(rate > 0.5, "P(crash < 2) = {rate}");
    }

    #[test]
    fn test_expected_payout_matches_house_edge() {
        let samples = sample_all(5);
        // A player always cashing out at 2x collects 2 per unit whenever the
        // round survives past 2x.
        for target in [1.5f64, 2.0, 5.0, 20.0] {
            let survived = samples.iter().filter(|c| **c >= target).count();
            let payout = survived as f64 / TRIALS as f64 * target;
            assert!(
                (payout - DEFAULT_HOUSE_EDGE).abs() < 0.03,
                "payout at {target}x was {payout}, expected about {DEFAULT_HOUSE_EDGE}"
            );
        }
    }

    #[test]
    fn test_house_edge_is_tunable() {
        let sampler = CrashSampler::new(0.9);
        let mut rng = StdRng::seed_from_u64(6);
        let samples: Vec<f64> = (0..TRIALS).map(|_| sampler.sample(&mut rng)).collect();
        let survived = samples.iter().filter(|c| **c >= 2.0).count();
        let payout = survived as f64 / TRIALS as f64 * 2.0;
        assert!((payout - 0.9).abs() < 0.03, "payout at 2x was {payout}");
    }
}
