use crate::state::PatientState;
use rand::Rng;

/// Heart-rate band used for forced and persisting abnormal readings
const ABNORMAL_HEART_RATE: std::ops::Range<u32> = 120..150;

/// Heart rate a patient falls back to when an abnormal episode ends
const RECOVERY_HEART_RATE: u32 = 75;

/// Chance that an abnormal patient stays abnormal on the next tick
const PERSIST_PROBABILITY: f64 = 0.8;

const DRIFT_MIN: u32 = 60;
const DRIFT_MAX: u32 = 100;

/// Produces the next simulated vitals reading for one patient.
///
/// Temperature is carried over unchanged; heart rate and oxygen are
/// regenerated every tick from the caller-supplied random source.
#[derive(Clone, Debug)]
pub struct VitalsGenerator {
    forced_abnormal_period: u64,
}

impl VitalsGenerator {
    /// Every `forced_abnormal_period`-th tick forces an abnormal heart rate
    pub fn new(forced_abnormal_period: u64) -> Self {
        Self {
            forced_abnormal_period: forced_abnormal_period.max(1),
        }
    }

    /// Advance `state` by one tick, updating tick count, heart rate and oxygen
    pub fn advance<R: Rng + ?Sized>(&self, state: &mut PatientState, rng: &mut R) {
        state.tick_count += 1;

        if state.tick_count % self.forced_abnormal_period == 0 {
            state.heart_rate = rng.gen_range(ABNORMAL_HEART_RATE);
        } else if state.last_severity.is_abnormal() {
            state.heart_rate = if rng.gen_bool(PERSIST_PROBABILITY) {
                rng.gen_range(ABNORMAL_HEART_RATE)
            } else {
                RECOVERY_HEART_RATE
            };
        } else {
            let step: i64 = rng.gen_range(-2..=2);
            state.heart_rate =
                (i64::from(state.heart_rate) + step).clamp(DRIFT_MIN.into(), DRIFT_MAX.into()) as u32;
        }

        state.oxygen = if state.heart_rate > 110 {
            rng.gen_range(90..95)
        } else {
            rng.gen_range(96..100)
        };
    }
}

impl Default for VitalsGenerator {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::Severity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forced_tick_always_abnormal() {
        let generator = VitalsGenerator::new(30);

        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = PatientState {
                tick_count: 29,
                ..PatientState::default()
            };

            generator.advance(&mut state, &mut rng);

            assert_eq!(state.tick_count, 30);
            assert!((120..150).contains(&state.heart_rate), "seed {seed}: {}", state.heart_rate);
            assert!((90..95).contains(&state.oxygen));
        }
    }

    #[test]
    fn test_forced_tick_ignores_prior_severity() {
        let generator = VitalsGenerator::new(30);
        let mut rng = StdRng::seed_from_u64(7);

        for severity in [Severity::Normal, Severity::Warning, Severity::Critical] {
            let mut state = PatientState {
                tick_count: 59,
                last_severity: severity,
                heart_rate: 62,
                ..PatientState::default()
            };
            generator.advance(&mut state, &mut rng);
            assert!((120..150).contains(&state.heart_rate));
        }
    }

    #[test]
    fn test_normal_drift_stays_clamped() {
        let generator = VitalsGenerator::new(30);
        let mut rng = StdRng::seed_from_u64(42);

        let mut low = PatientState {
            heart_rate: 60,
            ..PatientState::default()
        };
        let mut high = PatientState {
            heart_rate: 100,
            ..PatientState::default()
        };

        for _ in 0..28 {
            let before = low.heart_rate;
            generator.advance(&mut low, &mut rng);
            assert!((60..=100).contains(&low.heart_rate));
            assert!(low.heart_rate.abs_diff(before) <= 2);

            generator.advance(&mut high, &mut rng);
            assert!((60..=100).contains(&high.heart_rate));
            assert!((96..100).contains(&high.oxygen));
        }
    }

    #[test]
    fn test_abnormal_state_persists_or_recovers() {
        let generator = VitalsGenerator::new(30);
        let mut rng = StdRng::seed_from_u64(1234);
        let mut recovered = 0;
        let runs = 2000;

        for _ in 0..runs {
            let mut state = PatientState {
                heart_rate: 130,
                last_severity: Severity::Warning,
                ..PatientState::default()
            };
            generator.advance(&mut state, &mut rng);

            if state.heart_rate == RECOVERY_HEART_RATE {
                recovered += 1;
                assert!((96..100).contains(&state.oxygen));
            } else {
                assert!((120..150).contains(&state.heart_rate));
            }
        }

        // Roughly one in five episodes should end
        assert!(recovered > runs / 10 && recovered < runs * 3 / 10, "recovered {recovered}");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let generator = VitalsGenerator::default();
        let mut a = PatientState::default();
        let mut b = PatientState::default();
        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);

        for _ in 0..90 {
            generator.advance(&mut a, &mut rng_a);
            generator.advance(&mut b, &mut rng_b);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_temperature_is_held() {
        let generator = VitalsGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = PatientState::default();

        for _ in 0..60 {
            generator.advance(&mut state, &mut rng);
        }
        assert_eq!(state.temperature, 36.5);
    }
}
