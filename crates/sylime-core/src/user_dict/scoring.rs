//! Decay arithmetic for commit mass.
//!
//! Time is the store's global tick, which advances once per committed
//! entry. Each entry carries `dee`, an exponentially decayed commit
//! mass: folding in new mass ages the old mass by `exp(-elapsed / 200)`
//! first, so an entry committed on every tick saturates near the
//! steady-state ceiling while an abandoned one fades.

/// Decay time constant, in ticks.
const DECAY_WINDOW: f64 = 200.0;

/// Steady-state mass of an entry committed on every tick.
fn mass_ceiling() -> f64 {
    1.0 / (1.0 - (-1.0 / DECAY_WINDOW).exp())
}

/// Fold `signal` fresh commit mass into the mass recorded at
/// `prev_tick`, aged forward to `now`. A `prev_tick` in the future
/// grows the mass instead; callers clamp where that matters.
pub(super) fn decay(signal: f64, now: u64, prev_dee: f64, prev_tick: u64) -> f64 {
    let age = prev_tick as f64 - now as f64;
    signal + prev_dee * (age / DECAY_WINDOW).exp()
}

/// Estimated commit probability of an entry, blending its all-time
/// commit rate with the decayed recent mass. `extra` is additional
/// signal on top of the rate, zero in every current caller. Always
/// within [0, 1]; the caller floors it before taking the log.
pub(super) fn probability(extra: f64, rate: f64, now: u64, dee: f64) -> f64 {
    let ticks = (now as f64).max(1.0);
    let recency = dee / ticks.min(mass_ceiling());
    (0.5 * ((extra + rate).min(1.0) + recency)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_fades_over_time() {
        let fresh = decay(1.0, 10, 2.0, 10);
        let aged = decay(1.0, 400, 2.0, 10);
        assert_eq!(fresh, 3.0);
        assert!(aged < fresh);
        assert!(aged > 1.0);
    }

    #[test]
    fn zero_signal_at_same_tick_is_identity() {
        assert_eq!(decay(0.0, 42, 1.5, 42), 1.5);
    }

    #[test]
    fn future_stamp_grows_mass() {
        assert!(decay(0.0, 10, 1.0, 30) > 1.0);
    }

    #[test]
    fn probability_rises_with_usage() {
        let low = probability(0.0, 1.0 / 1000.0, 1000, 1.0);
        let high = probability(0.0, 50.0 / 1000.0, 1000, 20.0);
        assert!(low < high);
        assert!(low > 0.0);
        assert!(high <= 1.0);
    }

    #[test]
    fn probability_is_clamped() {
        // dee may reach its storage cap while the window stays small.
        assert_eq!(probability(0.0, 50.0, 100, 10000.0), 1.0);
        assert_eq!(probability(0.0, 0.0, 0, 0.0), 0.0);
    }
}
