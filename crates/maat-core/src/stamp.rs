//! Record identity: ids from a seeded generator, timestamps from a clock
//!
//! Every engine owns one `Stamper`. Replaying the same call sequence with
//! the same seed and a `SteppingClock` reproduces every id and timestamp.

use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of wall-clock readings.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock: every reading advances a fixed tick from the epoch.
#[derive(Debug)]
pub struct SteppingClock {
    epoch: DateTime<Utc>,
    tick: TimeDelta,
    readings: AtomicU64,
}

impl SteppingClock {
    pub fn new(epoch: DateTime<Utc>, tick: TimeDelta) -> Self {
        Self {
            epoch,
            tick,
            readings: AtomicU64::new(0),
        }
    }

    /// Readings taken so far.
    pub fn readings(&self) -> u64 {
        self.readings.load(Ordering::Relaxed)
    }
}

impl Default for SteppingClock {
    /// 2024-01-01T00:00:00Z, one millisecond per reading.
    fn default() -> Self {
        let epoch = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        Self::new(epoch, TimeDelta::milliseconds(1))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.readings.fetch_add(1, Ordering::Relaxed);
        // Past the representable range the clock pins at its maximum.
        i64::try_from(n)
            .ok()
            .and_then(|n| self.tick.num_microseconds()?.checked_mul(n))
            .and_then(|us| self.epoch.checked_add_signed(TimeDelta::microseconds(us)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// ISO-8601 UTC with microseconds and a `Z` suffix.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Hands out ids and timestamps for one engine.
pub struct Stamper {
    rng: ChaCha20Rng,
    clock: Arc<dyn Clock>,
}

impl Stamper {
    pub fn new(seed: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            clock,
        }
    }

    /// `<prefix>_<16 hex chars>`, drawn from the seeded generator.
    pub fn id(&mut self, prefix: &str) -> String {
        let bytes: [u8; 16] = self.rng.gen();
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        let hex = uuid.simple().to_string();
        format!("{}_{}", prefix, &hex[..16])
    }

    pub fn timestamp(&mut self) -> String {
        iso_timestamp(self.clock.now())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for Stamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stamper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_clock_advances_per_reading() {
        let clock = SteppingClock::default();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, TimeDelta::milliseconds(1));
        assert_eq!(clock.readings(), 2);
    }

    #[test]
    fn stepping_clock_keeps_advancing_past_i32_readings() {
        let clock = SteppingClock::default();
        clock
            .readings
            .store(i32::MAX as u64 - 1, Ordering::Relaxed);
        let a = clock.now();
        let b = clock.now();
        let c = clock.now();
        assert!(a < b && b < c);
        assert_eq!(c - b, TimeDelta::milliseconds(1));
        assert!(a > clock.epoch);
    }

    #[test]
    fn timestamp_has_z_suffix() {
        let clock = SteppingClock::default();
        assert_eq!(iso_timestamp(clock.now()), "2024-01-01T00:00:00.000000Z");
    }

    #[test]
    fn ids_repeat_for_same_seed() {
        let mut a = Stamper::new(7, Arc::new(SteppingClock::default()));
        let mut b = Stamper::new(7, Arc::new(SteppingClock::default()));
        for _ in 0..5 {
            assert_eq!(a.id("obs"), b.id("obs"));
        }
    }

    #[test]
    fn id_shape() {
        let mut s = Stamper::new(1, Arc::new(SystemClock));
        let id = s.id("hyp");
        assert!(id.starts_with("hyp_"));
        assert_eq!(id.len(), 4 + 16);
    }
}
