//! `Clock` and `Rng` SPIs (spec §6, component C1), grounded on the teacher's
//! `ClockPort`/`RandomPort` injection pattern (`repositories/clock.rs`,
//! `repositories/random.rs`) so step timestamps and generated ids stay
//! deterministic under test.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait Rng: Send + Sync {
    /// An 8 hex-digit lowercase suffix for a `game-`/`sess-` id.
    fn hex_id_suffix(&self) -> String;
}

/// Wall-clock production adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `rand`-backed production adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRng;

impl Rng for SystemRng {
    fn hex_id_suffix(&self) -> String {
        use rand::Rng as _;
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).expect("0..16 is a valid hex digit"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_rng_produces_lowercase_hex() {
        let rng = SystemRng;
        let s = rng.hex_id_suffix();
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
