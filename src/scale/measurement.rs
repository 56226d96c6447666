//! Shared measurement state.
//!
//! Written from the radio context when a weight notification is decoded,
//! read from the polling/display context. The weight sits behind a
//! blocking mutex held only for the assignment or the read; the ready flag
//! is a plain atomic whose reads are best-effort.

use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub struct ScaleState<M: RawMutex> {
    /// Last weight in tenths of a gram.
    weight: Mutex<M, Cell<i16>>,
    ready: AtomicBool,
}

impl<M: RawMutex> ScaleState<M> {
    pub const fn new() -> Self {
        Self {
            weight: Mutex::new(Cell::new(0)),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_weight(&self, sample: i16) {
        self.weight.lock(|w| w.set(sample));
    }

    pub fn get_weight(&self) -> i16 {
        self.weight.lock(|w| w.get())
    }

    /// Whether the link was `Ready` at the time of the last transition.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }
}

impl<M: RawMutex> Default for ScaleState<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A weight in tenths of a gram, formatted as `12.3` / `-0.5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grams(pub i16);

impl Grams {
    /// Sign, whole grams and tenth digit.
    pub fn split_tenths(self) -> (bool, u16, u8) {
        let negative = self.0 < 0;
        let magnitude = self.0.unsigned_abs();
        (negative, magnitude / 10, (magnitude % 10) as u8)
    }
}

impl fmt::Display for Grams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (negative, whole, tenth) = self.split_tenths();
        if negative {
            f.write_str("-")?;
        }
        write!(f, "{}.{}", whole, tenth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn weight_defaults_to_zero() {
        let state: ScaleState<NoopRawMutex> = ScaleState::new();
        assert_eq!(state.get_weight(), 0);
        assert!(!state.is_ready());
    }

    #[test]
    fn set_then_get() {
        let state: ScaleState<NoopRawMutex> = ScaleState::new();
        state.set_weight(-1234);
        assert_eq!(state.get_weight(), -1234);
        state.set_weight(i16::MAX);
        assert_eq!(state.get_weight(), i16::MAX);
    }

    #[test]
    fn ready_flag_follows_link() {
        let state: ScaleState<NoopRawMutex> = ScaleState::new();
        state.set_ready(true);
        assert!(state.is_ready());
        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn grams_split_handles_sign() {
        assert_eq!(Grams(123).split_tenths(), (false, 12, 3));
        assert_eq!(Grams(-5).split_tenths(), (true, 0, 5));
        assert_eq!(Grams(i16::MIN).split_tenths(), (true, 3276, 8));
    }

    #[test]
    fn grams_display() {
        let mut s: heapless::String<16> = heapless::String::new();
        write!(s, "{}", Grams(-5)).unwrap();
        assert_eq!(s.as_str(), "-0.5");

        s.clear();
        write!(s, "{}", Grams(1000)).unwrap();
        assert_eq!(s.as_str(), "100.0");
    }
}
