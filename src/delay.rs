//! # Cycle-Counter Delay
//!
//! Sub-millisecond busy-waits measured against a free-running cycle counter
//! (the Cortex-M DWT `CYCCNT` on the station). This path is independent of
//! the millisecond tick: it spins, never sleeps, and works with interrupts
//! masked.
//!
//! `CycleDelay` implements `embedded_hal::delay::DelayNs`, so display and
//! sensor drivers can take it wherever they expect a delay provider.

use embedded_hal::delay::DelayNs;

use crate::config::CYCLES_PER_US;

/// A free-running, wrapping 32-bit cycle counter.
pub trait CycleSource {
    fn cycles(&self) -> u32;
}

/// Largest wait handled in one counter window. Keeps the cycle budget well
/// clear of `u32` wrap at any supported clock.
const MAX_CHUNK_US: u32 = 10_000;

/// Busy-wait delay driven by a [`CycleSource`].
pub struct CycleDelay<C> {
    source: C,
    cycles_per_us: u32,
}

impl<C: CycleSource> CycleDelay<C> {
    /// Delay running at the configured system clock.
    pub const fn new(source: C) -> Self {
        Self::with_rate(source, CYCLES_PER_US)
    }

    pub const fn with_rate(source: C, cycles_per_us: u32) -> Self {
        Self {
            source,
            cycles_per_us,
        }
    }

    /// Spin until `cycles` counter increments have passed.
    fn spin_cycles(&self, cycles: u32) {
        let start = self.source.cycles();
        while self.source.cycles().wrapping_sub(start) < cycles {
            core::hint::spin_loop();
        }
    }

    /// Busy-wait for `us` microseconds. `0` returns immediately.
    pub fn delay_us(&mut self, us: u32) {
        let mut remaining = us;
        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK_US);
            self.spin_cycles(chunk * self.cycles_per_us);
            remaining -= chunk;
        }
    }

    pub fn free(self) -> C {
        self.source
    }
}

impl<C: CycleSource> DelayNs for CycleDelay<C> {
    fn delay_ns(&mut self, ns: u32) {
        // Round up so a request is never shortened
        let cycles = (ns as u64 * self.cycles_per_us as u64).div_ceil(1000);
        self.spin_cycles(cycles as u32);
    }

    fn delay_us(&mut self, us: u32) {
        CycleDelay::delay_us(self, us);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Counter that advances by `step` on every read.
    struct FakeCycles {
        now: Cell<u32>,
        step: u32,
        reads: Cell<u32>,
    }

    impl FakeCycles {
        fn new(start: u32, step: u32) -> Self {
            Self {
                now: Cell::new(start),
                step,
                reads: Cell::new(0),
            }
        }
    }

    impl CycleSource for &FakeCycles {
        fn cycles(&self) -> u32 {
            let v = self.now.get();
            self.now.set(v.wrapping_add(self.step));
            self.reads.set(self.reads.get() + 1);
            v
        }
    }

    #[test]
    fn test_delay_us_waits_requested_cycles() {
        let fake = FakeCycles::new(0, 1);
        let mut delay = CycleDelay::with_rate(&fake, 8);
        delay.delay_us(5);
        // 40 cycles elapsed; one read for start plus one per poll
        assert!(fake.now.get() >= 40);
        assert!(fake.now.get() <= 42);
    }

    #[test]
    fn test_delay_zero_returns_immediately() {
        let fake = FakeCycles::new(0, 1);
        let mut delay = CycleDelay::with_rate(&fake, 108);
        delay.delay_us(0);
        assert_eq!(fake.reads.get(), 0);
    }

    #[test]
    fn test_delay_across_counter_wrap() {
        let fake = FakeCycles::new(u32::MAX - 10, 1);
        let mut delay = CycleDelay::with_rate(&fake, 4);
        delay.delay_us(10);
        // Counter wrapped; the final poll saw exactly 40 cycles elapsed
        assert_eq!(fake.now.get().wrapping_sub(u32::MAX - 10), 41);
    }

    #[test]
    fn test_long_delay_is_chunked() {
        let fake = FakeCycles::new(0, 1000);
        let mut delay = CycleDelay::with_rate(&fake, 108);
        delay.delay_us(25_000);
        let elapsed = fake.now.get() as u64;
        assert!(elapsed >= 25_000 * 108);
    }

    #[test]
    fn test_delay_ns_rounds_up() {
        let fake = FakeCycles::new(0, 1);
        let mut delay = CycleDelay::with_rate(&fake, 108);
        DelayNs::delay_ns(&mut delay, 10);
        // 10 ns at 108 MHz is 1.08 cycles, so at least 2
        assert!(fake.now.get() >= 2);
    }
}
