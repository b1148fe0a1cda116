//! # Millisecond Clock
//!
//! Monotonic tick counter advanced once per SysTick interrupt. The counter is
//! a single `AtomicU32`, so `now()` is one untorn load from any context and
//! never needs to mask the tick.
//!
//! All interval arithmetic is wrap-safe: the counter rolls over after about
//! 49.7 days and `elapsed` stays correct across the rollover.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// `now - start >= timeout`, in wrapping `u32` arithmetic.
#[inline]
pub const fn has_elapsed(start: u32, now: u32, timeout: u32) -> bool {
    now.wrapping_sub(start) >= timeout
}

pub struct Clock {
    ticks: AtomicU32,
    started: AtomicBool,
}

impl Clock {
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// A clock whose first tick will read `ticks + 1`.
    pub const fn starting_at(ticks: u32) -> Self {
        Self {
            ticks: AtomicU32::new(ticks),
            started: AtomicBool::new(false),
        }
    }

    /// Mark the clock live. Called once the SysTick is armed.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Current tick count, or 0 before the clock has been started.
    #[inline]
    pub fn now(&self) -> u32 {
        if !self.is_started() {
            return 0;
        }
        self.ticks.load(Ordering::Acquire)
    }

    /// Has `timeout` ms passed since `start`?
    #[inline]
    pub fn elapsed(&self, start: u32, timeout: u32) -> bool {
        has_elapsed(start, self.now(), timeout)
    }

    /// Advance by one tick and return the new count.
    ///
    /// Interrupt context only: the SysTick handler is the single writer, so a
    /// load/store pair is enough and works on cores without RMW atomics.
    #[inline]
    pub fn advance(&self) -> u32 {
        let next = self.ticks.load(Ordering::Relaxed).wrapping_add(1);
        self.ticks.store(next, Ordering::Release);
        next
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
