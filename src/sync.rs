//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. All shared scheduler state
//! is reached through a critical section so the SysTick handler and the main
//! loop never observe each other's half-finished updates.
//!
//! On the target the critical section masks interrupts (PRIMASK) and restores
//! the previous mask on every exit path, via `cortex-m`'s
//! `critical-section-single-core` implementation. Host test builds use the
//! `critical-section` crate's `std` implementation instead.

use core::cell::RefCell;

pub use critical_section::CriticalSection;

/// Execute a closure within a critical section (interrupts masked).
///
/// Keep the closure short: the tick interrupt is held off for its duration.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// A value shared between interrupt and thread context.
///
/// Access is only possible inside a critical section, and the borrow ends
/// when the closure returns, so a reference can never outlive the masked
/// region.
pub struct Shared<T> {
    inner: critical_section::Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: critical_section::Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access, entering a critical section.
    #[inline]
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section(|cs| f(&mut *self.inner.borrow_ref_mut(cs)))
    }

    /// Run `f` with exclusive access under an already-held critical section.
    #[inline]
    pub fn lock_in<R>(&self, cs: CriticalSection<'_>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.inner.borrow_ref_mut(cs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_lock_mutates() {
        static COUNTER: Shared<u32> = Shared::new(0);
        COUNTER.lock(|c| *c += 2);
        let seen = critical_section(|cs| COUNTER.lock_in(cs, |c| *c));
        assert_eq!(seen, 2);
    }
}
