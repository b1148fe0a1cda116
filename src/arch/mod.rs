//! # Architecture Abstraction Layer
//!
//! Hardware boundary for the scheduler. The Cortex-M4 port is compiled for
//! bare-metal targets only; host builds (unit tests) get a spinning stand-in
//! for the low-power wait.

#[cfg(target_os = "none")]
pub mod cortex_m4;

#[cfg(target_os = "none")]
pub use cortex_m4::wait_for_interrupt;

/// Host stand-in: there is no interrupt to wait for, so just yield the spin.
#[cfg(not(target_os = "none"))]
#[inline]
pub fn wait_for_interrupt() {
    core::hint::spin_loop();
}
