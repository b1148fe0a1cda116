//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the GD32F3x0 (ARM Cortex-M4, Thumb-2):
//!
//! - **SysTick** fires every millisecond and drives the scheduler tick
//! - **DWT `CYCCNT`** is the free-running cycle counter behind `delay_us`
//! - **WFI** parks the core between main-loop iterations and in `delay_ms`
//!
//! ## Interrupt Priority
//!
//! SysTick runs at the lowest exception priority (0xF0 with 4 priority bits)
//! so peripheral ISRs (ADC DMA, WS2812 DMA) are never delayed by the task
//! table scan.

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{DCB, DWT, SCB, SYST};

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::delay::CycleSource;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the core clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Put SysTick at the lowest exception priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    unsafe {
        scb.set_priority(SystemHandler::SysTick, 0xF0);
    }
}

// ---------------------------------------------------------------------------
// DWT cycle counter
// ---------------------------------------------------------------------------

/// Enable trace and start `CYCCNT` from zero.
pub fn enable_cycle_counter(dcb: &mut DCB, dwt: &mut DWT) {
    dcb.enable_trace();
    DWT::unlock();
    dwt.set_cycle_count(0);
    dwt.enable_cycle_counter();
}

/// `CYCCNT` as a [`CycleSource`]. Only valid after `enable_cycle_counter`.
#[derive(Clone, Copy)]
pub struct DwtCycles;

impl CycleSource for DwtCycles {
    #[inline]
    fn cycles(&self) -> u32 {
        DWT::cycle_count()
    }
}

// ---------------------------------------------------------------------------
// Low-power wait
// ---------------------------------------------------------------------------

/// Sleep until the next interrupt.
#[inline]
pub fn wait_for_interrupt() {
    cortex_m::asm::wfi();
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler: the scheduler tick entry point.
///
/// Advances the millisecond clock and evaluates every running task inside
/// one critical section.
#[cortex_m_rt::exception]
fn SysTick() {
    crate::kernel::KERNEL.on_tick();
}
