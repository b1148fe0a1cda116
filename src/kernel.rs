//! # Kernel
//!
//! The station's single scheduler instance and its public API.
//!
//! `KERNEL` is the one process-wide handle: it is what the SysTick vector
//! reaches, and what the main loop and task bodies call into. It pairs the
//! lock-free millisecond [`Clock`] with the [`Scheduler`] behind a
//! critical-section mutex. Every task-table or ready-queue access masks the
//! tick for its duration; dispatched actions run with the tick unmasked.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()             ← SysTick + DWT, clock live
//!         ├─► kernel::start_periodic()   ← register tasks (×N)
//!         └─► loop {
//!               if !kernel::run_once() { wfi }
//!             }
//! ```

use crate::arch;
use crate::clock::Clock;
use crate::error::SchedError;
use crate::scheduler::{Activation, Scheduler};
use crate::sync::{self, Shared};
use crate::task::{Action, Priority, Selector, Semaphore, TaskId, TaskInfo};

// ---------------------------------------------------------------------------
// Kernel handle
// ---------------------------------------------------------------------------

/// Clock plus task table, safe to share between the tick ISR and thread mode.
pub struct Kernel {
    clock: Clock,
    sched: Shared<Scheduler>,
}

/// Global kernel instance. The SysTick handler and the firmware both use it.
pub static KERNEL: Kernel = Kernel::new();

impl Kernel {
    pub const fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub const fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            sched: Shared::new(Scheduler::new()),
        }
    }

    /// Mark the clock live. `now()` reads 0 until this is called.
    pub fn start_clock(&self) {
        self.clock.start();
    }

    // -----------------------------------------------------------------------
    // Tick (interrupt context)
    // -----------------------------------------------------------------------

    /// One millisecond has passed. Called from the SysTick handler.
    pub fn on_tick(&self) {
        sync::critical_section(|cs| {
            let now = self.clock.advance();
            self.sched.lock_in(cs, |s| s.tick(now));
        });
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    #[inline]
    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    #[inline]
    pub fn elapsed(&self, start: u32, timeout: u32) -> bool {
        self.clock.elapsed(start, timeout)
    }

    /// Sleep-wait for `ms` milliseconds, parking the core between ticks.
    pub fn delay_ms(&self, ms: u32) {
        self.delay_ms_with(ms, arch::wait_for_interrupt);
    }

    /// `delay_ms` with an explicit idle step run between polls.
    pub fn delay_ms_with(&self, ms: u32, mut idle: impl FnMut()) {
        if ms == 0 {
            return;
        }
        let start = self.now();
        while !self.elapsed(start, ms) {
            idle();
        }
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    /// Run the single highest-priority ready action, if any.
    ///
    /// The activation is taken under the critical section and executed after
    /// it is released, so the action may itself call into the kernel and the
    /// tick keeps running while it executes. Returns whether an action ran.
    pub fn run_once(&self) -> bool {
        let next: Option<Activation> = self.sched.lock(|s| s.pop_ready());
        match next {
            Some(activation) => {
                activation.execute();
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Task control
    // -----------------------------------------------------------------------

    pub fn start(
        &self,
        action: Action,
        interval_ms: u32,
        priority: Priority,
        oneshot: bool,
    ) -> Result<TaskId, SchedError> {
        let result = self
            .sched
            .lock(|s| s.start(action, interval_ms, priority, oneshot));
        if let Err(_err) = result {
            log_error!("start {} failed: {}", action.name().unwrap_or("semaphore"), _err);
        }
        result
    }

    pub fn start_periodic(
        &self,
        name: &'static str,
        run: fn(),
        interval_ms: u32,
        priority: Priority,
    ) -> Result<TaskId, SchedError> {
        self.start(Action::Callback { name, run }, interval_ms, priority, false)
    }

    pub fn start_oneshot(
        &self,
        name: &'static str,
        run: fn(),
        delay_ms: u32,
        priority: Priority,
    ) -> Result<TaskId, SchedError> {
        self.start(Action::Callback { name, run }, delay_ms, priority, true)
    }

    pub fn start_semaphore(
        &self,
        flag: &'static Semaphore,
        interval_ms: u32,
        priority: Priority,
    ) -> Result<TaskId, SchedError> {
        self.start(Action::Semaphore(flag), interval_ms, priority, false)
    }

    pub fn suspend(&self, selector: impl Into<Selector>) -> Result<(), SchedError> {
        let selector = selector.into();
        self.sched.lock(|s| s.suspend(selector))?;
        log_debug!("suspended {}", selector);
        Ok(())
    }

    pub fn resume(&self, selector: impl Into<Selector>) -> Result<(), SchedError> {
        let selector = selector.into();
        self.sched.lock(|s| s.resume(selector))?;
        log_debug!("resumed {}", selector);
        Ok(())
    }

    pub fn stop(&self, selector: impl Into<Selector>) -> Result<(), SchedError> {
        let selector = selector.into();
        self.sched.lock(|s| s.stop(selector))?;
        log_debug!("stopped {}", selector);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn active_count(&self) -> usize {
        self.sched.lock(|s| s.active_count())
    }

    pub fn ready_len(&self) -> usize {
        self.sched.lock(|s| s.ready_len())
    }

    pub fn info(&self, selector: impl Into<Selector>) -> Option<TaskInfo> {
        let selector = selector.into();
        self.sched.lock(|s| s.info(selector))
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Firmware API (global instance)
// ---------------------------------------------------------------------------

/// Bring up the timebase: DWT cycle counter, SysTick at 1 kHz, then mark the
/// clock live. Call once from `main` before starting tasks.
#[cfg(target_os = "none")]
pub fn init(cp: &mut cortex_m::Peripherals) {
    use crate::arch::cortex_m4;

    cortex_m4::enable_cycle_counter(&mut cp.DCB, &mut cp.DWT);
    cortex_m4::set_interrupt_priorities(&mut cp.SCB);
    cortex_m4::configure_systick(&mut cp.SYST);
    KERNEL.start_clock();
    log_info!("kernel up: {} task slots", crate::config::MAX_TASKS);
}

/// Milliseconds since `init`.
#[inline]
pub fn now() -> u32 {
    KERNEL.now()
}

#[inline]
pub fn elapsed(start: u32, timeout: u32) -> bool {
    KERNEL.elapsed(start, timeout)
}

pub fn delay_ms(ms: u32) {
    KERNEL.delay_ms(ms);
}

/// Busy-wait on the DWT cycle counter. Does not yield.
#[cfg(target_os = "none")]
pub fn delay_us(us: u32) {
    use crate::arch::cortex_m4::DwtCycles;
    use crate::delay::CycleDelay;

    CycleDelay::new(DwtCycles).delay_us(us);
}

pub fn run_once() -> bool {
    KERNEL.run_once()
}

pub fn start(
    action: Action,
    interval_ms: u32,
    priority: Priority,
    oneshot: bool,
) -> Result<TaskId, SchedError> {
    KERNEL.start(action, interval_ms, priority, oneshot)
}

pub fn start_periodic(
    name: &'static str,
    run: fn(),
    interval_ms: u32,
    priority: Priority,
) -> Result<TaskId, SchedError> {
    KERNEL.start_periodic(name, run, interval_ms, priority)
}

pub fn start_oneshot(
    name: &'static str,
    run: fn(),
    delay_ms: u32,
    priority: Priority,
) -> Result<TaskId, SchedError> {
    KERNEL.start_oneshot(name, run, delay_ms, priority)
}

pub fn start_semaphore(
    flag: &'static Semaphore,
    interval_ms: u32,
    priority: Priority,
) -> Result<TaskId, SchedError> {
    KERNEL.start_semaphore(flag, interval_ms, priority)
}

pub fn suspend(selector: impl Into<Selector>) -> Result<(), SchedError> {
    KERNEL.suspend(selector)
}

pub fn resume(selector: impl Into<Selector>) -> Result<(), SchedError> {
    KERNEL.resume(selector)
}

pub fn stop(selector: impl Into<Selector>) -> Result<(), SchedError> {
    KERNEL.stop(selector)
}

pub fn active_count() -> usize {
    KERNEL.active_count()
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
