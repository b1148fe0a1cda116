//! # Station Firmware
//!
//! Registers the heater station's tasks with the scheduler and runs the
//! cooperative main loop:
//!
//! | Task | Priority | Period | Role |
//! |------|----------|--------|------|
//! | `control` | High | 5 ms | Filter T12 reading, update PID, set heater PWM |
//! | `adc` (semaphore) | High | 2 ms | Tell `control` a fresh ADC frame is due |
//! | `segment` | Normal | 100 ms | Seven-segment (HT1621) temperatures |
//! | `lcd` | Low | 250 ms | Character LCD status lines |
//! | `ws2812` | Low | 25 ms | LED strip effect frame |
//! | `buzzer` | Low | 10 ms | Beep sequencer step |
//! | `heartbeat` | Low | 500 ms | Blink the status LED |
//! | `splash_done` | Low | one-shot 2 s | End the startup screen |
//!
//! The peripheral drivers are collaborators outside the scheduler core; the
//! task bodies below keep only the frame bookkeeping the drivers hang off.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use cortex_m_rt::entry;
    use panic_halt as _;
    #[cfg(feature = "log-defmt")]
    use defmt_rtt as _;

    use heatctl::arch::cortex_m4;
    use heatctl::kernel;
    use heatctl::{Priority, Selector, Semaphore};

    // -----------------------------------------------------------------------
    // Shared station state
    // -----------------------------------------------------------------------

    /// Raised every ADC period; consumed by `control`.
    static ADC_READY: Semaphore = Semaphore::new();

    static CONTROL_CYCLES: AtomicU32 = AtomicU32::new(0);
    static WS2812_FRAME: AtomicU32 = AtomicU32::new(0);
    static BUZZER_STEP: AtomicU32 = AtomicU32::new(0);
    static LED_ON: AtomicBool = AtomicBool::new(false);

    // -----------------------------------------------------------------------
    // Task entry points
    // -----------------------------------------------------------------------

    /// Closed-loop heater control. Skips the cycle when no new sample is due.
    fn control_task() {
        if !ADC_READY.take() {
            return;
        }
        CONTROL_CYCLES.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_task() {}

    fn lcd_task() {}

    /// Switches effect every 400 frames (10 s at 25 ms).
    fn ws2812_task() {
        let frame = WS2812_FRAME.fetch_add(1, Ordering::Relaxed) + 1;
        if frame % 400 == 0 {
            heatctl::log_debug!("ws2812 effect change at frame {}", frame);
        }
    }

    fn buzzer_task() {
        BUZZER_STEP.fetch_add(1, Ordering::Relaxed);
    }

    fn heartbeat_task() {
        LED_ON.fetch_xor(true, Ordering::Relaxed);
    }

    /// Startup screen is over: bring the displays online.
    fn splash_done() {
        let _ = kernel::resume(Selector::Callback("segment"));
        let _ = kernel::resume(Selector::Callback("lcd"));
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    #[entry]
    fn main() -> ! {
        let Some(mut cp) = cortex_m::Peripherals::take() else {
            loop {
                cortex_m::asm::wfi();
            }
        };

        kernel::init(&mut cp);

        // A missing task is a configuration error: halt rather than run a
        // station without its control loop.
        let registered = kernel::start_periodic("control", control_task, 5, Priority::High)
            .and_then(|_| kernel::start_semaphore(&ADC_READY, 2, Priority::High))
            .and_then(|_| kernel::start_periodic("segment", segment_task, 100, Priority::Normal))
            .and_then(|_| kernel::start_periodic("lcd", lcd_task, 250, Priority::Low))
            .and_then(|_| kernel::start_periodic("ws2812", ws2812_task, 25, Priority::Low))
            .and_then(|_| kernel::start_periodic("buzzer", buzzer_task, 10, Priority::Low))
            .and_then(|_| kernel::start_periodic("heartbeat", heartbeat_task, 500, Priority::Low))
            .and_then(|_| kernel::suspend(Selector::Callback("segment")))
            .and_then(|_| kernel::suspend(Selector::Callback("lcd")))
            .and_then(|_| kernel::start_oneshot("splash_done", splash_done, 2000, Priority::Low));

        if registered.is_err() {
            heatctl::log_error!("task registration failed");
            loop {
                cortex_m4::wait_for_interrupt();
            }
        }

        heatctl::log_info!("{} tasks running", kernel::active_count());

        loop {
            if !kernel::run_once() {
                cortex_m4::wait_for_interrupt();
            }
        }
    }
}

/// Host builds have no firmware image; the library is exercised by its tests.
#[cfg(not(target_os = "none"))]
fn main() {}
