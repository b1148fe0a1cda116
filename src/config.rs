//! # Configuration
//!
//! Compile-time constants governing the scheduler and the station clock tree.
//! All limits are fixed at compile time; there is no dynamic allocation.

/// Number of task slots in the task table. Starting a task when every slot
/// is taken fails with `SchedError::AllocationFailed`.
pub const MAX_TASKS: usize = 16;

/// SysTick frequency in Hz. One tick is one millisecond of scheduler time.
pub const TICK_HZ: u32 = 1000;

/// Number of ready-queue priority levels (`Low`, `Normal`, `High`, `Critical`).
pub const PRIORITY_LEVELS: usize = 4;

/// AHB clock in Hz. The GD32F350 runs its core and SysTick from AHB at
/// 108 MHz once `SystemInit` has configured the PLL.
pub const SYSTEM_CLOCK_HZ: u32 = 108_000_000;

/// DWT cycles per microsecond, used by the busy-wait delay.
pub const CYCLES_PER_US: u32 = SYSTEM_CLOCK_HZ / 1_000_000;
