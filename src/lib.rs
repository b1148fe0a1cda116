//! # heatctl: scheduler core for a heater control station
//!
//! Cooperative, priority-based task scheduler with interrupt-driven timing
//! for a GD32F3x0 (ARM Cortex-M4) soldering/hot-air station. The control
//! loop, displays, LED strip and buzzer are all scheduled tasks; this crate
//! is the part that decides when each of them runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Station tasks: control, displays, WS2812, buzzer     │
//! ├──────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                 │
//! │  start() suspend() resume() stop() run_once() now()   │
//! ├─────────────────┬──────────────────┬─────────────────┤
//! │ Scheduler       │ Ready Queues     │ Sync            │
//! │ scheduler.rs    │ queue.rs         │ sync.rs         │
//! │  tick()         │  enqueue()       │  Shared<T>      │
//! │  pop_ready()    │  dequeue_highest │  critical_sec.  │
//! ├─────────────────┴──────────────────┴─────────────────┤
//! │  Task model (task.rs)  Clock (clock.rs)  Delay        │
//! ├──────────────────────────────────────────────────────┤
//! │  Arch port (arch/cortex_m4.rs): SysTick, DWT, WFI     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing Model
//!
//! - SysTick fires every 1 ms. The handler advances the clock and counts
//!   down every running task; an expired countdown puts the task on its
//!   priority's ready queue.
//! - The main loop calls `run_once()`: the head of the highest non-empty
//!   queue runs to completion. Tasks never preempt each other.
//! - Priorities: `Critical > High > Normal > Low`, FIFO within a level.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed task arena**: `[TaskRecord; MAX_TASKS]`, queues link by index
//! - **Critical sections**: `critical_section::with()` around every
//!   task-table or queue access

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod arch;
pub mod clock;
pub mod config;
pub mod delay;
pub mod error;
pub mod kernel;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod task;

pub use error::SchedError;
pub use kernel::{Kernel, KERNEL};
pub use task::{Action, Priority, Selector, Semaphore, TaskId, TaskInfo, TaskState};
