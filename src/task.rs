//! # Task Model
//!
//! Defines the schedulable unit of work: its identity, priority, action and
//! timing record. Records live in a fixed arena owned by the scheduler; a
//! slot is free whenever its record is `Stopped`.
//!
//! A task's action is opaque to the scheduler. It is either a zero-argument
//! callback tagged with a name (the name is the callback's lookup identity)
//! or a [`Semaphore`] flag that activation raises for a polling loop to
//! consume.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Handle returned by `start`. Unique among live (non-stopped) tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub struct TaskId(pub u16);

impl TaskId {
    /// Reserved value carried by stopped records. Never handed out.
    pub const INVALID: TaskId = TaskId(0xFFFF);

    /// First id handed out after reset.
    pub const FIRST: TaskId = TaskId(1);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0 && self.0 != 0
    }

    /// The id following `self`, skipping `0` and the reserved value on wrap.
    pub const fn successor(self) -> TaskId {
        let mut next = self.0.wrapping_add(1);
        if next == 0 || next == Self::INVALID.0 {
            next = Self::FIRST.0;
        }
        TaskId(next)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Dispatch precedence. Fixed at creation; selects the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Scan order used by the dispatcher.
    pub const DESCENDING: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Index of this level's ready queue.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a task record.
///
/// ```text
///                start()                 suspend()
///   ┌─────────┐ ─────────► ┌─────────┐ ─────────► ┌───────────┐
///   │ Stopped │            │ Running │            │ Suspended │
///   └─────────┘ ◄───────── └─────────┘ ◄───────── └───────────┘
///        ▲     stop() /         │ tick()   resume()      │
///        │     one-shot fired   └──┘                     │
///        └──────────────────────────────────────────────┘
///                              stop()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Free slot. Carries no identity and no live timing.
    Stopped,
    /// Counting down; activates when the countdown reaches zero.
    Running,
    /// Parked with its countdown frozen; never activates.
    Suspended,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Single-byte signal raised by a semaphore task.
///
/// The scheduler only ever stores `1`; clearing it is the consumer's job.
pub struct Semaphore {
    flag: AtomicU8,
}

impl Semaphore {
    pub const fn new() -> Self {
        Self {
            flag: AtomicU8::new(0),
        }
    }

    /// Raise the flag.
    #[inline]
    pub fn give(&self) {
        self.flag.store(1, Ordering::Release);
    }

    /// Consume the flag, returning whether it was raised.
    #[inline]
    pub fn take(&self) -> bool {
        self.flag.swap(0, Ordering::Acquire) != 0
    }

    /// Peek without consuming.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::Acquire) != 0
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

/// What a task does when dispatched.
#[derive(Clone, Copy)]
pub enum Action {
    /// Invoke `run`. `name` is the callback identity used by
    /// [`Selector::Callback`] and must be unique among live tasks.
    Callback { name: &'static str, run: fn() },
    /// Set the referenced flag to 1.
    Semaphore(&'static Semaphore),
}

impl Action {
    /// Execute the action to completion.
    #[inline]
    pub fn execute(&self) {
        match self {
            Action::Callback { run, .. } => run(),
            Action::Semaphore(flag) => flag.give(),
        }
    }

    /// Callback identity, if this is a callback action.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Action::Callback { name, .. } => Some(*name),
            Action::Semaphore(_) => None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Action::Callback { .. } => TaskKind::Callback,
            Action::Semaphore(_) => TaskKind::Semaphore,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Callback { name, .. } => f.debug_tuple("Callback").field(name).finish(),
            Action::Semaphore(_) => f.write_str("Semaphore"),
        }
    }
}

/// Discriminant of [`Action`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum TaskKind {
    Callback,
    Semaphore,
}

/// How a control operation addresses its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum Selector {
    /// The name given to a callback action at start time.
    Callback(&'static str),
    /// The id returned by start.
    Id(TaskId),
}

impl From<TaskId> for Selector {
    fn from(id: TaskId) -> Self {
        Selector::Id(id)
    }
}

// ---------------------------------------------------------------------------
// Task record
// ---------------------------------------------------------------------------

/// One slot of the task table.
///
/// `counter_ms` belongs to the tick path; everything else is written by the
/// control API. Both run inside the scheduler's critical section.
#[derive(Clone, Copy, Debug)]
pub struct TaskRecord {
    pub id: TaskId,
    pub state: TaskState,
    pub priority: Priority,
    /// `None` only for a free slot. A fired one-shot keeps its action until
    /// the dispatcher consumes the pending activation.
    pub action: Option<Action>,
    pub interval_ms: u32,
    pub counter_ms: u32,
    pub last_run_ms: u32,
    pub oneshot: bool,
    /// Activations enqueued since start.
    pub activations: u32,
}

impl TaskRecord {
    /// A free slot. Used to initialize the arena.
    pub const EMPTY: TaskRecord = TaskRecord {
        id: TaskId::INVALID,
        state: TaskState::Stopped,
        priority: Priority::Normal,
        action: None,
        interval_ms: 0,
        counter_ms: 0,
        last_run_ms: 0,
        oneshot: false,
        activations: 0,
    };

    /// Initialize a free slot as a running task.
    pub fn init(
        &mut self,
        id: TaskId,
        action: Action,
        interval_ms: u32,
        priority: Priority,
        oneshot: bool,
        now: u32,
    ) {
        *self = TaskRecord {
            id,
            state: TaskState::Running,
            priority,
            action: Some(action),
            interval_ms,
            counter_ms: interval_ms,
            last_run_ms: now,
            oneshot,
            activations: 0,
        };
    }

    /// Return the slot to the free pool.
    pub fn clear(&mut self) {
        *self = TaskRecord::EMPTY;
    }

    /// Drop identity and timing after a one-shot fired, keeping the action
    /// and priority so the queued activation can still be dispatched.
    pub fn retire(&mut self) {
        self.id = TaskId::INVALID;
        self.state = TaskState::Stopped;
        self.interval_ms = 0;
        self.counter_ms = 0;
        self.oneshot = false;
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state != TaskState::Stopped
    }

    /// Does this live record answer to `selector`?
    pub fn matches(&self, selector: Selector) -> bool {
        if !self.is_live() {
            return false;
        }
        match selector {
            Selector::Id(id) => id.is_valid() && self.id == id,
            Selector::Callback(name) => self.action.and_then(|a| a.name()) == Some(name),
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            state: self.state,
            priority: self.priority,
            kind: self.action.map(|a| a.kind()),
            interval_ms: self.interval_ms,
            counter_ms: self.counter_ms,
            last_run_ms: self.last_run_ms,
            activations: self.activations,
            oneshot: self.oneshot,
        }
    }
}

/// Copyable snapshot of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub struct TaskInfo {
    pub id: TaskId,
    pub state: TaskState,
    pub priority: Priority,
    pub kind: Option<TaskKind>,
    pub interval_ms: u32,
    pub counter_ms: u32,
    pub last_run_ms: u32,
    pub activations: u32,
    pub oneshot: bool,
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
