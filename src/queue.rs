//! # Priority Ready Queues
//!
//! One FIFO per priority level holding task-table slots whose countdown has
//! expired and that are waiting for the dispatcher.
//!
//! ## Layout
//!
//! The lists are intrusive over the task arena: a queue stores slot indices,
//! and the `next` link of each slot lives here rather than in the record.
//! Only the queue holding a slot ever writes its link, and the link is `None`
//! whenever the slot is not enqueued.
//!
//! ```text
//!   Critical: head ─► [3] ─► [9] ◄─ tail
//!   High:     (empty)
//!   Normal:   head ─► [0] ◄─ tail
//!   Low:      head ─► [5] ─► [1] ─► [12] ◄─ tail
//! ```
//!
//! Enqueue is idempotent: a slot already present in its list is left where it
//! is. The membership check is a linear walk, bounded by `MAX_TASKS`.

use crate::config::{MAX_TASKS, PRIORITY_LEVELS};
use crate::task::Priority;

#[derive(Clone, Copy)]
struct List {
    head: Option<u8>,
    tail: Option<u8>,
    len: u8,
}

impl List {
    const EMPTY: List = List {
        head: None,
        tail: None,
        len: 0,
    };
}

/// Four FIFO lists over the task arena.
pub struct ReadyQueues {
    lists: [List; PRIORITY_LEVELS],
    next: [Option<u8>; MAX_TASKS],
}

impl ReadyQueues {
    pub const fn new() -> Self {
        Self {
            lists: [List::EMPTY; PRIORITY_LEVELS],
            next: [None; MAX_TASKS],
        }
    }

    /// Is `slot` currently linked into the `priority` list?
    pub fn contains(&self, slot: usize, priority: Priority) -> bool {
        let mut cursor = self.lists[priority.index()].head;
        while let Some(idx) = cursor {
            if idx as usize == slot {
                return true;
            }
            cursor = self.next[idx as usize];
        }
        false
    }

    /// Append `slot` to the tail of its priority's list.
    ///
    /// Returns `true` if the slot was linked, `false` if it was already
    /// queued (the queue is unchanged) or out of range.
    pub fn enqueue(&mut self, slot: usize, priority: Priority) -> bool {
        if slot >= MAX_TASKS || self.contains(slot, priority) {
            return false;
        }

        let idx = slot as u8;
        self.next[slot] = None;

        let list = &mut self.lists[priority.index()];
        match list.tail {
            Some(tail) => self.next[tail as usize] = Some(idx),
            None => list.head = Some(idx),
        }
        list.tail = Some(idx);
        list.len += 1;
        true
    }

    /// Pop the head of the highest-priority non-empty list.
    pub fn dequeue_highest(&mut self) -> Option<usize> {
        for priority in Priority::DESCENDING {
            let list = &mut self.lists[priority.index()];
            if let Some(head) = list.head {
                let slot = head as usize;
                list.head = self.next[slot];
                if list.head.is_none() {
                    list.tail = None;
                }
                list.len -= 1;
                self.next[slot] = None;
                return Some(slot);
            }
        }
        None
    }

    /// Unlink `slot` from the `priority` list. Returns whether it was there.
    pub fn remove(&mut self, slot: usize, priority: Priority) -> bool {
        if slot >= MAX_TASKS {
            return false;
        }

        let list = &mut self.lists[priority.index()];
        let mut prev: Option<u8> = None;
        let mut cursor = list.head;

        while let Some(idx) = cursor {
            if idx as usize == slot {
                let after = self.next[slot];
                match prev {
                    Some(p) => self.next[p as usize] = after,
                    None => list.head = after,
                }
                if list.tail == Some(idx) {
                    list.tail = prev;
                }
                list.len -= 1;
                self.next[slot] = None;
                return true;
            }
            prev = cursor;
            cursor = self.next[idx as usize];
        }
        false
    }

    /// Number of slots waiting at `priority`.
    #[inline]
    pub fn len(&self, priority: Priority) -> usize {
        self.lists[priority.index()].len as usize
    }

    /// Number of slots waiting across all priorities.
    pub fn total_len(&self) -> usize {
        self.lists.iter().map(|l| l.len as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|l| l.head.is_none())
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
