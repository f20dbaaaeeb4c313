//! Per-thread execution state: the frame stack and the shared thread table.
//!
//! Each Java thread maps to one native thread and owns its frame stack
//! exclusively; the table only carries the cooperative flags other threads
//! may set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::frame::Frame;
use crate::FatalError;

/// Default bound on frame-stack depth. Exceeding it is a fault, not a
/// throwable `StackOverflowError`; the bound exists to catch runaway
/// recursion inside the VM itself.
pub const DEFAULT_MAX_FRAMES: usize = 2048;

/// LIFO stack of activation records, exclusively owned by one thread.
#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl FrameStack {
    #[must_use]
    pub fn new(max_depth: usize) -> FrameStack {
        FrameStack {
            frames: Vec::with_capacity(16),
            max_depth,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), FatalError> {
        if self.frames.len() >= self.max_depth {
            return Err(FatalError::FrameStackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The executing frame.
    #[must_use]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Frame at an absolute depth, 0 being the root.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Frames from the executing frame toward the root.
    pub fn iter_top_down(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }

    /// Drop every frame above `depth`, leaving `depth` frames.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }
}

/// A Java thread: identity, frame stack, and its thread-local trace flag.
#[derive(Debug)]
pub struct JavaThread {
    pub id: u64,
    pub frames: FrameStack,
    /// Emit one trace line per decoded instruction.
    pub trace_insts: bool,
}

impl JavaThread {
    #[must_use]
    pub fn new(id: u64) -> JavaThread {
        JavaThread {
            id,
            frames: FrameStack::new(DEFAULT_MAX_FRAMES),
            trace_insts: false,
        }
    }
}

/// Cooperative per-thread flags, readable by intrinsics and exception paths.
#[derive(Debug, Default, Clone)]
pub struct ThreadFlags {
    pub interrupted: bool,
    pub daemon: bool,
}

/// The process-wide thread table.
#[derive(Debug, Default)]
pub struct ThreadTable {
    next_id: AtomicU64,
    threads: RwLock<HashMap<u64, ThreadFlags>>,
}

impl ThreadTable {
    #[must_use]
    pub fn new() -> ThreadTable {
        ThreadTable {
            next_id: AtomicU64::new(1),
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new thread and return its id.
    pub fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.threads.write().insert(id, ThreadFlags::default());
        id
    }

    pub fn unregister(&self, id: u64) {
        self.threads.write().remove(&id);
    }

    #[must_use]
    pub fn flags(&self, id: u64) -> Option<ThreadFlags> {
        self.threads.read().get(&id).cloned()
    }

    pub fn set_interrupted(&self, id: u64, interrupted: bool) {
        if let Some(flags) = self.threads.write().get_mut(&id) {
            flags.interrupted = interrupted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stack_is_lifo() {
        let mut stack = FrameStack::new(8);
        stack.push(Frame::with_code(vec![0xb1])).unwrap();
        stack.push(Frame::with_code(vec![0x00, 0xb1])).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap().bytecode().len(), 2);
        assert_eq!(stack.pop().unwrap().bytecode().len(), 1);
        assert!(stack.pop().is_none());
    }

    #[test]
    fn depth_bound_is_a_fault() {
        let mut stack = FrameStack::new(1);
        stack.push(Frame::with_code(vec![0xb1])).unwrap();
        assert!(matches!(
            stack.push(Frame::with_code(vec![0xb1])),
            Err(FatalError::FrameStackOverflow)
        ));
    }

    #[test]
    fn thread_table_hands_out_unique_ids() {
        let table = ThreadTable::new();
        let a = table.register();
        let b = table.register();
        assert_ne!(a, b);
        assert!(table.flags(a).is_some());
        table.unregister(a);
        assert!(table.flags(a).is_none());
    }
}
