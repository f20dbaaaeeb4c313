//! Published class records and the per-class static-initializer protocol.

use parking_lot::{Condvar, Mutex};

use crate::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use crate::classfile::parser::{CodeAttribute, ParseError, ParsedClass, RawAttribute};
use crate::classfile::CPool;
use crate::string_pool::{NameIndex, StringPool, INVALID_NAME};

/// Lifecycle of a class's `<clinit>`. Transitions are monotonic:
/// `NotRun -> Running -> {Run, Failed}`, and `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClInitState {
    NotRun,
    Running,
    Run,
    Failed,
}

/// What the caller of [`ClInitCell::begin`] must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClInitAction {
    /// This thread won the transition and must execute `<clinit>`, then call
    /// `complete` or `fail`.
    Run,
    /// Initialization already reached `Run` (possibly after blocking on
    /// another thread), or this thread re-entered its own in-progress
    /// initialization; proceed without running anything.
    Skip,
    /// A previous initialization attempt failed; the class is unusable.
    Failed,
}

/// The `<clinit>` state machine, kept separate from the method-area lock so
/// that no lock is held across arbitrary bytecode execution.
#[derive(Debug)]
pub struct ClInitCell {
    state: Mutex<ClInitSlot>,
    cond: Condvar,
}

#[derive(Debug)]
struct ClInitSlot {
    state: ClInitState,
    /// Thread currently running the initializer, if any. Used to let the
    /// same thread re-enter (it skips, per the JLS) while others block.
    owner: Option<u64>,
}

impl ClInitCell {
    #[must_use]
    pub fn new() -> ClInitCell {
        ClInitCell {
            state: Mutex::new(ClInitSlot {
                state: ClInitState::NotRun,
                owner: None,
            }),
            cond: Condvar::new(),
        }
    }

    /// A cell for classes that carry no initializer (or synthesized records),
    /// already in the `Run` state.
    #[must_use]
    pub fn already_run() -> ClInitCell {
        ClInitCell {
            state: Mutex::new(ClInitSlot {
                state: ClInitState::Run,
                owner: None,
            }),
            cond: Condvar::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ClInitState {
        self.state.lock().state
    }

    /// Attempt the `NotRun -> Running` transition for `thread`.
    pub fn begin(&self, thread: u64) -> ClInitAction {
        let mut slot = self.state.lock();
        loop {
            match slot.state {
                ClInitState::NotRun => {
                    slot.state = ClInitState::Running;
                    slot.owner = Some(thread);
                    return ClInitAction::Run;
                }
                ClInitState::Running => {
                    if slot.owner == Some(thread) {
                        // Recursive attempt by the initializing thread.
                        return ClInitAction::Skip;
                    }
                    self.cond.wait(&mut slot);
                }
                ClInitState::Run => return ClInitAction::Skip,
                ClInitState::Failed => return ClInitAction::Failed,
            }
        }
    }

    /// `Running -> Run`. Wakes any threads blocked in [`begin`].
    pub fn complete(&self) {
        let mut slot = self.state.lock();
        debug_assert_eq!(slot.state, ClInitState::Running);
        slot.state = ClInitState::Run;
        slot.owner = None;
        self.cond.notify_all();
    }

    /// `Running -> Failed`. Terminal.
    pub fn fail(&self) {
        let mut slot = self.state.lock();
        debug_assert_eq!(slot.state, ClInitState::Running);
        slot.state = ClInitState::Failed;
        slot.owner = None;
        self.cond.notify_all();
    }
}

impl Default for ClInitCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FieldRec {
    pub name: String,
    pub descriptor: String,
    pub access_flags: FieldAccessFlags,
    /// Pool index of the `ConstantValue` entry, if the field carries one.
    pub constant_value: Option<u16>,
}

impl FieldRec {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct MethodRec {
    pub name: String,
    pub descriptor: String,
    pub access_flags: MethodAccessFlags,
    pub code: Option<CodeAttribute>,
    pub attributes: Vec<RawAttribute>,
}

impl MethodRec {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }
}

/// A class as published in the method area. Records are publish-once: after
/// insertion only the `clinit` cell ever changes.
#[derive(Debug)]
pub struct ClData {
    /// Interned internal name.
    pub name: NameIndex,
    /// Interned superclass name; `INVALID_NAME` only for `java/lang/Object`
    /// and synthesized roots.
    pub superclass: NameIndex,
    /// Interned names of the direct superinterfaces.
    pub interfaces: Vec<NameIndex>,
    pub fields: Vec<FieldRec>,
    pub methods: Vec<MethodRec>,
    pub attributes: Vec<RawAttribute>,
    pub source_file: Option<String>,
    pub cp: CPool,
    pub access_flags: ClassAccessFlags,
    pub major_version: u16,
    pub clinit: ClInitCell,
    /// True for classes from the trusted JDK bundle and synthesized
    /// bootstrap records; these skipped the format checker.
    pub trusted: bool,
}

impl ClData {
    /// Convert a checked parse result into a publishable record, interning
    /// every name that outlives the class file.
    pub fn from_parsed(
        parsed: ParsedClass,
        pool: &StringPool,
        trusted: bool,
    ) -> Result<ClData, ParseError> {
        let name = pool.intern(parsed.this_class_name()?);
        let superclass = match parsed.super_class_name()? {
            Some(super_name) => pool.intern(super_name),
            None => INVALID_NAME,
        };

        let mut interfaces = Vec::with_capacity(parsed.interfaces.len());
        for interface in &parsed.interfaces {
            let interface_name =
                parsed
                    .cp
                    .class_name(*interface)
                    .map_err(|_| ParseError::BadCrossReference {
                        index: *interface,
                    })?;
            interfaces.push(pool.intern(interface_name));
        }

        let fields = parsed
            .fields
            .into_iter()
            .map(|f| FieldRec {
                name: f.name,
                descriptor: f.descriptor,
                access_flags: f.access_flags,
                constant_value: f.constant_value,
            })
            .collect();

        let methods = parsed
            .methods
            .into_iter()
            .map(|m| MethodRec {
                name: m.name,
                descriptor: m.descriptor,
                access_flags: m.access_flags,
                code: m.code,
                attributes: m.attributes,
            })
            .collect();

        Ok(ClData {
            name,
            superclass,
            interfaces,
            fields,
            methods,
            attributes: parsed.attributes,
            source_file: parsed.source_file,
            cp: parsed.cp,
            access_flags: parsed.access_flags,
            major_version: parsed.major_version,
            // Even without its own `<clinit>`, first active use must walk to
            // the superclass initializer, so the cell starts at NotRun.
            clinit: ClInitCell::new(),
            trusted,
        })
    }

    /// A synthesized record with no backing class file, used for bootstrap
    /// classes whose behavior lives entirely in intrinsics.
    #[must_use]
    pub fn synthesized(
        name: NameIndex,
        superclass: NameIndex,
        fields: Vec<FieldRec>,
    ) -> ClData {
        ClData {
            name,
            superclass,
            interfaces: Vec::new(),
            fields,
            methods: Vec::new(),
            attributes: Vec::new(),
            source_file: None,
            cp: CPool::default(),
            access_flags: ClassAccessFlags::PUBLIC,
            major_version: 0,
            clinit: ClInitCell::already_run(),
            trusted: true,
        }
    }

    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Locate a declared method by name and descriptor.
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<(usize, &MethodRec)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name && m.descriptor == descriptor)
    }

    /// Locate a declared field by name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldRec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinit_transitions_are_monotonic() {
        let cell = ClInitCell::new();
        assert_eq!(cell.state(), ClInitState::NotRun);

        assert_eq!(cell.begin(1), ClInitAction::Run);
        assert_eq!(cell.state(), ClInitState::Running);

        // The winning thread re-entering is told to proceed without running.
        assert_eq!(cell.begin(1), ClInitAction::Skip);

        cell.complete();
        assert_eq!(cell.state(), ClInitState::Run);
        assert_eq!(cell.begin(2), ClInitAction::Skip);
    }

    #[test]
    fn clinit_failure_is_terminal() {
        let cell = ClInitCell::new();
        assert_eq!(cell.begin(1), ClInitAction::Run);
        cell.fail();
        assert_eq!(cell.state(), ClInitState::Failed);
        assert_eq!(cell.begin(1), ClInitAction::Failed);
        assert_eq!(cell.begin(2), ClInitAction::Failed);
    }

    #[test]
    fn waiting_thread_observes_completion() {
        use std::sync::Arc;

        let cell = Arc::new(ClInitCell::new());
        assert_eq!(cell.begin(1), ClInitAction::Run);

        let waiter = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.begin(2))
        };

        // Give the waiter time to block, then finish initialization.
        std::thread::sleep(std::time::Duration::from_millis(20));
        cell.complete();

        assert_eq!(waiter.join().unwrap(), ClInitAction::Skip);
    }
}
