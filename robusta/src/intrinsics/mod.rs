//! The intrinsic table: standard-library methods whose bodies are host
//! functions instead of bytecode.
//!
//! Keys are full signatures of the form `pkg/Class.name(Desc)Ret`. The
//! interpreter consults the table after method resolution; a hit
//! short-circuits bytecode dispatch. The table is populated once at startup
//! by the domain loaders below; registering a signature twice is an error.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::value::JvmValue;
use crate::Globals;

pub mod java_io;
pub mod java_lang;
pub mod java_lang_invoke;
pub mod java_lang_string;

/// An exception the intrinsic wants raised in the calling frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedException {
    /// Internal name, e.g. `java/lang/IllegalArgumentException`.
    pub class: String,
    pub message: String,
}

impl RaisedException {
    #[must_use]
    pub fn new(class: &str, message: impl Into<String>) -> RaisedException {
        RaisedException {
            class: class.to_owned(),
            message: message.into(),
        }
    }
}

/// What an intrinsic produced.
#[derive(Debug, Clone, PartialEq)]
pub enum IntrinsicResult {
    /// Void method, nothing to push.
    Void,
    /// A value to push onto the caller's stack (one slot, category 2
    /// included).
    Value(JvmValue),
    Raise(RaisedException),
}

/// Handler signature: positional parameters, receiver at index 0 for
/// instance methods.
pub type IntrinsicFn = fn(&Globals, &mut Vec<JvmValue>) -> IntrinsicResult;

/// Policy for a registered signature.
#[derive(Clone, Copy)]
pub enum IntrinsicKind {
    Func(IntrinsicFn),
    /// Known but unsupported; raises an error naming the signature.
    Trap,
    /// Like `Trap`, but the diagnostic calls out the deprecation.
    TrapDeprecated,
    /// A deliberate no-op that returns nothing.
    JustReturn,
}

impl fmt::Debug for IntrinsicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrinsicKind::Func(_) => f.write_str("Func(..)"),
            IntrinsicKind::Trap => f.write_str("Trap"),
            IntrinsicKind::TrapDeprecated => f.write_str("TrapDeprecated"),
            IntrinsicKind::JustReturn => f.write_str("JustReturn"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Intrinsic {
    /// Number of operand-stack slots the call consumes, receiver included.
    pub param_slots: u16,
    pub kind: IntrinsicKind,
}

impl Intrinsic {
    #[must_use]
    pub fn func(param_slots: u16, f: IntrinsicFn) -> Intrinsic {
        Intrinsic {
            param_slots,
            kind: IntrinsicKind::Func(f),
        }
    }

    #[must_use]
    pub fn just_return(param_slots: u16) -> Intrinsic {
        Intrinsic {
            param_slots,
            kind: IntrinsicKind::JustReturn,
        }
    }

    #[must_use]
    pub fn trap(param_slots: u16) -> Intrinsic {
        Intrinsic {
            param_slots,
            kind: IntrinsicKind::Trap,
        }
    }

    /// Run this intrinsic over already-popped parameters.
    pub fn invoke(
        &self,
        globals: &Globals,
        signature: &str,
        mut params: Vec<JvmValue>,
    ) -> IntrinsicResult {
        match self.kind {
            IntrinsicKind::Func(f) => f(globals, &mut params),
            IntrinsicKind::JustReturn => IntrinsicResult::Void,
            IntrinsicKind::Trap => IntrinsicResult::Raise(RaisedException::new(
                "java/lang/UnsupportedOperationException",
                format!("unsupported library method: {signature}"),
            )),
            IntrinsicKind::TrapDeprecated => IntrinsicResult::Raise(RaisedException::new(
                "java/lang/UnsupportedOperationException",
                format!("deprecated library method: {signature}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIntrinsic(pub String);

impl fmt::Display for DuplicateIntrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intrinsic registered twice: {}", self.0)
    }
}

impl std::error::Error for DuplicateIntrinsic {}

#[derive(Debug, Default)]
pub struct IntrinsicTable {
    table: RwLock<HashMap<String, Intrinsic>>,
}

impl IntrinsicTable {
    #[must_use]
    pub fn new() -> IntrinsicTable {
        IntrinsicTable {
            table: RwLock::new(HashMap::with_capacity(128)),
        }
    }

    pub fn register(&self, signature: &str, intrinsic: Intrinsic) -> Result<(), DuplicateIntrinsic> {
        let mut table = self.table.write();
        if table.contains_key(signature) {
            return Err(DuplicateIntrinsic(signature.to_owned()));
        }
        table.insert(signature.to_owned(), intrinsic);
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, signature: &str) -> Option<Intrinsic> {
        self.table.read().get(signature).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

/// The full signature key for a method.
#[must_use]
pub fn signature_of(class_name: &str, method_name: &str, descriptor: &str) -> String {
    format!("{class_name}.{method_name}{descriptor}")
}

/// Populate the table with every domain loader. Called once at startup.
pub fn load_all(table: &IntrinsicTable) -> Result<(), DuplicateIntrinsic> {
    java_lang::load(table)?;
    java_lang_string::load(table)?;
    java_lang_invoke::load(table)?;
    java_io::load(table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &Globals, _: &mut Vec<JvmValue>) -> IntrinsicResult {
        IntrinsicResult::Void
    }

    #[test]
    fn redefinition_is_an_error() {
        let table = IntrinsicTable::new();
        let sig = "com/example/A.f()V";
        table.register(sig, Intrinsic::func(1, nop)).unwrap();
        assert_eq!(
            table.register(sig, Intrinsic::func(1, nop)),
            Err(DuplicateIntrinsic(sig.to_owned()))
        );
    }

    #[test]
    fn lookup_by_full_signature() {
        let table = IntrinsicTable::new();
        table
            .register("com/example/A.f(I)I", Intrinsic::func(2, nop))
            .unwrap();
        assert!(table.lookup("com/example/A.f(I)I").is_some());
        assert!(table.lookup("com/example/A.f(J)I").is_none());
    }

    #[test]
    fn signature_formatting() {
        assert_eq!(
            signature_of("java/io/PrintStream", "println", "(Ljava/lang/String;)V"),
            "java/io/PrintStream.println(Ljava/lang/String;)V"
        );
    }

    #[test]
    fn loaders_register_without_collisions() {
        let table = IntrinsicTable::new();
        load_all(&table).unwrap();
        assert!(!table.is_empty());
        assert!(table
            .lookup("java/io/PrintStream.println(Ljava/lang/String;)V")
            .is_some());
        assert!(table.lookup("java/lang/Object.<init>()V").is_some());
        assert!(table.lookup("java/lang/Runtime.maxMemory()J").is_some());
    }
}
