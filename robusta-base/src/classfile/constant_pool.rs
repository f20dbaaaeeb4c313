//! The per-class constant pool.
//!
//! The pool is stored as a tag/slot index (`entries`) plus one side table per
//! entry kind, so a cross-reference is always an indexed lookup rather than a
//! scan. Slot 0 of the index is reserved and holds `CpKind::Invalid`.

use std::fmt;

/// Discriminator for a constant-pool entry. The numeric values are the class
/// file tag bytes where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpKind {
    /// The reserved slot 0 and the upper halves of 8-byte constants.
    Invalid,
    Utf8,
    IntegerConst,
    FloatConst,
    LongConst,
    DoubleConst,
    ClassRef,
    StringConst,
    FieldRef,
    MethodRef,
    InterfaceMethodRef,
    NameAndType,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
}

impl fmt::Display for CpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One slot of the pool index: the entry kind and the position of the entry
/// inside that kind's side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpSlot {
    pub kind: CpKind,
    pub slot: u16,
}

impl CpSlot {
    pub(crate) const INVALID: CpSlot = CpSlot {
        kind: CpKind::Invalid,
        slot: 0,
    };
}

/// `FieldRef` / `MethodRef` / `InterfaceMethodRef`: a class reference plus a
/// name-and-type, both as pool indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameAndType {
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// `MethodHandle`: reference kind 1-9 plus the referenced member entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHandleRef {
    pub ref_kind: u8,
    pub ref_index: u16,
}

/// `Dynamic` / `InvokeDynamic`: bootstrap-table position plus name-and-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicRef {
    pub bootstrap_index: u16,
    pub name_and_type_index: u16,
}

/// One row of the class's `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    /// Pool index of the bootstrap `MethodHandle`.
    pub method_ref: u16,
    /// Pool indices of the static arguments.
    pub args: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpError {
    /// The index is outside the pool.
    BadIndex(u16),
    /// The entry at the index is not of the kind the caller needed.
    WrongKind {
        index: u16,
        expected: CpKind,
        found: CpKind,
    },
}

impl fmt::Display for CpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpError::BadIndex(index) => write!(f, "constant pool index {index} out of range"),
            CpError::WrongKind {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool index {index}: expected {expected}, found {found}"
            ),
        }
    }
}

impl std::error::Error for CpError {}

/// Parsed constant pool with per-kind side tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CPool {
    /// Zero-based index of tagged slots; slot 0 reserved.
    pub entries: Vec<CpSlot>,
    pub utf8s: Vec<String>,
    pub int_consts: Vec<i32>,
    pub float_consts: Vec<f32>,
    pub long_consts: Vec<i64>,
    pub double_consts: Vec<f64>,
    /// `ClassRef` → pool index of the Utf8 name.
    pub class_refs: Vec<u16>,
    /// `StringConst` → pool index of the Utf8 content. Rewritten at parse
    /// time to point at the Utf8 slot directly.
    pub string_refs: Vec<u16>,
    pub field_refs: Vec<MemberRef>,
    pub method_refs: Vec<MemberRef>,
    pub iface_method_refs: Vec<MemberRef>,
    pub name_and_types: Vec<NameAndType>,
    pub method_handles: Vec<MethodHandleRef>,
    /// `MethodType` → pool index of the Utf8 descriptor.
    pub method_types: Vec<u16>,
    pub dynamics: Vec<DynamicRef>,
    pub invoke_dynamics: Vec<DynamicRef>,
    /// The class's `BootstrapMethods` attribute, attached here because only
    /// `Dynamic`/`InvokeDynamic` entries consume it.
    pub bootstraps: Vec<BootstrapMethod>,
}

impl CPool {
    /// Number of index slots, including the reserved slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The kind stored at a pool index; `Invalid` for out-of-range indices.
    #[must_use]
    pub fn kind(&self, index: u16) -> CpKind {
        self.entries
            .get(usize::from(index))
            .map_or(CpKind::Invalid, |slot| slot.kind)
    }

    fn slot_of(&self, index: u16, expected: CpKind) -> Result<usize, CpError> {
        let entry = self
            .entries
            .get(usize::from(index))
            .ok_or(CpError::BadIndex(index))?;
        if entry.kind != expected {
            return Err(CpError::WrongKind {
                index,
                expected,
                found: entry.kind,
            });
        }
        Ok(usize::from(entry.slot))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, CpError> {
        let slot = self.slot_of(index, CpKind::Utf8)?;
        self.utf8s
            .get(slot)
            .map(String::as_str)
            .ok_or(CpError::BadIndex(index))
    }

    pub fn int_const(&self, index: u16) -> Result<i32, CpError> {
        let slot = self.slot_of(index, CpKind::IntegerConst)?;
        self.int_consts.get(slot).copied().ok_or(CpError::BadIndex(index))
    }

    pub fn float_const(&self, index: u16) -> Result<f32, CpError> {
        let slot = self.slot_of(index, CpKind::FloatConst)?;
        self.float_consts
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }

    pub fn long_const(&self, index: u16) -> Result<i64, CpError> {
        let slot = self.slot_of(index, CpKind::LongConst)?;
        self.long_consts
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }

    pub fn double_const(&self, index: u16) -> Result<f64, CpError> {
        let slot = self.slot_of(index, CpKind::DoubleConst)?;
        self.double_consts
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }

    /// Name of the class referenced by a `ClassRef` entry.
    pub fn class_name(&self, index: u16) -> Result<&str, CpError> {
        let slot = self.slot_of(index, CpKind::ClassRef)?;
        let name_index = self
            .class_refs
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))?;
        self.utf8(name_index)
    }

    /// Content of a `StringConst` entry (already rewritten to its Utf8 slot).
    pub fn string_const(&self, index: u16) -> Result<&str, CpError> {
        let slot = self.slot_of(index, CpKind::StringConst)?;
        let utf8_index = self
            .string_refs
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))?;
        self.utf8(utf8_index)
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), CpError> {
        let slot = self.slot_of(index, CpKind::NameAndType)?;
        let nat = self
            .name_and_types
            .get(slot)
            .ok_or(CpError::BadIndex(index))?;
        Ok((self.utf8(nat.name_index)?, self.utf8(nat.descriptor_index)?))
    }

    /// Resolve a `FieldRef`/`MethodRef`/`InterfaceMethodRef` into
    /// `(class name, member name, descriptor)`.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str), CpError> {
        let entry = self
            .entries
            .get(usize::from(index))
            .ok_or(CpError::BadIndex(index))?;
        let table = match entry.kind {
            CpKind::FieldRef => &self.field_refs,
            CpKind::MethodRef => &self.method_refs,
            CpKind::InterfaceMethodRef => &self.iface_method_refs,
            found => {
                return Err(CpError::WrongKind {
                    index,
                    expected: CpKind::MethodRef,
                    found,
                })
            }
        };
        let member = table
            .get(usize::from(entry.slot))
            .ok_or(CpError::BadIndex(index))?;
        let class_name = self.class_name(member.class_index)?;
        let (name, desc) = self.name_and_type(member.name_and_type_index)?;
        Ok((class_name, name, desc))
    }

    pub fn method_handle(&self, index: u16) -> Result<MethodHandleRef, CpError> {
        let slot = self.slot_of(index, CpKind::MethodHandle)?;
        self.method_handles
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }

    /// Descriptor text of a `MethodType` entry.
    pub fn method_type_descriptor(&self, index: u16) -> Result<&str, CpError> {
        let slot = self.slot_of(index, CpKind::MethodType)?;
        let desc_index = self
            .method_types
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))?;
        self.utf8(desc_index)
    }

    pub fn invoke_dynamic(&self, index: u16) -> Result<DynamicRef, CpError> {
        let slot = self.slot_of(index, CpKind::InvokeDynamic)?;
        self.invoke_dynamics
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }

    pub fn dynamic(&self, index: u16) -> Result<DynamicRef, CpError> {
        let slot = self.slot_of(index, CpKind::Dynamic)?;
        self.dynamics
            .get(slot)
            .copied()
            .ok_or(CpError::BadIndex(index))
    }
}
