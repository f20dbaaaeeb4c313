//! Structural validation of a parsed class, run after the parser and before
//! the class is published to the method area.
//!
//! Classes originating from the trusted JDK bundle skip this step; that
//! policy lives with the loader, not here.

use std::fmt;

use crate::access_flags::MethodAccessFlags;
use crate::classfile::constant_pool::{CPool, CpKind};
use crate::classfile::parser::{CodeAttribute, ParsedClass, ParsedMethod};
use crate::descriptor::{DescriptorError, DescriptorType, MethodDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A pool entry references an entry of the wrong kind.
    IncompatibleCpReference {
        index: u16,
        expected: CpKind,
        found: CpKind,
    },
    /// `this_class`, `super_class`, or an interface index is not a ClassRef.
    BadClassIndex { index: u16 },
    /// A method handle's reference kind is outside 1-9.
    BadMethodHandleKind { kind: u8 },
    /// A `Dynamic`/`InvokeDynamic` entry points past the bootstrap table.
    BadBootstrapIndex { index: u16, table_len: usize },
    /// A field descriptor failed to parse.
    BadFieldDescriptor {
        field: String,
        error: DescriptorError,
    },
    /// A method descriptor failed to parse.
    BadMethodDescriptor {
        method: String,
        error: DescriptorError,
    },
    /// A method that must have code has none, or vice versa.
    MissingCode { method: String },
    /// `max_locals` cannot hold the method's own parameters.
    ImplausibleLocals {
        method: String,
        max_locals: u16,
        required: usize,
    },
    /// A `Code` attribute with an empty body.
    EmptyCode { method: String },
    /// An exception-table row lies outside the method body.
    HandlerOutOfRange { method: String, handler_pc: u16 },
    /// An exception-table row has an empty or inverted protected range.
    BadHandlerRange {
        method: String,
        start_pc: u16,
        end_pc: u16,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::IncompatibleCpReference {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool entry {index}: expected {expected}, found {found}"
            ),
            FormatError::BadClassIndex { index } => {
                write!(f, "class index {index} is not a ClassRef")
            }
            FormatError::BadMethodHandleKind { kind } => {
                write!(f, "method handle reference kind {kind} is outside 1-9")
            }
            FormatError::BadBootstrapIndex { index, table_len } => write!(
                f,
                "bootstrap index {index} exceeds bootstrap table of length {table_len}"
            ),
            FormatError::BadFieldDescriptor { field, error } => {
                write!(f, "field {field}: bad descriptor: {error}")
            }
            FormatError::BadMethodDescriptor { method, error } => {
                write!(f, "method {method}: bad descriptor: {error}")
            }
            FormatError::MissingCode { method } => {
                write!(f, "method {method}: missing Code attribute")
            }
            FormatError::ImplausibleLocals {
                method,
                max_locals,
                required,
            } => write!(
                f,
                "method {method}: max_locals {max_locals} cannot hold {required} parameter slots"
            ),
            FormatError::EmptyCode { method } => {
                write!(f, "method {method}: empty bytecode body")
            }
            FormatError::HandlerOutOfRange { method, handler_pc } => {
                write!(f, "method {method}: handler pc {handler_pc} outside method")
            }
            FormatError::BadHandlerRange {
                method,
                start_pc,
                end_pc,
            } => write!(
                f,
                "method {method}: exception range [{start_pc}, {end_pc}) is empty or inverted"
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// Validate a parsed class. On success the class may be published.
pub fn check_class(parsed: &ParsedClass) -> Result<(), FormatError> {
    check_cp_cross_references(&parsed.cp)?;

    expect_class_ref(&parsed.cp, parsed.this_class)?;
    if parsed.super_class != 0 {
        expect_class_ref(&parsed.cp, parsed.super_class)?;
    }
    for interface in &parsed.interfaces {
        expect_class_ref(&parsed.cp, *interface)?;
    }

    for field in &parsed.fields {
        DescriptorType::parse(&field.descriptor).map_err(|error| {
            FormatError::BadFieldDescriptor {
                field: field.name.clone(),
                error,
            }
        })?;
    }

    for method in &parsed.methods {
        let desc = MethodDescriptor::parse(&method.descriptor).map_err(|error| {
            FormatError::BadMethodDescriptor {
                method: method.name.clone(),
                error,
            }
        })?;
        check_method_body(method, &desc)?;
    }

    Ok(())
}

fn check_cp_cross_references(cp: &CPool) -> Result<(), FormatError> {
    for name_index in &cp.class_refs {
        expect_kind(cp, *name_index, CpKind::Utf8)?;
    }
    for nat in &cp.name_and_types {
        expect_kind(cp, nat.name_index, CpKind::Utf8)?;
        expect_kind(cp, nat.descriptor_index, CpKind::Utf8)?;
    }
    for member in cp
        .field_refs
        .iter()
        .chain(&cp.method_refs)
        .chain(&cp.iface_method_refs)
    {
        expect_kind(cp, member.class_index, CpKind::ClassRef)?;
        expect_kind(cp, member.name_and_type_index, CpKind::NameAndType)?;
    }
    for desc_index in &cp.method_types {
        expect_kind(cp, *desc_index, CpKind::Utf8)?;
    }
    for handle in &cp.method_handles {
        match handle.ref_kind {
            1..=4 => expect_kind(cp, handle.ref_index, CpKind::FieldRef)?,
            5 | 8 => expect_kind(cp, handle.ref_index, CpKind::MethodRef)?,
            // Kinds 6 and 7 may reference either method form from class
            // file version 52 on.
            6 | 7 => {
                let found = cp.kind(handle.ref_index);
                if !matches!(found, CpKind::MethodRef | CpKind::InterfaceMethodRef) {
                    return Err(FormatError::IncompatibleCpReference {
                        index: handle.ref_index,
                        expected: CpKind::MethodRef,
                        found,
                    });
                }
            }
            9 => expect_kind(cp, handle.ref_index, CpKind::InterfaceMethodRef)?,
            kind => return Err(FormatError::BadMethodHandleKind { kind }),
        }
    }
    for dynamic in cp.dynamics.iter().chain(&cp.invoke_dynamics) {
        expect_kind(cp, dynamic.name_and_type_index, CpKind::NameAndType)?;
        if usize::from(dynamic.bootstrap_index) >= cp.bootstraps.len() {
            return Err(FormatError::BadBootstrapIndex {
                index: dynamic.bootstrap_index,
                table_len: cp.bootstraps.len(),
            });
        }
    }
    for bootstrap in &cp.bootstraps {
        expect_kind(cp, bootstrap.method_ref, CpKind::MethodHandle)?;
    }
    Ok(())
}

fn check_method_body(
    method: &ParsedMethod,
    desc: &MethodDescriptor,
) -> Result<(), FormatError> {
    let should_have_code = !method
        .access_flags
        .intersects(MethodAccessFlags::NATIVE | MethodAccessFlags::ABSTRACT);

    let code = match (&method.code, should_have_code) {
        (Some(code), true) => code,
        (None, false) => return Ok(()),
        (None, true) => {
            return Err(FormatError::MissingCode {
                method: method.name.clone(),
            })
        }
        // Tolerated: javac never emits it, but a Code attribute on a native
        // method is not worth rejecting the class over.
        (Some(_), false) => return Ok(()),
    };

    if code.code.is_empty() {
        return Err(FormatError::EmptyCode {
            method: method.name.clone(),
        });
    }

    // Parameters alone bound max_locals from below: one slot each, two for
    // long/double, plus the receiver for instance methods.
    let mut required = 0usize;
    if !method.access_flags.contains(MethodAccessFlags::STATIC) {
        required += 1;
    }
    for parameter in desc.parameters() {
        required += if parameter.is_category_2() { 2 } else { 1 };
    }
    if usize::from(code.max_locals) < required {
        return Err(FormatError::ImplausibleLocals {
            method: method.name.clone(),
            max_locals: code.max_locals,
            required,
        });
    }

    check_exception_table(&method.name, code)?;
    Ok(())
}

fn check_exception_table(method: &str, code: &CodeAttribute) -> Result<(), FormatError> {
    let code_len = code.code.len();
    for row in &code.exception_table {
        if row.start_pc >= row.end_pc {
            return Err(FormatError::BadHandlerRange {
                method: method.to_owned(),
                start_pc: row.start_pc,
                end_pc: row.end_pc,
            });
        }
        if usize::from(row.end_pc) > code_len || usize::from(row.handler_pc) >= code_len {
            return Err(FormatError::HandlerOutOfRange {
                method: method.to_owned(),
                handler_pc: row.handler_pc,
            });
        }
    }
    Ok(())
}

fn expect_class_ref(cp: &CPool, index: u16) -> Result<(), FormatError> {
    if cp.kind(index) != CpKind::ClassRef {
        return Err(FormatError::BadClassIndex { index });
    }
    Ok(())
}

fn expect_kind(cp: &CPool, index: u16, expected: CpKind) -> Result<(), FormatError> {
    let found = cp.kind(index);
    if found != expected {
        return Err(FormatError::IncompatibleCpReference {
            index,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::parser::fixture::hello_class_bytes;
    use crate::classfile::parser::parse_class;

    #[test]
    fn accepts_the_hello_fixture() {
        let parsed = parse_class(&hello_class_bytes()).unwrap();
        check_class(&parsed).unwrap();
    }

    #[test]
    fn rejects_class_ref_to_non_utf8() {
        let mut parsed = parse_class(&hello_class_bytes()).unwrap();
        // Point the this-class ClassRef at the String entry instead of a
        // Utf8 name.
        parsed.cp.class_refs[0] = 11;
        assert!(matches!(
            check_class(&parsed),
            Err(FormatError::IncompatibleCpReference { .. })
        ));
    }

    #[test]
    fn rejects_handler_outside_method() {
        let mut parsed = parse_class(&hello_class_bytes()).unwrap();
        let main = parsed
            .methods
            .iter_mut()
            .find(|m| m.name == "main")
            .unwrap();
        main.code
            .as_mut()
            .unwrap()
            .exception_table
            .push(crate::classfile::parser::ExceptionTableEntry {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 40,
                catch_type: 0,
            });
        assert!(matches!(
            check_class(&parsed),
            Err(FormatError::HandlerOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_locals_too_small_for_parameters() {
        let mut parsed = parse_class(&hello_class_bytes()).unwrap();
        let main = parsed
            .methods
            .iter_mut()
            .find(|m| m.name == "main")
            .unwrap();
        main.code.as_mut().unwrap().max_locals = 0;
        assert!(matches!(
            check_class(&parsed),
            Err(FormatError::ImplausibleLocals { .. })
        ));
    }

    #[test]
    fn rejects_bad_field_descriptors() {
        let mut parsed = parse_class(&hello_class_bytes()).unwrap();
        parsed.fields.push(crate::classfile::parser::ParsedField {
            access_flags: crate::access_flags::FieldAccessFlags::PUBLIC,
            name: "broken".to_owned(),
            descriptor: "Ljava/lang/String".to_owned(),
            constant_value: None,
            attributes: Vec::new(),
        });
        assert!(matches!(
            check_class(&parsed),
            Err(FormatError::BadFieldDescriptor { .. })
        ));
    }
}
