//! Object-model bytecodes: LDC, NEW, field access, CHECKCAST, INSTANCEOF.

use std::sync::Arc;

use robusta_base::classfile::CpKind;
use robusta_base::string_pool::INVALID_NAME;

use crate::interp::{cur, fetch_u8, fetch_u16, OpOutcome};
use crate::jthread::JavaThread;
use crate::object::{Field, FieldValue, Object, VALUE_FIELD};
use crate::resolver::{self, ResolvedField};
use crate::value::JvmValue;
use crate::{FatalError, GeneralError, Globals, VmError};

fn npe(message: &str) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/NullPointerException".to_owned(),
        message: message.to_owned(),
    }
}

/// LDC / LDC_W: int, float, String, Class, MethodType, MethodHandle.
pub(super) fn ldc(
    globals: &Globals,
    thread: &mut JavaThread,
    wide: bool,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index, width) = {
        let f = cur(thread)?;
        let (index, width) = if wide {
            (fetch_u16(f, 1)?, 3usize)
        } else {
            (u16::from(fetch_u8(f, 1)?), 2usize)
        };
        (Arc::clone(&f.cldata), index, width)
    };

    let value = match cldata.cp.kind(index) {
        CpKind::IntegerConst
        | CpKind::FloatConst
        | CpKind::StringConst
        | CpKind::ClassRef
        | CpKind::MethodType
        | CpKind::MethodHandle => resolver::resolve_cp_constant(globals, &cldata.cp, index)?,
        other => {
            return Err(FatalError::BadConstantPool(
                robusta_base::classfile::CpError::WrongKind {
                    index,
                    expected: CpKind::IntegerConst,
                    found: other,
                },
            )
            .into())
        }
    };

    let f = cur(thread)?;
    f.stack.push(value)?;
    f.pc += width;
    Ok(OpOutcome::Continue)
}

/// LDC2_W: long and double constants.
pub(super) fn ldc2_w(thread: &mut JavaThread) -> Result<OpOutcome, GeneralError> {
    let f = cur(thread)?;
    let index = fetch_u16(f, 1)?;
    let value = match f.cldata.cp.kind(index) {
        CpKind::LongConst => JvmValue::Long(
            f.cldata
                .cp
                .long_const(index)
                .map_err(FatalError::BadConstantPool)?,
        ),
        CpKind::DoubleConst => JvmValue::Double(
            f.cldata
                .cp
                .double_const(index)
                .map_err(FatalError::BadConstantPool)?,
        ),
        other => {
            return Err(FatalError::BadConstantPool(
                robusta_base::classfile::CpError::WrongKind {
                    index,
                    expected: CpKind::LongConst,
                    found: other,
                },
            )
            .into())
        }
    };
    f.stack.push(value)?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

/// NEW: allocate an instance with defaulted fields from the whole
/// hierarchy. `<init>` runs separately via INVOKESPECIAL.
pub(super) fn new_object(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };
    let class_name = cldata
        .cp
        .class_name(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();

    let record = resolver::ensure_loaded(globals, &class_name)?;
    resolver::initialize_class(globals, thread, &record)?;

    let mut object = Object::new_of_class(record.name);
    let mut current = Some(Arc::clone(&record));
    while let Some(rec) = current {
        for field in rec.fields.iter().filter(|f| !f.is_static()) {
            if !object.fields.contains_key(&field.name) {
                object.set_field(
                    field.name.clone(),
                    Field::scalar(
                        field.descriptor.clone(),
                        JvmValue::default_for_descriptor(&field.descriptor),
                    ),
                );
            }
        }
        current = if rec.superclass == INVALID_NAME {
            None
        } else {
            let super_name = globals.string_pool.tpath(rec.superclass);
            Some(resolver::ensure_loaded(globals, &super_name)?)
        };
    }

    let reference = globals.heap.write().alloc(object);
    let f = cur(thread)?;
    f.stack.push(JvmValue::Ref(reference))?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

fn resolve_field_at(
    globals: &Globals,
    thread: &mut JavaThread,
    must_be_static: bool,
    op_name: &str,
) -> Result<(ResolvedField, u16), GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };
    let resolved = resolver::resolve_field(globals, &cldata.cp, index)?;

    if resolved.field.is_static() != must_be_static {
        return Err(VmError::IncompatibleClassChange(format!(
            "{op_name} on {} field {}.{}",
            if resolved.field.is_static() {
                "static"
            } else {
                "instance"
            },
            resolved.declaring_name,
            resolved.field.name
        ))
        .into());
    }
    Ok((resolved, index))
}

pub(super) fn getstatic(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (resolved, _) = resolve_field_at(globals, thread, true, "GETSTATIC")?;
    resolver::initialize_class(globals, thread, &resolved.declaring)?;

    let Some(value) = globals
        .statics
        .get(&resolved.declaring_name, &resolved.field.name)
    else {
        return Err(VmError::NoSuchField {
            class: resolved.declaring_name,
            field: resolved.field.name,
        }
        .into());
    };

    let f = cur(thread)?;
    f.stack.push(value)?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn putstatic(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (resolved, _) = resolve_field_at(globals, thread, true, "PUTSTATIC")?;
    resolver::initialize_class(globals, thread, &resolved.declaring)?;

    let f = cur(thread)?;
    let mut value = f.stack.pop()?;
    // Booleans are stored in the normalized {0, 1} form.
    if resolved.field.descriptor == "Z" {
        if let JvmValue::Int(v) = value {
            value = JvmValue::Int(i64::from(v != 0));
        }
    }

    globals.statics.add(
        &format!("{}.{}", resolved.declaring_name, resolved.field.name),
        crate::statics::StaticValue::new(resolved.field.descriptor.clone(), value),
    );
    globals
        .class_objects
        .add_static_name(resolved.declaring.name, &resolved.field.name);

    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn getfield(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (resolved, _) = resolve_field_at(globals, thread, false, "GETFIELD")?;

    let f = cur(thread)?;
    let Some(receiver) = f.stack.pop_ref()? else {
        return Ok(npe(&format!(
            "GETFIELD {} on null object",
            resolved.field.name
        )));
    };

    let value = {
        let heap = globals.heap.read();
        let object = heap.get(receiver).ok_or(FatalError::StaleObjectRef)?;
        match object.get_field(&resolved.field.name) {
            Some(Field {
                value: FieldValue::Value(v),
                ..
            }) => Ok(*v),
            // Array-backed fields (a string's byte payload) surface as a
            // fresh array object over a copy of the data.
            Some(Field { descriptor, value }) => Err((descriptor.clone(), value.clone())),
            None => {
                return Err(VmError::NoSuchField {
                    class: globals.string_pool.tpath(object.klass),
                    field: resolved.field.name,
                }
                .into())
            }
        }
    };

    let value = match value {
        Ok(v) => v,
        Err((descriptor, data)) => {
            let mut array = Object::new_of_class(globals.string_pool.intern(&descriptor));
            array.set_field(VALUE_FIELD, Field { descriptor, value: data });
            JvmValue::Ref(globals.heap.write().alloc(array))
        }
    };

    let f = cur(thread)?;
    f.stack.push(value)?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn putfield(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (resolved, _) = resolve_field_at(globals, thread, false, "PUTFIELD")?;

    let f = cur(thread)?;
    let value = f.stack.pop()?;
    let Some(receiver) = f.stack.pop_ref()? else {
        return Ok(npe(&format!(
            "PUTFIELD {} on null object",
            resolved.field.name
        )));
    };

    let mut heap = globals.heap.write();
    let object = heap.get_mut(receiver).ok_or(FatalError::StaleObjectRef)?;
    object.set_field(
        resolved.field.name.clone(),
        Field::scalar(resolved.field.descriptor.clone(), value),
    );
    drop(heap);

    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn checkcast(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };
    let target = cldata
        .cp
        .class_name(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();

    // The value stays on the stack either way.
    let value = {
        let f = cur(thread)?;
        f.stack.peek()?
    };

    match value {
        JvmValue::Null => {}
        JvmValue::Ref(reference) => {
            let runtime_class = {
                let heap = globals.heap.read();
                heap.get(reference)
                    .ok_or(FatalError::StaleObjectRef)?
                    .klass
            };
            let runtime_name = globals.string_pool.tpath(runtime_class);
            if !resolver::is_assignable(globals, &runtime_name, &target)? {
                return Ok(OpOutcome::Throw {
                    class: "java/lang/ClassCastException".to_owned(),
                    message: format!(
                        "class {} cannot be cast to class {}",
                        runtime_name.replace('/', "."),
                        target.replace('/', ".")
                    ),
                });
            }
        }
        _ => return Err(FatalError::ExpectedStackReference.into()),
    }

    let f = cur(thread)?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn instanceof(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };
    let target = cldata
        .cp
        .class_name(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();

    let value = {
        let f = cur(thread)?;
        f.stack.pop()?
    };

    let result = match value {
        JvmValue::Null => 0,
        JvmValue::Ref(reference) => {
            let runtime_class = {
                let heap = globals.heap.read();
                heap.get(reference)
                    .ok_or(FatalError::StaleObjectRef)?
                    .klass
            };
            let runtime_name = globals.string_pool.tpath(runtime_class);
            i64::from(resolver::is_assignable(globals, &runtime_name, &target)?)
        }
        _ => return Err(FatalError::ExpectedStackReference.into()),
    };

    let f = cur(thread)?;
    f.stack.push(JvmValue::Int(result))?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}
