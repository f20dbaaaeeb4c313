//! Array bytecodes: allocation, length, element loads and stores.

use std::sync::Arc;

use robusta_base::descriptor::PrimitiveType;
use robusta_base::opcode;

use crate::heap::ObjRef;
use crate::interp::{cur, fetch_u8, fetch_u16, OpOutcome};
use crate::jthread::JavaThread;
use crate::object::{FieldValue, Object, VALUE_FIELD};
use crate::resolver;
use crate::value::JvmValue;
use crate::{FatalError, GeneralError, Globals};

fn npe(message: &str) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/NullPointerException".to_owned(),
        message: message.to_owned(),
    }
}

fn negative_size(count: i64) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/NegativeArraySizeException".to_owned(),
        message: count.to_string(),
    }
}

fn out_of_bounds(index: i64, length: usize) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/ArrayIndexOutOfBoundsException".to_owned(),
        message: format!("Index {index} out of bounds for length {length}"),
    }
}

/// NEWARRAY atype operand values, per the class file format.
fn primitive_for_atype(atype: u8) -> Option<PrimitiveType> {
    Some(match atype {
        4 => PrimitiveType::Boolean,
        5 => PrimitiveType::Char,
        6 => PrimitiveType::Float,
        7 => PrimitiveType::Double,
        8 => PrimitiveType::Byte,
        9 => PrimitiveType::Short,
        10 => PrimitiveType::Int,
        11 => PrimitiveType::Long,
        _ => return None,
    })
}

pub(super) fn newarray(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let f = cur(thread)?;
    let atype = fetch_u8(f, 1)?;
    let count = f.stack.pop_int()?;

    let Some(element) = primitive_for_atype(atype) else {
        return Err(FatalError::UnknownOpcode {
            opcode: atype,
            pc: f.pc,
        }
        .into());
    };
    if count < 0 {
        return Ok(negative_size(count));
    }

    let reference = globals
        .heap
        .write()
        .alloc(Object::new_primitive_array(element, count as usize));

    let f = cur(thread)?;
    f.stack.push(JvmValue::Ref(reference))?;
    f.pc += 2;
    Ok(OpOutcome::Continue)
}

pub(super) fn anewarray(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index, count) = {
        let f = cur(thread)?;
        let index = fetch_u16(f, 1)?;
        let count = f.stack.pop_int()?;
        (Arc::clone(&f.cldata), index, count)
    };
    let element_name = cldata
        .cp
        .class_name(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();

    if count < 0 {
        return Ok(negative_size(count));
    }
    resolver::ensure_loaded(globals, &element_name)?;

    let reference = globals.heap.write().alloc(Object::new_ref_array(
        &globals.string_pool,
        &element_name,
        count as usize,
    ));

    let f = cur(thread)?;
    f.stack.push(JvmValue::Ref(reference))?;
    f.pc += 3;
    Ok(OpOutcome::Continue)
}

pub(super) fn multianewarray(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index, dims) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?, fetch_u8(f, 3)?)
    };
    let array_name = cldata
        .cp
        .class_name(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();

    let mut counts = Vec::with_capacity(usize::from(dims));
    {
        let f = cur(thread)?;
        for _ in 0..dims {
            counts.push(f.stack.pop_int()?);
        }
    }
    counts.reverse();

    for count in &counts {
        if *count < 0 {
            return Ok(negative_size(*count));
        }
    }

    let reference = build_multi_array(globals, &array_name, &counts)?;
    let f = cur(thread)?;
    f.stack.push(JvmValue::Ref(reference))?;
    f.pc += 4;
    Ok(OpOutcome::Continue)
}

/// Allocate one level of a multi-dimensional array and recurse into its
/// elements. `name` is the array class name at this level (`[[I`, ...).
fn build_multi_array(
    globals: &Globals,
    name: &str,
    counts: &[i64],
) -> Result<ObjRef, GeneralError> {
    let element = name
        .strip_prefix('[')
        .ok_or(FatalError::ExpectedArray)?;
    let length = counts.first().copied().unwrap_or(0) as usize;

    if counts.len() <= 1 {
        let object = match element.as_bytes().first() {
            Some(b'[') => Object::new_ref_array(&globals.string_pool, element, length),
            Some(b'L') => {
                let class_name = element
                    .strip_prefix('L')
                    .and_then(|e| e.strip_suffix(';'))
                    .ok_or(FatalError::ExpectedArray)?;
                Object::new_ref_array(&globals.string_pool, class_name, length)
            }
            Some(c) => {
                let prim = PrimitiveType::from_descriptor_char(char::from(*c))
                    .ok_or(FatalError::ExpectedArray)?;
                Object::new_primitive_array(prim, length)
            }
            None => return Err(FatalError::ExpectedArray.into()),
        };
        return Ok(globals.heap.write().alloc(object));
    }

    let mut elements = Vec::with_capacity(length);
    for _ in 0..length {
        elements.push(JvmValue::Ref(build_multi_array(
            globals,
            element,
            &counts[1..],
        )?));
    }

    // Element class for the outer array: strip the L-framing for plain
    // classes, keep array forms as-is.
    let element_class = match element.as_bytes().first() {
        Some(b'L') => element
            .strip_prefix('L')
            .and_then(|e| e.strip_suffix(';'))
            .ok_or(FatalError::ExpectedArray)?,
        _ => element,
    };
    let mut object = Object::new_ref_array(&globals.string_pool, element_class, length);
    if let Some(field) = object.fields.get_mut(VALUE_FIELD) {
        field.value = FieldValue::RefArray(elements);
    }
    Ok(globals.heap.write().alloc(object))
}

pub(super) fn arraylength(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let f = cur(thread)?;
    let Some(reference) = f.stack.pop_ref()? else {
        return Ok(npe("ARRAYLENGTH on null array"));
    };

    let length = {
        let heap = globals.heap.read();
        heap.get(reference)
            .ok_or(FatalError::StaleObjectRef)?
            .array_length()
            .ok_or(FatalError::ExpectedArray)?
    };

    let f = cur(thread)?;
    f.stack.push(JvmValue::Int(length as i64))?;
    f.pc += 1;
    Ok(OpOutcome::Continue)
}

pub(super) fn array_load(
    globals: &Globals,
    thread: &mut JavaThread,
    op: u8,
) -> Result<OpOutcome, GeneralError> {
    let f = cur(thread)?;
    let index = f.stack.pop_int()?;
    let Some(reference) = f.stack.pop_ref()? else {
        return Ok(npe("array load from null array"));
    };

    let value = {
        let heap = globals.heap.read();
        let object = heap.get(reference).ok_or(FatalError::StaleObjectRef)?;
        let field = object
            .get_field(VALUE_FIELD)
            .ok_or(FatalError::ExpectedArray)?;
        let length = field.value.array_len().ok_or(FatalError::ExpectedArray)?;
        if index < 0 || index >= length as i64 {
            return Ok(out_of_bounds(index, length));
        }
        let at = index as usize;

        use opcode as b;
        match (op, &field.value) {
            (b::IALOAD | b::CALOAD | b::SALOAD, FieldValue::IntArray(v)) => JvmValue::Int(v[at]),
            (b::LALOAD, FieldValue::IntArray(v)) => JvmValue::Long(v[at]),
            (b::BALOAD, FieldValue::ByteArray(v)) => JvmValue::Int(i64::from(v[at])),
            (b::FALOAD, FieldValue::FloatArray(v)) => JvmValue::Float(v[at]),
            (b::DALOAD, FieldValue::FloatArray(v)) => JvmValue::Double(v[at]),
            (b::AALOAD, FieldValue::RefArray(v)) => v[at],
            _ => return Err(FatalError::ExpectedArray.into()),
        }
    };

    let f = cur(thread)?;
    f.stack.push(value)?;
    f.pc += 1;
    Ok(OpOutcome::Continue)
}

pub(super) fn array_store(
    globals: &Globals,
    thread: &mut JavaThread,
    op: u8,
) -> Result<OpOutcome, GeneralError> {
    use opcode as b;

    let f = cur(thread)?;
    let value = match op {
        b::IASTORE | b::BASTORE | b::CASTORE | b::SASTORE => JvmValue::Int(f.stack.pop_int()?),
        b::LASTORE => JvmValue::Long(f.stack.pop_long()?),
        b::FASTORE => JvmValue::Float(f.stack.pop_float()?),
        b::DASTORE => JvmValue::Double(f.stack.pop_double()?),
        _ => {
            let v = f.stack.pop()?;
            if !v.is_reference() {
                return Err(FatalError::ExpectedStackReference.into());
            }
            v
        }
    };
    let index = f.stack.pop_int()?;
    let Some(reference) = f.stack.pop_ref()? else {
        return Ok(npe("array store into null array"));
    };

    {
        let mut heap = globals.heap.write();
        let object = heap.get_mut(reference).ok_or(FatalError::StaleObjectRef)?;
        let field = object
            .fields
            .get_mut(VALUE_FIELD)
            .ok_or(FatalError::ExpectedArray)?;
        let length = field.value.array_len().ok_or(FatalError::ExpectedArray)?;
        if index < 0 || index >= length as i64 {
            return Ok(out_of_bounds(index, length));
        }
        let at = index as usize;

        match (op, &mut field.value) {
            (b::IASTORE, FieldValue::IntArray(v)) => {
                v[at] = i64::from(value.into_int().unwrap_or(0) as i32);
            }
            (b::CASTORE, FieldValue::IntArray(v)) => {
                v[at] = i64::from(value.into_int().unwrap_or(0) as u16);
            }
            (b::SASTORE, FieldValue::IntArray(v)) => {
                v[at] = i64::from(value.into_int().unwrap_or(0) as i16);
            }
            (b::LASTORE, FieldValue::IntArray(v)) => {
                v[at] = value.into_long().unwrap_or(0);
            }
            (b::BASTORE, FieldValue::ByteArray(v)) => {
                v[at] = value.into_int().unwrap_or(0) as i8;
            }
            (b::FASTORE | b::DASTORE, FieldValue::FloatArray(v)) => {
                v[at] = match value {
                    JvmValue::Float(x) | JvmValue::Double(x) => x,
                    _ => 0.0,
                };
            }
            (b::AASTORE, FieldValue::RefArray(v)) => {
                v[at] = value;
            }
            _ => return Err(FatalError::ExpectedArray.into()),
        }
    }

    let f = cur(thread)?;
    f.pc += 1;
    Ok(OpOutcome::Continue)
}
