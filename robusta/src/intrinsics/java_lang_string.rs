//! Intrinsics for `java/lang/String`.
//!
//! Strings live in the compact-string layout, so every handler here works
//! over the byte payload in the `value` field.

use crate::heap::ObjRef;
use crate::intrinsics::{
    DuplicateIntrinsic, Intrinsic, IntrinsicResult, IntrinsicTable, RaisedException,
};
use crate::object::{
    byte_sequence_from_string_object, pool_index_from_string_object, rust_string_from_object,
    string_object_from_pool_index, string_object_from_str,
};
use crate::value::JvmValue;
use crate::Globals;

pub fn load(table: &IntrinsicTable) -> Result<(), DuplicateIntrinsic> {
    table.register("java/lang/String.<init>()V", Intrinsic::just_return(1))?;
    table.register("java/lang/String.length()I", Intrinsic::func(1, length))?;
    table.register("java/lang/String.isEmpty()Z", Intrinsic::func(1, is_empty))?;
    table.register("java/lang/String.hashCode()I", Intrinsic::func(1, hash_code))?;
    table.register(
        "java/lang/String.intern()Ljava/lang/String;",
        Intrinsic::func(1, intern),
    )?;
    table.register("java/lang/String.charAt(I)C", Intrinsic::func(2, char_at))?;
    table.register(
        "java/lang/String.concat(Ljava/lang/String;)Ljava/lang/String;",
        Intrinsic::func(2, concat),
    )?;
    table.register(
        "java/lang/String.equals(Ljava/lang/Object;)Z",
        Intrinsic::func(2, equals),
    )?;
    table.register(
        "java/lang/String.toString()Ljava/lang/String;",
        Intrinsic::func(1, to_string),
    )?;
    Ok(())
}

fn receiver_of(params: &[JvmValue]) -> Option<ObjRef> {
    match params.first()? {
        JvmValue::Ref(r) => Some(*r),
        _ => None,
    }
}

fn npe() -> IntrinsicResult {
    IntrinsicResult::Raise(RaisedException::new(
        "java/lang/NullPointerException",
        "string receiver was null",
    ))
}

fn length(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };
    let heap = globals.heap.read();
    match heap.get(receiver).and_then(byte_sequence_from_string_object) {
        Some(bytes) => IntrinsicResult::Value(JvmValue::Int(bytes.len() as i64)),
        None => npe(),
    }
}

fn is_empty(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    match length(globals, params) {
        IntrinsicResult::Value(JvmValue::Int(len)) => {
            IntrinsicResult::Value(JvmValue::Int(i64::from(len == 0)))
        }
        other => other,
    }
}

/// The standard `s[0]*31^(n-1) + ... + s[n-1]` hash over the byte payload.
fn hash_code(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };
    let heap = globals.heap.read();
    let Some(bytes) = heap.get(receiver).and_then(byte_sequence_from_string_object) else {
        return npe();
    };

    let mut hash: i32 = 0;
    for byte in bytes {
        let c = i32::from(*byte as u8);
        hash = hash.wrapping_mul(31).wrapping_add(c);
    }
    IntrinsicResult::Value(JvmValue::Int(i64::from(hash)))
}

fn intern(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };

    let index = {
        let heap = globals.heap.read();
        pool_index_from_string_object(&heap, &globals.string_pool, receiver)
    };

    let mut heap = globals.heap.write();
    match string_object_from_pool_index(&mut heap, &globals.string_pool, index) {
        Some(interned) => IntrinsicResult::Value(JvmValue::Ref(interned)),
        None => npe(),
    }
}

fn char_at(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };
    let Some(index) = params.get(1).copied().and_then(JvmValue::into_int) else {
        return npe();
    };

    let heap = globals.heap.read();
    let Some(bytes) = heap.get(receiver).and_then(byte_sequence_from_string_object) else {
        return npe();
    };

    if index < 0 || index >= bytes.len() as i64 {
        return IntrinsicResult::Raise(RaisedException::new(
            "java/lang/StringIndexOutOfBoundsException",
            format!("index {index} out of bounds for length {}", bytes.len()),
        ));
    }

    let c = i64::from(bytes[index as usize] as u8);
    IntrinsicResult::Value(JvmValue::Int(c))
}

fn concat(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };
    let Some(JvmValue::Ref(other)) = params.get(1).copied() else {
        return npe();
    };

    let combined = {
        let heap = globals.heap.read();
        let (Some(left), Some(right)) = (
            rust_string_from_object(&heap, receiver),
            rust_string_from_object(&heap, other),
        ) else {
            return npe();
        };
        format!("{left}{right}")
    };

    let result = string_object_from_str(&mut globals.heap.write(), &combined);
    IntrinsicResult::Value(JvmValue::Ref(result))
}

fn equals(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(receiver) = receiver_of(params) else {
        return npe();
    };
    let other = params.get(1).copied();

    let heap = globals.heap.read();
    let this_text = rust_string_from_object(&heap, receiver);
    let other_text = match other {
        Some(JvmValue::Ref(r)) => rust_string_from_object(&heap, r),
        _ => None,
    };

    let equal = matches!((this_text, other_text), (Some(a), Some(b)) if a == b);
    IntrinsicResult::Value(JvmValue::Int(i64::from(equal)))
}

fn to_string(_globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    match receiver_of(params) {
        Some(receiver) => IntrinsicResult::Value(JvmValue::Ref(receiver)),
        None => npe(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_ref(globals: &Globals, text: &str) -> ObjRef {
        string_object_from_str(&mut globals.heap.write(), text)
    }

    #[test]
    fn length_counts_bytes() {
        let globals = Globals::test_instance();
        let s = string_ref(&globals, "hello");
        assert_eq!(
            length(&globals, &mut vec![JvmValue::Ref(s)]),
            IntrinsicResult::Value(JvmValue::Int(5))
        );
    }

    #[test]
    fn hash_matches_java_semantics() {
        let globals = Globals::test_instance();
        // "Abc" = 65*31*31 + 98*31 + 99
        let s = string_ref(&globals, "Abc");
        assert_eq!(
            hash_code(&globals, &mut vec![JvmValue::Ref(s)]),
            IntrinsicResult::Value(JvmValue::Int(65 * 31 * 31 + 98 * 31 + 99))
        );
    }

    #[test]
    fn char_at_bounds_raise() {
        let globals = Globals::test_instance();
        let s = string_ref(&globals, "ab");
        assert_eq!(
            char_at(&globals, &mut vec![JvmValue::Ref(s), JvmValue::Int(1)]),
            IntrinsicResult::Value(JvmValue::Int(i64::from(b'b')))
        );
        assert!(matches!(
            char_at(&globals, &mut vec![JvmValue::Ref(s), JvmValue::Int(2)]),
            IntrinsicResult::Raise(RaisedException { class, .. })
                if class == "java/lang/StringIndexOutOfBoundsException"
        ));
    }

    #[test]
    fn concat_and_equals_work_over_content() {
        let globals = Globals::test_instance();
        let a = string_ref(&globals, "foo");
        let b = string_ref(&globals, "bar");

        let combined = match concat(&globals, &mut vec![JvmValue::Ref(a), JvmValue::Ref(b)]) {
            IntrinsicResult::Value(JvmValue::Ref(r)) => r,
            other => panic!("unexpected result {other:?}"),
        };
        let expected = string_ref(&globals, "foobar");
        assert_eq!(
            equals(
                &globals,
                &mut vec![JvmValue::Ref(combined), JvmValue::Ref(expected)]
            ),
            IntrinsicResult::Value(JvmValue::Int(1))
        );
        assert_eq!(
            equals(&globals, &mut vec![JvmValue::Ref(a), JvmValue::Ref(b)]),
            IntrinsicResult::Value(JvmValue::Int(0))
        );
    }

    #[test]
    fn intern_round_trips_through_the_pool() {
        let globals = Globals::test_instance();
        let s = string_ref(&globals, "com/example/interned");
        let interned = match intern(&globals, &mut vec![JvmValue::Ref(s)]) {
            IntrinsicResult::Value(JvmValue::Ref(r)) => r,
            other => panic!("unexpected result {other:?}"),
        };
        let heap = globals.heap.read();
        assert_eq!(
            rust_string_from_object(&heap, interned).as_deref(),
            Some("com/example/interned")
        );
    }
}
