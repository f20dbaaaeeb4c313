//! In-memory representation of Java objects, arrays, and strings.
//!
//! An object is its interned class name, a field table keyed by field name,
//! and a mark word. Arrays keep their elements in the `value` field as a
//! native sequence of the element type; strings follow the compact-string
//! layout (`value` bytes, `coder`, `hash`, `hashIsZero`).

use std::collections::HashMap;

use robusta_base::descriptor::PrimitiveType;
use robusta_base::string_pool::{self, NameIndex, StringPool};

use crate::heap::{Heap, ObjRef};
use crate::value::JvmValue;

/// Name of the field arrays and strings keep their payload in.
pub const VALUE_FIELD: &str = "value";

/// String `coder` values.
pub const CODER_LATIN1: i64 = 0;
pub const CODER_UTF16: i64 = 1;

/// Object header word: identity hash plus flag bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkWord {
    pub hash: u32,
    pub flags: u8,
}

/// A field's stored value. Arrays are native sequences, not boxed elements.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(JvmValue),
    /// byte[] and boolean[]
    ByteArray(Vec<i8>),
    /// char[], short[], int[], long[]
    IntArray(Vec<i64>),
    /// float[] and double[]
    FloatArray(Vec<f64>),
    /// Object[] and nested arrays; elements are `Ref` or `Null`.
    RefArray(Vec<JvmValue>),
}

impl FieldValue {
    #[must_use]
    pub fn array_len(&self) -> Option<usize> {
        match self {
            FieldValue::ByteArray(v) => Some(v.len()),
            FieldValue::IntArray(v) => Some(v.len()),
            FieldValue::FloatArray(v) => Some(v.len()),
            FieldValue::RefArray(v) => Some(v.len()),
            FieldValue::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub descriptor: String,
    pub value: FieldValue,
}

impl Field {
    #[must_use]
    pub fn scalar(descriptor: impl Into<String>, value: JvmValue) -> Field {
        Field {
            descriptor: descriptor.into(),
            value: FieldValue::Value(value),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Interned class name; `INVALID_NAME` for a classless scratch object.
    pub klass: NameIndex,
    pub fields: HashMap<String, Field>,
    pub mark: MarkWord,
}

impl Object {
    /// An empty object with no class, used as scratch by intrinsics.
    #[must_use]
    pub fn new_empty() -> Object {
        Object::default()
    }

    /// An instance of the named class with an empty field table.
    #[must_use]
    pub fn new_of_class(klass: NameIndex) -> Object {
        Object {
            klass,
            ..Object::default()
        }
    }

    /// A holder that wraps a single native value, e.g. a boxed primitive.
    #[must_use]
    pub fn new_primitive_holder(descriptor: &str, value: JvmValue) -> Object {
        let mut object = Object::new_empty();
        object
            .fields
            .insert(VALUE_FIELD.to_owned(), Field::scalar(descriptor, value));
        object
    }

    /// A `java/lang/String` over the given byte content (Latin-1 coder).
    #[must_use]
    pub fn new_string_from_bytes(bytes: Vec<i8>) -> Object {
        let mut object = Object::new_of_class(string_pool::STRING_NAME);
        object.fields.insert(
            VALUE_FIELD.to_owned(),
            Field {
                descriptor: "[B".to_owned(),
                value: FieldValue::ByteArray(bytes),
            },
        );
        object
            .fields
            .insert("coder".to_owned(), Field::scalar("B", JvmValue::Int(CODER_LATIN1)));
        object
            .fields
            .insert("hash".to_owned(), Field::scalar("I", JvmValue::Int(0)));
        object.fields.insert(
            "hashIsZero".to_owned(),
            Field::scalar("B", JvmValue::Int(0)),
        );
        object
    }

    #[must_use]
    pub fn new_string_from_str(text: &str) -> Object {
        Object::new_string_from_bytes(text.bytes().map(|b| b as i8).collect())
    }

    /// A one-dimensional primitive array, zero-filled.
    #[must_use]
    pub fn new_primitive_array(element: PrimitiveType, length: usize) -> Object {
        let (klass, descriptor, value) = match element {
            PrimitiveType::Byte => (
                string_pool::BYTE_ARRAY_NAME,
                "[B",
                FieldValue::ByteArray(vec![0; length]),
            ),
            PrimitiveType::Boolean => (
                string_pool::BOOL_ARRAY_NAME,
                "[Z",
                FieldValue::ByteArray(vec![0; length]),
            ),
            PrimitiveType::Char => (
                string_pool::CHAR_ARRAY_NAME,
                "[C",
                FieldValue::IntArray(vec![0; length]),
            ),
            PrimitiveType::Short => (
                string_pool::SHORT_ARRAY_NAME,
                "[S",
                FieldValue::IntArray(vec![0; length]),
            ),
            PrimitiveType::Int => (
                string_pool::INT_ARRAY_NAME,
                "[I",
                FieldValue::IntArray(vec![0; length]),
            ),
            PrimitiveType::Long => (
                string_pool::LONG_ARRAY_NAME,
                "[J",
                FieldValue::IntArray(vec![0; length]),
            ),
            PrimitiveType::Float => (
                string_pool::FLOAT_ARRAY_NAME,
                "[F",
                FieldValue::FloatArray(vec![0.0; length]),
            ),
            PrimitiveType::Double => (
                string_pool::DOUBLE_ARRAY_NAME,
                "[D",
                FieldValue::FloatArray(vec![0.0; length]),
            ),
        };

        let mut object = Object::new_of_class(klass);
        object.fields.insert(
            VALUE_FIELD.to_owned(),
            Field {
                descriptor: descriptor.to_owned(),
                value,
            },
        );
        object
    }

    /// A one-dimensional reference array, null-filled.
    #[must_use]
    pub fn new_ref_array(pool: &StringPool, element_name: &str, length: usize) -> Object {
        let array_name = array_class_name_of(element_name);
        let mut object = Object::new_of_class(pool.intern(&array_name));
        object.fields.insert(
            VALUE_FIELD.to_owned(),
            Field {
                descriptor: array_name,
                value: FieldValue::RefArray(vec![JvmValue::Null; length]),
            },
        );
        object
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.klass == string_pool::STRING_NAME
    }

    /// Array length, if this object is an array.
    #[must_use]
    pub fn array_length(&self) -> Option<usize> {
        self.fields.get(VALUE_FIELD).and_then(|f| f.value.array_len())
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }
}

/// The array class name for an element type: `[L<name>;` for plain classes,
/// one more `[` for arrays.
#[must_use]
pub fn array_class_name_of(element_name: &str) -> String {
    if element_name.starts_with('[') {
        format!("[{element_name}")
    } else {
        format!("[L{element_name};")
    }
}

/// Allocate a string object over Rust text.
pub fn string_object_from_str(heap: &mut Heap, text: &str) -> ObjRef {
    heap.alloc(Object::new_string_from_str(text))
}

/// Allocate a string object for a pool entry. `None` if the index was never
/// assigned.
pub fn string_object_from_pool_index(
    heap: &mut Heap,
    pool: &StringPool,
    index: NameIndex,
) -> Option<ObjRef> {
    let text = pool.lookup_owned(index)?;
    Some(string_object_from_str(heap, &text))
}

/// Extract Rust text from a string object. `None` if the handle is stale or
/// the object is not a string.
#[must_use]
pub fn rust_string_from_object(heap: &Heap, reference: ObjRef) -> Option<String> {
    let object = heap.get(reference)?;
    if !object.is_string() {
        return None;
    }
    byte_sequence_from_string_object(object).map(|bytes| {
        let raw: Vec<u8> = bytes.iter().map(|b| *b as u8).collect();
        String::from_utf8_lossy(&raw).into_owned()
    })
}

/// The raw byte payload of a string object.
#[must_use]
pub fn byte_sequence_from_string_object(object: &Object) -> Option<&[i8]> {
    match object.get_field(VALUE_FIELD)? {
        Field {
            value: FieldValue::ByteArray(bytes),
            ..
        } => Some(bytes),
        _ => None,
    }
}

/// Intern a string object's content, returning the pool index.
/// `INVALID_NAME` if the reference is not a live string.
#[must_use]
pub fn pool_index_from_string_object(
    heap: &Heap,
    pool: &StringPool,
    reference: ObjRef,
) -> NameIndex {
    match rust_string_from_object(heap, reference) {
        Some(text) => pool.intern(&text),
        None => string_pool::INVALID_NAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip_is_identity() {
        let mut heap = Heap::new();
        let pool = StringPool::new();
        for text in ["", "hello", "Hello from Hello.main!", "åäö"] {
            let r = string_object_from_str(&mut heap, text);
            assert_eq!(rust_string_from_object(&heap, r).as_deref(), Some(text));
            let index = pool_index_from_string_object(&heap, &pool, r);
            assert_eq!(&*pool.lookup(index).unwrap(), text);
        }
    }

    #[test]
    fn string_objects_carry_the_compact_layout() {
        let object = Object::new_string_from_str("abc");
        assert!(object.is_string());
        assert_eq!(
            object.get_field("coder").unwrap().value,
            FieldValue::Value(JvmValue::Int(CODER_LATIN1))
        );
        assert!(object.get_field("hash").is_some());
        assert!(object.get_field("hashIsZero").is_some());
    }

    #[test]
    fn primitive_arrays_use_native_backing() {
        let array = Object::new_primitive_array(PrimitiveType::Int, 4);
        assert_eq!(array.array_length(), Some(4));
        assert_eq!(array.klass, string_pool::INT_ARRAY_NAME);
        match &array.get_field(VALUE_FIELD).unwrap().value {
            FieldValue::IntArray(v) => assert_eq!(v, &vec![0i64; 4]),
            other => panic!("unexpected backing {other:?}"),
        }
    }

    #[test]
    fn ref_array_names_nest() {
        assert_eq!(array_class_name_of("java/lang/String"), "[Ljava/lang/String;");
        assert_eq!(array_class_name_of("[I"), "[[I");

        let pool = StringPool::new();
        let array = Object::new_ref_array(&pool, "java/lang/String", 2);
        assert_eq!(array.klass, string_pool::STRING_ARRAY_NAME);
        assert_eq!(array.array_length(), Some(2));
    }

    #[test]
    fn non_string_extraction_fails() {
        let mut heap = Heap::new();
        let r = heap.alloc(Object::new_empty());
        assert!(rust_string_from_object(&heap, r).is_none());
    }
}
