//! Operand-stack and local-slot values.
//!
//! The operand stack is 64 bits wide: every value, category 2 included, is
//! one slot. Sub-int integers are collapsed into `Int` the way compiled code
//! expects (bool/byte/short/char/int all travel as int).

use crate::heap::ObjRef;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JvmValue {
    /// int and its sub-int relatives, sign-extended.
    Int(i64),
    Long(i64),
    /// float, widened to f64 in storage.
    Float(f64),
    Double(f64),
    Ref(ObjRef),
    /// The null reference, distinct from any heap handle.
    Null,
}

impl JvmValue {
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, JvmValue::Ref(_) | JvmValue::Null)
    }

    #[must_use]
    pub fn into_int(self) -> Option<i64> {
        match self {
            JvmValue::Int(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_long(self) -> Option<i64> {
        match self {
            JvmValue::Long(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_float(self) -> Option<f64> {
        match self {
            JvmValue::Float(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_double(self) -> Option<f64> {
        match self {
            JvmValue::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a reference if this is one. The outer layer answers "was
    /// it a reference at all", the inner layer is `None` for null.
    #[must_use]
    pub fn into_reference(self) -> Option<Option<ObjRef>> {
        match self {
            JvmValue::Ref(r) => Some(Some(r)),
            JvmValue::Null => Some(None),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_category_2(&self) -> bool {
        matches!(self, JvmValue::Long(_) | JvmValue::Double(_))
    }

    /// The zero/null value for a field descriptor.
    #[must_use]
    pub fn default_for_descriptor(descriptor: &str) -> JvmValue {
        match descriptor.as_bytes().first() {
            Some(b'J') => JvmValue::Long(0),
            Some(b'F') => JvmValue::Float(0.0),
            Some(b'D') => JvmValue::Double(0.0),
            Some(b'L' | b'[') => JvmValue::Null,
            _ => JvmValue::Int(0),
        }
    }
}

impl From<ObjRef> for JvmValue {
    fn from(r: ObjRef) -> JvmValue {
        JvmValue::Ref(r)
    }
}

/// An optional reference as a value: `None` becomes null.
impl From<Option<ObjRef>> for JvmValue {
    fn from(r: Option<ObjRef>) -> JvmValue {
        match r {
            Some(r) => JvmValue::Ref(r),
            None => JvmValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layers() {
        assert_eq!(JvmValue::Null.into_reference(), Some(None));
        assert_eq!(JvmValue::Int(3).into_reference(), None);
    }

    #[test]
    fn defaults_follow_descriptors() {
        assert_eq!(JvmValue::default_for_descriptor("I"), JvmValue::Int(0));
        assert_eq!(JvmValue::default_for_descriptor("J"), JvmValue::Long(0));
        assert_eq!(
            JvmValue::default_for_descriptor("Ljava/lang/String;"),
            JvmValue::Null
        );
        assert_eq!(JvmValue::default_for_descriptor("[I"), JvmValue::Null);
    }
}
