//! The process-wide static-field registry.
//!
//! Keys are `"<ClassName>.<fieldName>"`; values carry the field descriptor
//! alongside the stored value. Written by `<clinit>` and PUTSTATIC, read by
//! GETSTATIC and intrinsics, guarded by one reader/writer lock.

use std::io::Write;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::JvmValue;

#[derive(Debug, Clone, PartialEq)]
pub struct StaticValue {
    pub descriptor: String,
    pub value: JvmValue,
}

impl StaticValue {
    #[must_use]
    pub fn new(descriptor: impl Into<String>, value: JvmValue) -> StaticValue {
        StaticValue {
            descriptor: descriptor.into(),
            value,
        }
    }

    /// A boolean static, stored in the normalized int64 {0, 1} form.
    #[must_use]
    pub fn of_bool(value: bool) -> StaticValue {
        StaticValue::new("Z", JvmValue::Int(i64::from(value)))
    }
}

#[derive(Debug, Default)]
pub struct StaticsRegistry {
    table: RwLock<IndexMap<String, StaticValue>>,
}

impl StaticsRegistry {
    #[must_use]
    pub fn new() -> StaticsRegistry {
        StaticsRegistry {
            table: RwLock::new(IndexMap::with_capacity(64)),
        }
    }

    /// Insert or overwrite a static. An empty key is rejected.
    pub fn add(&self, key: &str, value: StaticValue) -> bool {
        if key.is_empty() {
            return false;
        }
        self.table.write().insert(key.to_owned(), value);
        true
    }

    /// Raw lookup by full key, value as stored.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<StaticValue> {
        self.table.read().get(key).cloned()
    }

    /// Lookup by class and field with numeric normalization: booleans come
    /// back as int64 {0, 1}, sub-int integers are already stored widened and
    /// are returned as int64; everything else is returned as stored.
    #[must_use]
    pub fn get(&self, class_name: &str, field_name: &str) -> Option<JvmValue> {
        let key = format!("{class_name}.{field_name}");
        let held = self.query(&key)?;
        Some(normalize(&held))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Seed the registry with the statics the VM expects before any class
    /// runs: the program statics and the `java/lang/String` constants.
    pub fn preload(&self) {
        self.add("main.$assertionsDisabled", StaticValue::of_bool(true));

        self.add(
            "java/lang/String.COMPACT_STRINGS",
            StaticValue::of_bool(true),
        );
        self.add(
            "java/lang/String.UTF16",
            StaticValue::new("B", JvmValue::Int(1)),
        );
        self.add(
            "java/lang/String.LATIN1",
            StaticValue::new("B", JvmValue::Int(0)),
        );
    }

    /// Dump every entry to the given sink, for diagnostics.
    pub fn dump(&self, out: &mut dyn std::io::Write) {
        let table = self.table.read();
        let _ = writeln!(out, "===== statics dump begin ({} entries)", table.len());
        for (key, value) in table.iter() {
            let _ = writeln!(out, "{key}  {}  {:?}", value.descriptor, value.value);
        }
        let _ = writeln!(out, "===== statics dump end");
    }
}

fn normalize(held: &StaticValue) -> JvmValue {
    match (held.descriptor.as_str(), held.value) {
        // Booleans are pinned to {0, 1} even if an intrinsic stored
        // something sloppier.
        ("Z", JvmValue::Int(v)) => JvmValue::Int(i64::from(v != 0)),
        _ => held.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_round_trip() {
        let statics = StaticsRegistry::new();
        assert!(statics.add(
            "com/example/A.count",
            StaticValue::new("I", JvmValue::Int(42))
        ));
        assert_eq!(statics.get("com/example/A", "count"), Some(JvmValue::Int(42)));
    }

    #[test]
    fn empty_key_is_rejected() {
        let statics = StaticsRegistry::new();
        assert!(!statics.add("", StaticValue::of_bool(true)));
    }

    #[test]
    fn booleans_normalize_to_zero_or_one() {
        let statics = StaticsRegistry::new();
        statics.add("com/example/A.flag", StaticValue::new("Z", JvmValue::Int(7)));
        assert_eq!(statics.get("com/example/A", "flag"), Some(JvmValue::Int(1)));
    }

    #[test]
    fn preload_seeds_string_statics() {
        let statics = StaticsRegistry::new();
        statics.preload();
        assert_eq!(
            statics.get("java/lang/String", "COMPACT_STRINGS"),
            Some(JvmValue::Int(1))
        );
        assert_eq!(
            statics.get("java/lang/String", "LATIN1"),
            Some(JvmValue::Int(0))
        );
        assert_eq!(
            statics.get("main", "$assertionsDisabled"),
            Some(JvmValue::Int(1))
        );
    }

    #[test]
    fn query_returns_descriptor_and_raw_value() {
        let statics = StaticsRegistry::new();
        statics.add(
            "com/example/A.name",
            StaticValue::new("Ljava/lang/String;", JvmValue::Null),
        );
        let held = statics.query("com/example/A.name").unwrap();
        assert_eq!(held.descriptor, "Ljava/lang/String;");
        assert_eq!(held.value, JvmValue::Null);
    }
}
