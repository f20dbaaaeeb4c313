//! The `java/lang/Class` instance registry.
//!
//! One Class object per loaded class, keyed by interned name, with a
//! back-pointer to the class record's name and the list of static field
//! names accumulated while `<clinit>` runs. LDC of a class literal and
//! `Object.getClass` read from here.

use std::collections::HashMap;

use parking_lot::RwLock;

use robusta_base::string_pool::{NameIndex, CLASS_NAME};

use crate::heap::{Heap, ObjRef};
use crate::object::Object;

#[derive(Debug, Clone)]
pub struct ClassObj {
    /// The heap object representing the `java/lang/Class` instance.
    pub class_ref: ObjRef,
    /// Back-pointer: the interned name of the class this instance mirrors.
    pub klass: NameIndex,
    /// Names of static fields observed while the class initialized.
    pub statics: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ClassObjects {
    map: RwLock<HashMap<NameIndex, ClassObj>>,
}

impl ClassObjects {
    #[must_use]
    pub fn new() -> ClassObjects {
        ClassObjects {
            map: RwLock::new(HashMap::with_capacity(64)),
        }
    }

    #[must_use]
    pub fn get(&self, klass: NameIndex) -> Option<ClassObj> {
        self.map.read().get(&klass).cloned()
    }

    /// Fetch the Class instance for a class, creating it on first use.
    pub fn get_or_create(&self, heap: &RwLock<Heap>, klass: NameIndex) -> ObjRef {
        if let Some(entry) = self.map.read().get(&klass) {
            return entry.class_ref;
        }

        let mut map = self.map.write();
        // Racing creators resolve to whoever got the write lock first.
        if let Some(entry) = map.get(&klass) {
            return entry.class_ref;
        }

        let class_ref = heap.write().alloc(Object::new_of_class(CLASS_NAME));
        map.insert(
            klass,
            ClassObj {
                class_ref,
                klass,
                statics: Vec::new(),
            },
        );
        class_ref
    }

    /// Record a static field name observed during initialization.
    pub fn add_static_name(&self, klass: NameIndex, field_name: &str) {
        let mut map = self.map.write();
        if let Some(entry) = map.get_mut(&klass) {
            if !entry.statics.iter().any(|s| s == field_name) {
                entry.statics.push(field_name.to_owned());
            }
        }
    }

    /// The class an existing Class instance mirrors, by heap reference.
    #[must_use]
    pub fn klass_of(&self, class_ref: ObjRef) -> Option<NameIndex> {
        self.map
            .read()
            .values()
            .find(|entry| entry.class_ref == class_ref)
            .map(|entry| entry.klass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robusta_base::string_pool::StringPool;

    #[test]
    fn get_or_create_is_idempotent() {
        let pool = StringPool::new();
        let heap = RwLock::new(Heap::new());
        let objects = ClassObjects::new();

        let name = pool.intern("com/example/A");
        let a = objects.get_or_create(&heap, name);
        let b = objects.get_or_create(&heap, name);
        assert_eq!(a, b);
        assert_eq!(objects.klass_of(a), Some(name));
    }

    #[test]
    fn static_names_accumulate_without_duplicates() {
        let pool = StringPool::new();
        let heap = RwLock::new(Heap::new());
        let objects = ClassObjects::new();

        let name = pool.intern("com/example/B");
        objects.get_or_create(&heap, name);
        objects.add_static_name(name, "count");
        objects.add_static_name(name, "count");
        objects.add_static_name(name, "flag");
        assert_eq!(objects.get(name).unwrap().statics, vec!["count", "flag"]);
    }
}
