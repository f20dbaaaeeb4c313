//! The method area: the process-wide registry of published class records.
//!
//! Records are keyed by interned name and inserted exactly once; after
//! publication only the record's own `clinit` cell changes. Readers take the
//! shared lock, the single writer path takes it exclusively.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::class::ClData;
use crate::string_pool::NameIndex;

#[derive(Debug, Default)]
pub struct MethodArea {
    classes: RwLock<IndexMap<NameIndex, Arc<ClData>>>,
}

impl MethodArea {
    #[must_use]
    pub fn new() -> MethodArea {
        MethodArea {
            classes: RwLock::new(IndexMap::with_capacity(64)),
        }
    }

    /// Publish a record. Publication is first-wins: if a record for the name
    /// already exists (two threads raced on loading), the existing record is
    /// returned and the new one is dropped.
    pub fn insert(&self, record: ClData) -> Arc<ClData> {
        let mut classes = self.classes.write();
        if let Some(existing) = classes.get(&record.name) {
            return Arc::clone(existing);
        }
        let record = Arc::new(record);
        classes.insert(record.name, Arc::clone(&record));
        record
    }

    #[must_use]
    pub fn fetch(&self, name: NameIndex) -> Option<Arc<ClData>> {
        self.classes.read().get(&name).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, name: NameIndex) -> bool {
        self.classes.read().contains_key(&name)
    }

    /// Locate a method declared directly on the named class, together with
    /// the record that owns it (and therefore its constant pool).
    #[must_use]
    pub fn fetch_method(
        &self,
        class: NameIndex,
        method_name: &str,
        descriptor: &str,
    ) -> Option<(Arc<ClData>, usize)> {
        let record = self.fetch(class)?;
        let (index, _) = record.find_method(method_name, descriptor)?;
        Some((record, index))
    }

    /// Number of published classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string_pool::StringPool;

    fn record(pool: &StringPool, name: &str) -> ClData {
        ClData::synthesized(pool.intern(name), pool.intern("java/lang/Object"), Vec::new())
    }

    #[test]
    fn insert_is_publish_once() {
        let pool = StringPool::new();
        let area = MethodArea::new();

        let first = area.insert(record(&pool, "com/example/A"));
        let second = area.insert(record(&pool, "com/example/A"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(area.len(), 1);
    }

    #[test]
    fn fetch_returns_published_records() {
        let pool = StringPool::new();
        let area = MethodArea::new();
        let name = pool.intern("com/example/B");

        assert!(area.fetch(name).is_none());
        area.insert(record(&pool, "com/example/B"));
        assert_eq!(area.fetch(name).unwrap().name, name);
    }
}
