//! The process-wide name pool.
//!
//! Every class, field, and method name that outlives a single call is stored
//! here exactly once; everything else holds the 32-bit index. Indices are
//! stable for the lifetime of the process because the pool only ever grows.
//! Index 0 is reserved as the "no name" sentinel.

use indexmap::IndexSet;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use usize_cast::IntoUsize;

/// Index into the [`StringPool`]. `INVALID_NAME` (0) means absent.
pub type NameIndex = u32;

/// The reserved "invalid/absent" index.
pub const INVALID_NAME: NameIndex = 0;
/// `java/lang/Object`
pub const OBJECT_NAME: NameIndex = 1;
/// `java/lang/String`
pub const STRING_NAME: NameIndex = 2;
/// `java/lang/Class`
pub const CLASS_NAME: NameIndex = 3;
/// `java/lang/System`
pub const SYSTEM_NAME: NameIndex = 4;
/// `java/lang/Throwable`
pub const THROWABLE_NAME: NameIndex = 5;
/// `[B`
pub const BYTE_ARRAY_NAME: NameIndex = 6;
/// `[C`
pub const CHAR_ARRAY_NAME: NameIndex = 7;
/// `[D`
pub const DOUBLE_ARRAY_NAME: NameIndex = 8;
/// `[F`
pub const FLOAT_ARRAY_NAME: NameIndex = 9;
/// `[I`
pub const INT_ARRAY_NAME: NameIndex = 10;
/// `[J`
pub const LONG_ARRAY_NAME: NameIndex = 11;
/// `[S`
pub const SHORT_ARRAY_NAME: NameIndex = 12;
/// `[Z`
pub const BOOL_ARRAY_NAME: NameIndex = 13;
/// `[Ljava/lang/Object;`
pub const OBJECT_ARRAY_NAME: NameIndex = 14;
/// `[Ljava/lang/String;`
pub const STRING_ARRAY_NAME: NameIndex = 15;
/// `[Ljava/lang/Class;`
pub const CLASS_ARRAY_NAME: NameIndex = 16;

/// The names that are interned at construction, in index order. Giving the
/// array-prefixed forms fixed indices lets type checks on hot paths compare
/// indices instead of strings.
const PRELOADED: &[&str] = &[
    "",
    "java/lang/Object",
    "java/lang/String",
    "java/lang/Class",
    "java/lang/System",
    "java/lang/Throwable",
    "[B",
    "[C",
    "[D",
    "[F",
    "[I",
    "[J",
    "[S",
    "[Z",
    "[Ljava/lang/Object;",
    "[Ljava/lang/String;",
    "[Ljava/lang/Class;",
];

/// Grow-only, duplicate-suppressing pool of UTF-8 names.
///
/// Many readers may hold lookups concurrently; interning takes the write lock
/// only on a miss.
#[derive(Debug)]
pub struct StringPool {
    names: RwLock<IndexSet<String>>,
}

impl StringPool {
    #[must_use]
    pub fn new() -> StringPool {
        let mut names = IndexSet::with_capacity(256);
        for name in PRELOADED {
            names.insert((*name).to_owned());
        }

        StringPool {
            names: RwLock::new(names),
        }
    }

    /// Intern a name, returning its stable index. Re-interning an existing
    /// name returns the index it was first given.
    pub fn intern(&self, name: &str) -> NameIndex {
        {
            let names = self.names.read();
            if let Some(index) = names.get_index_of(name) {
                return index_to_name(index);
            }
        }

        let mut names = self.names.write();
        let (index, _) = names.insert_full(name.to_owned());
        index_to_name(index)
    }

    /// Look up the name behind an index. Returns `None` for indices that were
    /// never handed out (including `INVALID_NAME`'s empty sentinel is a valid
    /// lookup and yields the empty string).
    #[must_use]
    pub fn lookup(&self, index: NameIndex) -> Option<MappedRwLockReadGuard<'_, str>> {
        let names = self.names.read();
        RwLockReadGuard::try_map(names, |names| {
            names.get_index(index.into_usize()).map(String::as_str)
        })
        .ok()
    }

    /// Owned copy of the name behind an index, for error paths that must not
    /// hold the pool lock.
    #[must_use]
    pub fn lookup_owned(&self, index: NameIndex) -> Option<String> {
        self.lookup(index).map(|name| name.to_owned())
    }

    /// Rendering of an index for diagnostics. Never fails.
    #[must_use]
    pub fn tpath(&self, index: NameIndex) -> String {
        self.lookup_owned(index)
            .unwrap_or_else(|| format!("[bad name #{index}]"))
    }

    /// Number of interned names, including the preloaded set.
    #[must_use]
    pub fn size(&self) -> usize {
        self.names.read().len()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

fn index_to_name(index: usize) -> NameIndex {
    // The pool cannot practically exceed u32::MAX entries; a program that
    // interns four billion names has worse problems than this truncation.
    index as NameIndex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preloaded_names_have_fixed_indices() {
        let pool = StringPool::new();
        assert_eq!(pool.intern("java/lang/Object"), OBJECT_NAME);
        assert_eq!(pool.intern("java/lang/String"), STRING_NAME);
        assert_eq!(pool.intern("[I"), INT_ARRAY_NAME);
        assert_eq!(pool.intern("[Ljava/lang/Object;"), OBJECT_ARRAY_NAME);
        assert_eq!(&*pool.lookup(INVALID_NAME).unwrap(), "");
    }

    #[test]
    fn intern_is_idempotent() {
        let pool = StringPool::new();
        let a = pool.intern("com/example/Widget");
        let b = pool.intern("com/example/Widget");
        assert_eq!(a, b);
        assert_eq!(&*pool.lookup(a).unwrap(), "com/example/Widget");
    }

    #[test]
    fn distinct_names_get_distinct_indices() {
        let pool = StringPool::new();
        let a = pool.intern("com/example/A");
        let b = pool.intern("com/example/B");
        assert_ne!(a, b);
    }

    #[test]
    fn lookup_of_unassigned_index_is_none() {
        let pool = StringPool::new();
        assert!(pool.lookup(9999).is_none());
    }

    #[test]
    fn size_grows_only_on_new_names() {
        let pool = StringPool::new();
        let before = pool.size();
        pool.intern("java/lang/Object");
        assert_eq!(pool.size(), before);
        pool.intern("com/example/New");
        assert_eq!(pool.size(), before + 1);
    }
}
