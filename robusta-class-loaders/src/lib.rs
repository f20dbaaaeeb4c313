//! Class-byte sources: the narrow interface the VM core consumes.
//!
//! A loader hands back `(name, bytes)` pairs on demand; it knows nothing
//! about parsing or the method area. Directory trees, JAR archives, and JMOD
//! archives are supported, plus a combinator that chains two loaders.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub mod jar_loader;
pub mod jmod_loader;

pub use jar_loader::JarClassFileLoader;
pub use jmod_loader::JmodClassFileLoader;

#[derive(Debug)]
pub enum LoadClassFileError {
    /// No source had a file for the class.
    NonexistentFile(String),
    /// Reading the bytes out failed.
    ReadError(std::io::Error),
    /// The backing archive could not produce the entry.
    ArchiveError(String),
}

impl std::fmt::Display for LoadClassFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadClassFileError::NonexistentFile(name) => {
                write!(f, "no class file found for {name}")
            }
            LoadClassFileError::ReadError(err) => write!(f, "failed to read class file: {err}"),
            LoadClassFileError::ArchiveError(msg) => write!(f, "archive error: {msg}"),
        }
    }
}

impl std::error::Error for LoadClassFileError {}

/// Bytes for one class, plus whether they came from the trusted JDK bundle
/// (trusted classes skip the format checker, matching standard policy).
#[derive(Debug, Clone)]
pub struct ClassBytes {
    pub bytes: Vec<u8>,
    pub trusted: bool,
}

/// A source of class files by internal name (`java/lang/String`).
pub trait ClassFileLoader: Send {
    /// `Ok(None)` means this loader has no entry for the name; a chained
    /// loader may still find it.
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError>;
}

/// Filesystem directories searched in order, like a traditional class path.
#[derive(Debug, Default, Clone)]
pub struct ClassDirectories {
    directories: Vec<PathBuf>,
}

impl ClassDirectories {
    #[must_use]
    pub fn new() -> ClassDirectories {
        ClassDirectories::default()
    }

    pub fn add(&mut self, path: &Path) -> std::io::Result<()> {
        self.directories.push(path.canonicalize()?);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    fn open(&self, rel_path: &Path) -> Option<File> {
        for class_dir in &self.directories {
            let mut full_path = class_dir.clone();
            full_path.push(rel_path);
            if let Ok(file) = File::open(&full_path) {
                return Some(file);
            }
        }
        None
    }
}

impl ClassFileLoader for ClassDirectories {
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        let rel_path = internal_name_to_rel_path(internal_name);
        let Some(mut file) = self.open(&rel_path) else {
            return Ok(None);
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(LoadClassFileError::ReadError)?;
        Ok(Some(ClassBytes {
            bytes,
            trusted: false,
        }))
    }
}

impl ClassFileLoader for Box<dyn ClassFileLoader> {
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        (**self).load_class_bytes(internal_name)
    }
}

/// Chain two loaders: `a` is consulted first, `b` on a miss.
#[derive(Debug)]
pub struct CombineLoader<A, B> {
    a: A,
    b: B,
}

impl<A, B> CombineLoader<A, B> {
    pub fn new(a: A, b: B) -> CombineLoader<A, B> {
        CombineLoader { a, b }
    }
}

impl<A: ClassFileLoader, B: ClassFileLoader> ClassFileLoader for CombineLoader<A, B> {
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        if let Some(found) = self.a.load_class_bytes(internal_name)? {
            return Ok(Some(found));
        }
        self.b.load_class_bytes(internal_name)
    }
}

/// A loader with no entries, for a VM bootstrapped purely from synthesized
/// classes (tests, embedders).
#[derive(Debug, Default, Clone)]
pub struct EmptyLoader;

impl ClassFileLoader for EmptyLoader {
    fn load_class_bytes(
        &mut self,
        _internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        Ok(None)
    }
}

pub(crate) fn internal_name_to_rel_path(internal_name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for part in internal_name.split('/') {
        path.push(part);
    }
    path.set_extension("class");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_names_map_to_class_paths() {
        assert_eq!(
            internal_name_to_rel_path("java/lang/String"),
            PathBuf::from("java/lang/String.class")
        );
        assert_eq!(
            internal_name_to_rel_path("Hello2"),
            PathBuf::from("Hello2.class")
        );
    }

    #[test]
    fn combine_loader_falls_through() {
        let mut loader = CombineLoader::new(EmptyLoader, EmptyLoader);
        assert!(loader.load_class_bytes("com/example/Nope").unwrap().is_none());
    }
}
