//! Loading class files out of a JAR (zip) archive.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use zip::ZipArchive;

use crate::{ClassBytes, ClassFileLoader, LoadClassFileError};

/// A class-file source over one JAR file. The archive's class entries are
/// indexed at construction; entries that are not class files are skipped
/// with an informational note.
#[derive(Debug)]
pub struct JarClassFileLoader {
    jar_path: PathBuf,
    archive: ZipArchive<File>,
    /// internal class name -> entry index in the archive
    class_entries: HashMap<String, usize>,
}

impl JarClassFileLoader {
    pub fn new(jar_path: PathBuf) -> std::io::Result<JarClassFileLoader> {
        let file = File::open(&jar_path)?;
        let mut archive = ZipArchive::new(file)?;
        let class_entries = index_class_entries(&jar_path, &mut archive, "");

        Ok(JarClassFileLoader {
            jar_path,
            archive,
            class_entries,
        })
    }

    /// Internal names of every loadable class in the archive.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.class_entries.keys().map(String::as_str)
    }
}

impl ClassFileLoader for JarClassFileLoader {
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        let Some(index) = self.class_entries.get(internal_name).copied() else {
            return Ok(None);
        };

        read_entry(&self.jar_path, &mut self.archive, index).map(|bytes| {
            Some(ClassBytes {
                bytes,
                trusted: false,
            })
        })
    }
}

pub(crate) fn read_entry(
    archive_path: &std::path::Path,
    archive: &mut ZipArchive<File>,
    index: usize,
) -> Result<Vec<u8>, LoadClassFileError> {
    let mut entry = archive.by_index(index).map_err(|err| {
        LoadClassFileError::ArchiveError(format!("{}: {err}", archive_path.display()))
    })?;

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(LoadClassFileError::ReadError)?;
    Ok(bytes)
}

/// Scan an archive for `.class` entries under `prefix`, returning a map from
/// internal class name to entry index. Non-class entries are noted and
/// skipped.
pub(crate) fn index_class_entries(
    archive_path: &std::path::Path,
    archive: &mut ZipArchive<File>,
    prefix: &str,
) -> HashMap<String, usize> {
    let mut class_entries = HashMap::new();
    for index in 0..archive.len() {
        let Ok(entry) = archive.by_index(index) else {
            continue;
        };
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_owned();
        drop(entry);

        let Some(in_prefix) = name.strip_prefix(prefix) else {
            tracing::info!(
                "skipping entry outside class prefix in {}: {name}",
                archive_path.display()
            );
            continue;
        };
        if let Some(class_name) = in_prefix.strip_suffix(".class") {
            // module-info carries no loadable class.
            if class_name == "module-info" {
                continue;
            }
            class_entries.insert(class_name.to_owned(), index);
        } else {
            tracing::info!(
                "skipping non-class entry in {}: {name}",
                archive_path.display()
            );
        }
    }
    class_entries
}
