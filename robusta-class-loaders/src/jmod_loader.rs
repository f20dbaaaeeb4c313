//! Loading class files out of a JMOD archive.
//!
//! A JMOD is a zip whose class entries live under a `classes/` prefix.
//! Classes from JMODs are part of the JDK bundle and are marked trusted, so
//! the format checker is skipped for them.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use zip::ZipArchive;

use crate::jar_loader::{index_class_entries, read_entry};
use crate::{ClassBytes, ClassFileLoader, LoadClassFileError};

const CLASSES_PREFIX: &str = "classes/";

#[derive(Debug)]
pub struct JmodClassFileLoader {
    jmod_path: PathBuf,
    archive: ZipArchive<File>,
    class_entries: HashMap<String, usize>,
}

impl JmodClassFileLoader {
    pub fn new(jmod_path: PathBuf) -> std::io::Result<JmodClassFileLoader> {
        let file = File::open(&jmod_path)?;
        let mut archive = ZipArchive::new(file)?;
        let class_entries = index_class_entries(&jmod_path, &mut archive, CLASSES_PREFIX);

        Ok(JmodClassFileLoader {
            jmod_path,
            archive,
            class_entries,
        })
    }
}

impl ClassFileLoader for JmodClassFileLoader {
    fn load_class_bytes(
        &mut self,
        internal_name: &str,
    ) -> Result<Option<ClassBytes>, LoadClassFileError> {
        let Some(index) = self.class_entries.get(internal_name).copied() else {
            return Ok(None);
        };

        read_entry(&self.jmod_path, &mut self.archive, index).map(|bytes| {
            Some(ClassBytes {
                bytes,
                trusted: true,
            })
        })
    }
}
