use std::fs;
use std::path::Path;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::store::split_namespace;
use crate::store::CollectionState;
use crate::store::ShardStore;
use crate::Result;

/// What one dump run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReport {
    pub files: Vec<PathBuf>,
}

/// Dumps the collections of one database out of a shard store.
///
/// The trait seam exists so scenario code can substitute a mock and assert
/// on invocation shape without touching the filesystem.
#[cfg_attr(test, automock)]
pub trait DumpTool {
    fn dump(
        &self,
        store: &ShardStore,
        db: &str,
        target_dir: &Path,
    ) -> Result<DumpReport>;
}

/// Process-style exit code for a dump run: 0 on success, 1 on any failure.
pub fn exit_code(result: &Result<DumpReport>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Maps a collection name to a filesystem-safe file stem. Every byte
/// outside `[A-Za-z0-9._-]` is percent-encoded, so names containing path
/// separators ("foo/bar") dump to a single flat file instead of escaping
/// the target directory.
pub fn encode_collection_file_name(collection: &str) -> String {
    let mut encoded = String::with_capacity(collection.len());
    for byte in collection.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push_str(&format!("%{:02X}", other));
            }
        }
    }
    encoded
}

/// The real dumper: one bincode file per collection, named after the
/// percent-encoded collection name.
#[derive(Debug, Default)]
pub struct FileDumper;

impl DumpTool for FileDumper {
    fn dump(
        &self,
        store: &ShardStore,
        db: &str,
        target_dir: &Path,
    ) -> Result<DumpReport> {
        fs::create_dir_all(target_dir)?;

        let mut files = Vec::new();
        for namespace in store.namespaces() {
            let (namespace_db, collection) = split_namespace(&namespace);
            if namespace_db != db {
                continue;
            }

            let state: CollectionState = store
                .read_collection(&namespace, |c| c.clone())
                .unwrap_or_default();
            let path = target_dir.join(format!("{}.bin", encode_collection_file_name(collection)));
            fs::write(&path, bincode::serialize(&state)?)?;
            files.push(path);
        }

        info!("dumped {} collection(s) of {} to {:?}", files.len(), db, target_dir);
        Ok(DumpReport { files })
    }
}
