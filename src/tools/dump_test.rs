use std::path::Path;

use tempfile::tempdir;

use super::encode_collection_file_name;
use super::exit_code;
use super::DumpReport;
use super::DumpTool;
use super::FileDumper;
use super::MockDumpTool;
use crate::store::doc;
use crate::store::CollectionState;
use crate::store::ShardStore;

/// Case 1: path separators and other unsafe bytes are percent-encoded
#[test]
fn test_collection_file_name_encoding() {
    assert_eq!("foo", encode_collection_file_name("foo"));
    assert_eq!("foo%2Fbar", encode_collection_file_name("foo/bar"));
    assert_eq!("foo%5Cbar", encode_collection_file_name("foo\\bar"));
    assert_eq!("100%25", encode_collection_file_name("100%"));
    assert_eq!("a.b_c-d", encode_collection_file_name("a.b_c-d"));
}

/// Case 2: a collection named with a slash dumps to one flat decodable file
#[test]
fn test_dump_writes_flat_files() {
    let store = ShardStore::new();
    store.insert_document("test.foo/bar", doc([("num", 1i64)]));
    store.insert_document("test.foo/bar", doc([("num", 2i64)]));
    store.insert_document("other.skipped", doc([("num", 3i64)]));

    let dir = tempdir().unwrap();
    let result = FileDumper.dump(&store, "test", dir.path());
    assert_eq!(0, exit_code(&result));

    let report = result.unwrap();
    assert_eq!(1, report.files.len());
    let path = &report.files[0];
    assert_eq!("foo%2Fbar.bin", path.file_name().unwrap().to_str().unwrap());
    assert!(path.parent() == Some(dir.path()));

    let decoded: CollectionState = bincode::deserialize(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(2, decoded.documents.len());
}

/// Case 3: a database with no collections dumps to an empty report
#[test]
fn test_dump_of_absent_database_is_empty() {
    let store = ShardStore::new();
    let dir = tempdir().unwrap();
    let report = FileDumper.dump(&store, "nothere", dir.path()).unwrap();
    assert!(report.files.is_empty());
}

/// Case 4: an unwritable target reports failure through the exit code
#[test]
fn test_dump_failure_exit_code() {
    let store = ShardStore::new();
    store.insert_document("test.foo", doc([("num", 1i64)]));

    let dir = tempdir().unwrap();
    let blocking_file = dir.path().join("not_a_dir");
    std::fs::write(&blocking_file, b"occupied").unwrap();

    let result = FileDumper.dump(&store, "test", &blocking_file);
    assert_eq!(1, exit_code(&result));
}

/// Case 5: the trait seam lets scenarios substitute a mock
#[test]
fn test_mock_dump_tool() {
    let mut mock = MockDumpTool::new();
    mock.expect_dump()
        .withf(|_, db, dir: &Path| db == "test" && dir.ends_with("out"))
        .times(1)
        .returning(|_, _, _| Ok(DumpReport { files: vec![] }));

    let store = ShardStore::new();
    let report = mock.dump(&store, "test", Path::new("/tmp/out")).unwrap();
    assert!(report.files.is_empty());
}
