mod common;

use std::io::{Cursor, Write};

use common::*;
use jvm2js::{translate_to_string, ClassPath, DirResources, JarResources, MemoryResources, Resources, TranslateOptions};
use pretty_assertions::assert_eq;
use zip::write::SimpleFileOptions;

fn jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_directory("demo/", SimpleFileOptions::default()).unwrap();
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn jar_entries_are_readable() {
    let bytes = jar(&[
        ("demo/Main.class", &object_class()[..]),
        ("demo/package-info.class", &b"ignored"[..]),
        ("config/app.txt", &b"hello"[..]),
    ]);
    let res = JarResources::from_bytes(&bytes).unwrap();
    assert_eq!(res.get("config/app.txt").unwrap(), Some(b"hello".to_vec()));
    assert_eq!(res.get("/config/app.txt").unwrap(), Some(b"hello".to_vec()));
    assert_eq!(res.get("config/missing.txt").unwrap(), None);
    assert_eq!(res.class_names().collect::<Vec<_>>(), vec!["demo/Main"]);
}

#[test]
fn corrupt_jar_is_an_io_error() {
    let err = JarResources::from_bytes(b"PK not really").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn directory_resources_stay_under_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("demo")).unwrap();
    std::fs::write(dir.path().join("demo/data.bin"), [1u8, 2, 3]).unwrap();
    let res = DirResources::new(dir.path());
    assert_eq!(res.get("demo/data.bin").unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(res.get("demo/none.bin").unwrap(), None);
    assert_eq!(res.get("../etc/passwd").unwrap(), None);
}

#[test]
fn class_path_prefers_earlier_entries() {
    let first = MemoryResources::new().with("a.txt", b"first".to_vec());
    let second = MemoryResources::new()
        .with("a.txt", b"second".to_vec())
        .with("b.txt", b"only here".to_vec());
    let path = ClassPath::new().with(first).with(second);
    assert_eq!(path.get("a.txt").unwrap(), Some(b"first".to_vec()));
    assert_eq!(path.get("b.txt").unwrap(), Some(b"only here".to_vec()));
    assert_eq!(path.get("c.txt").unwrap(), None);
}

#[test]
fn translates_classes_from_a_jar() {
    let main = ClassBuilder::object("demo/Main")
        .default_constructor("java/lang/Object")
        .build();
    let bytes = jar(&[
        ("java/lang/Object.class", &object_class()[..]),
        ("java/lang/Class.class", &class_class()[..]),
        ("demo/Main.class", &main[..]),
    ]);
    let res = JarResources::from_bytes(&bytes).unwrap();
    let (script, report) = translate_to_string(&res, &TranslateOptions::new(["demo.Main"])).unwrap();
    assert!(script.contains("vm.demo_Main = function demo_Main(arg0) {"));
    assert!(report.compiled.contains(&"demo/Main".to_string()));
}
