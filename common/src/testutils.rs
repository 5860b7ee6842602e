use std::os::unix::fs::MetadataExt;

/// Create a temporary directory with a small tree of files:
///
/// ```text
/// foo
/// |- 0.txt
/// |- .hidden
/// |- bar
///    |- 1.txt
///    |- 2.txt
///    |- 3.md
/// |- baz
///    |- 4.txt
///    |- 5.txt -> ../bar/2.txt
/// ```
pub fn setup_test_dir() -> tempfile::TempDir {
    let tmp_dir = tempfile::tempdir().unwrap();
    let foo_path = tmp_dir.path().join("foo");
    std::fs::create_dir(&foo_path).unwrap();
    std::fs::write(foo_path.join("0.txt"), "0").unwrap();
    std::fs::write(foo_path.join(".hidden"), "hidden").unwrap();
    let bar_path = foo_path.join("bar");
    std::fs::create_dir(&bar_path).unwrap();
    std::fs::write(bar_path.join("1.txt"), "1").unwrap();
    std::fs::write(bar_path.join("2.txt"), "2").unwrap();
    std::fs::write(bar_path.join("3.md"), "3").unwrap();
    let baz_path = foo_path.join("baz");
    std::fs::create_dir(&baz_path).unwrap();
    std::fs::write(baz_path.join("4.txt"), "4").unwrap();
    std::os::unix::fs::symlink("../bar/2.txt", baz_path.join("5.txt")).unwrap();
    tmp_dir
}

/// Permission checks are bypassed for root, tests relying on them bail out early.
pub fn is_root() -> bool {
    let probe = tempfile::NamedTempFile::new().unwrap();
    probe.as_file().metadata().unwrap().uid() == 0
}
