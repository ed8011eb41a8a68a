//! Build context packaging tests

use std::io::Read;
use std::path::Path;

use gakwaya_panel::deploy::package::{pack, pack_blocking};

fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(bytes);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let path = entry
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            (path, contents)
        })
        .collect()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_pack_archives_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Dockerfile", "FROM alpine\n");
    write(dir.path(), "src/app/main.py", "print('hi')\n");

    let context = pack(dir.path()).await.unwrap();
    assert!(!context.is_empty());
    assert_eq!(context.entries(), 4);
    assert_eq!(context.skipped(), 0);

    let entries = archive_entries(&context.into_bytes());
    let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();

    // sorted walk, no entry for the root itself
    assert_eq!(paths, vec!["Dockerfile", "src", "src/app", "src/app/main.py"]);
    assert_eq!(entries[0].1, b"FROM alpine\n");
    assert_eq!(entries[3].1, b"print('hi')\n");
}

#[test]
fn test_pack_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.txt", "b");
    write(dir.path(), "a.txt", "a");
    write(dir.path(), "c/d.txt", "d");

    let first = pack_blocking(dir.path()).unwrap().into_bytes();
    let second = pack_blocking(dir.path()).unwrap().into_bytes();
    assert_eq!(first, second);
}

#[test]
fn test_pack_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let context = pack_blocking(dir.path()).unwrap();
    assert_eq!(context.entries(), 0);
    assert!(archive_entries(&context.into_bytes()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_pack_skips_symlinks() {
    let outside = tempfile::tempdir().unwrap();
    write(outside.path(), "secret", "host-only");

    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Dockerfile", "FROM alpine\n");
    std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("leak")).unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("leak-dir")).unwrap();

    let context = pack_blocking(dir.path()).unwrap();
    assert_eq!(context.entries(), 1);
    assert_eq!(context.skipped(), 2);

    let entries = archive_entries(&context.into_bytes());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "Dockerfile");
    assert!(entries
        .iter()
        .all(|(_, contents)| contents != b"host-only"));
}

#[cfg(unix)]
#[test]
fn test_pack_preserves_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "entrypoint.sh", "#!/bin/sh\n");
    std::fs::set_permissions(
        dir.path().join("entrypoint.sh"),
        std::fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    let bytes = pack_blocking(dir.path()).unwrap().into_bytes();
    let mut archive = tar::Archive::new(bytes.as_slice());
    let entry = archive.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.header().mode().unwrap() & 0o777, 0o755);
}

#[tokio::test]
async fn test_pack_missing_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(pack(&missing).await.is_err());
}
