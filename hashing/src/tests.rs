// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use super::*;

#[test]
fn fingerprint_round_trips_through_hex() {
    let fp = fingerprint_of(b"hello world");
    let hex = fp.to_hex();
    assert_eq!(Fingerprint::from_hex_string(&hex).unwrap(), fp);
}

#[test]
fn empty_fingerprint_matches_sha256_of_empty_input() {
    assert_eq!(fingerprint_of(b""), EMPTY_FINGERPRINT);
    assert_eq!(Digest::of_bytes(b""), EMPTY_DIGEST);
}

#[test]
fn fingerprint_sensitive_to_every_byte() {
    let a = fingerprint_of(b"int main(){}");
    let b = fingerprint_of(b"int main(){return 0;}");
    assert_ne!(a, b);
}

#[test]
fn serialize_fingerprint_is_order_sensitive_within_a_field() {
    let a = serialize_fingerprint(b"seed", |s| {
        s.update_str("a").update_str("bc");
    });
    let b = serialize_fingerprint(b"seed", |s| {
        s.update_str("ab").update_str("c");
    });
    assert_ne!(a, b, "length-prefixing must prevent field-boundary collisions");
}

#[test]
fn serialize_fingerprint_is_seed_namespaced() {
    let a = serialize_fingerprint(b"namespace-a", |s| {
        s.update_str("same");
    });
    let b = serialize_fingerprint(b"namespace-b", |s| {
        s.update_str("same");
    });
    assert_ne!(a, b);
}

#[test]
fn digest_file_ignores_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"stable content").unwrap();
    let first = digest_file(&path).unwrap();

    // Touch mtime without touching content.
    std::thread::sleep(std::time::Duration::from_millis(10));
    let now = filetime_now();
    filetime_set(&path, now);

    let second = digest_file(&path).unwrap();
    assert_eq!(first, second);
}

// Minimal local mtime helpers so this crate doesn't need a `filetime` dependency just for
// one test.
fn filetime_now() -> std::time::SystemTime {
    std::time::SystemTime::now()
}

fn filetime_set(path: &std::path::Path, time: std::time::SystemTime) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

#[tokio::test]
async fn digest_file_async_matches_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"some content for hashing").unwrap();
    assert_eq!(digest_file(&path).unwrap(), digest_file_async(&path).await.unwrap());
}
