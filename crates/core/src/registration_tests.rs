// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".runner");

    let reg = Registration {
        id: 12,
        uuid: "9c3a9f84-1d5f-4b9c-8f0e-000000000000".to_string(),
        name: "builder-1".to_string(),
        token: "tok".to_string(),
        address: "https://forge.example.com".to_string(),
        labels: vec!["ubuntu-latest:docker://forge/runner-images:ubuntu-latest".to_string()],
    };
    reg.save(&path).unwrap();

    let loaded = Registration::load(&path).unwrap();
    assert_eq!(loaded, reg);
}

#[test]
fn load_missing_file_is_not_found() {
    let err = Registration::load(Path::new("/nonexistent/.runner")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}
