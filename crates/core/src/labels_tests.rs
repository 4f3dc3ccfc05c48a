// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_docker_label_with_image() {
    let label = Label::parse("ubuntu:docker://node:18").unwrap();
    assert_eq!(label.name, "ubuntu");
    assert_eq!(label.scheme, Scheme::Docker);
    assert_eq!(label.arg, "//node:18");
}

#[test]
fn parse_host_label() {
    let label = Label::parse("ubuntu:host").unwrap();
    assert_eq!(label.name, "ubuntu");
    assert_eq!(label.scheme, Scheme::Host);
    assert_eq!(label.arg, "");
}

#[test]
fn parse_bare_name_defaults_to_host() {
    let label = Label::parse("ubuntu").unwrap();
    assert_eq!(label.scheme, Scheme::Host);
}

#[test]
fn parse_rejects_unknown_scheme() {
    let err = Label::parse("ubuntu:vm:ubuntu-18.04").unwrap_err();
    assert_eq!(err, LabelError::UnsupportedScheme("vm".to_string()));
}

#[test]
fn display_round_trips() {
    for s in ["ubuntu:docker://node:18", "mac:host"] {
        let label = Label::parse(s).unwrap();
        assert_eq!(label.to_string(), s);
    }
}

#[test]
fn pick_platform_prefers_matching_label() {
    let labels = Labels::parse_lenient(&[
        "ubuntu:docker://node:18".to_string(),
        "bare:host".to_string(),
    ]);
    assert_eq!(labels.pick_platform(&["ubuntu".to_string()]), "node:18");
    assert_eq!(labels.pick_platform(&["bare".to_string()]), "-self-hosted");
}

#[test]
fn pick_platform_last_duplicate_name_wins() {
    let labels = Labels::parse_lenient(&[
        "ubuntu:docker://node:18".to_string(),
        "ubuntu:docker://node:20".to_string(),
    ]);
    assert_eq!(labels.pick_platform(&["ubuntu".to_string()]), "node:20");
}

#[test]
fn pick_platform_falls_back_for_unknown() {
    let labels = Labels::parse_lenient(&["ubuntu:docker://node:18".to_string()]);
    let image = labels.pick_platform(&["windows-latest".to_string()]);
    assert_eq!(image, "forge/runner-images:ubuntu-latest");
}

#[test]
fn parse_lenient_skips_invalid() {
    let labels = Labels::parse_lenient(&[
        "good:host".to_string(),
        "bad:vm".to_string(),
    ]);
    assert_eq!(labels.names(), vec!["good".to_string()]);
}

#[test]
fn require_docker_detects_scheme() {
    let host_only = Labels::parse_lenient(&["a:host".to_string()]);
    assert!(!host_only.require_docker());
    let mixed = Labels::parse_lenient(&["a:host".to_string(), "b:docker://x".to_string()]);
    assert!(mixed.require_docker());
}
