// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_state_serde_round_trip() {
    let state = TaskState {
        id: 9,
        result: RunResult::Success,
        started_at: Some(Utc::now()),
        stopped_at: Some(Utc::now()),
        steps: vec![StepState { id: 0, result: RunResult::Success, ..Default::default() }],
    };
    let json = serde_json::to_string(&state).unwrap();
    let back: TaskState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, 9);
    assert_eq!(back.result, RunResult::Success);
    assert_eq!(back.steps.len(), 1);
}

#[test]
fn step_state_defaults_are_unspecified() {
    let step = StepState::default();
    assert_eq!(step.result, RunResult::Unspecified);
    assert!(step.started_at.is_none());
    assert_eq!(step.log_index, 0);
    assert_eq!(step.log_length, 0);
}

#[test]
fn sparse_state_json_deserializes() {
    let state: TaskState = serde_json::from_str(r#"{"id": 3}"#).unwrap();
    assert_eq!(state.id, 3);
    assert_eq!(state.result, RunResult::Unspecified);
    assert!(state.steps.is_empty());
}
