// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fr_core::{RunResult, TaskNeed};
use std::collections::HashMap;

const PAYLOAD_WITH_NEEDS: &str = r#"
name: Build and deploy
on: push

jobs:
  job9:
    needs: build
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v3
      - run: ./deploy --build ${{ needs.job1.outputs.output1 }}
      - run: ./deploy --build ${{ needs.job2.outputs.output2 }}
"#;

fn task_with_needs() -> Task {
    let mut needs = HashMap::new();
    needs.insert(
        "job1".to_string(),
        TaskNeed {
            outputs: HashMap::from([("output1".to_string(), "output1 value".to_string())]),
            result: RunResult::Success,
        },
    );
    needs.insert(
        "job2".to_string(),
        TaskNeed {
            outputs: HashMap::from([("output2".to_string(), "output2 value".to_string())]),
            result: RunResult::Success,
        },
    );
    Task { id: 100, workflow_payload: PAYLOAD_WITH_NEEDS.to_string(), needs, ..Default::default() }
}

#[test]
fn synthesizes_stub_jobs_from_needs() {
    let (workflow, job_id) = generate_workflow(&task_with_needs()).unwrap();
    assert_eq!(job_id, "job9");

    let job1 = &workflow.jobs["job1"];
    assert_eq!(job1.result.as_deref(), Some("success"));
    assert_eq!(job1.outputs["output1"], "output1 value");

    let job2 = &workflow.jobs["job2"];
    assert_eq!(job2.result.as_deref(), Some("success"));
    assert_eq!(job2.outputs["output2"], "output2 value");
}

#[test]
fn rewritten_needs_list_is_sorted() {
    let (workflow, job_id) = generate_workflow(&task_with_needs()).unwrap();
    assert_eq!(workflow.jobs[&job_id].needs(), vec!["job1".to_string(), "job2".to_string()]);
}

#[test]
fn step_count_survives_synthesis() {
    let (workflow, job_id) = generate_workflow(&task_with_needs()).unwrap();
    assert_eq!(workflow.jobs[&job_id].steps.len(), 3);
}

#[test]
fn two_jobs_are_rejected() {
    let task = Task {
        workflow_payload: "jobs:\n  a:\n    steps: []\n  b:\n    steps: []\n".to_string(),
        ..Default::default()
    };
    let err = generate_workflow(&task).unwrap_err();
    assert!(err.to_string().contains("multiple jobs found"));
    assert!(err.to_string().contains('a'));
    assert!(err.to_string().contains('b'));
}

#[test]
fn zero_jobs_are_rejected() {
    let task = Task { workflow_payload: "name: empty\n".to_string(), ..Default::default() };
    assert!(generate_workflow(&task).is_err());
}

#[test]
fn garbage_payload_is_a_parse_error() {
    let task = Task { workflow_payload: "jobs: [not: a map".to_string(), ..Default::default() };
    assert!(matches!(generate_workflow(&task), Err(WorkflowError::Parse(_))));
}

#[test]
fn needs_accepts_string_and_list() {
    let one: Job = serde_yaml::from_str("needs: build\nsteps: []").unwrap();
    assert_eq!(one.needs(), vec!["build".to_string()]);

    let many: Job = serde_yaml::from_str("needs: [a, b]\nsteps: []").unwrap();
    assert_eq!(many.needs(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn step_display_name_prefers_explicit_name() {
    let named = Step { name: Some("Lint".to_string()), ..Default::default() };
    assert_eq!(named.display_name(), "Lint");

    let run = Step { run: Some("make test\nmake lint".to_string()), ..Default::default() };
    assert_eq!(run.display_name(), "Run make test");

    let uses = Step { uses: Some("actions/checkout@v3".to_string()), ..Default::default() };
    assert_eq!(uses.display_name(), "actions/checkout@v3");
}
