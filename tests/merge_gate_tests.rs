//! MergeGate against a fake merge tool.

#![cfg(unix)]

mod common;

use common::{FakeSimulation, SimFixture};
use parsim_core::config::SimulationConfig;
use parsim_core::error::MergeError;
use parsim_core::merge::{MergeGate, MergeStatus};
use parsim_core::orchestrator::JobOrchestrator;
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn all_jobs_succeeding_merges_once_in_job_order() {
    let fixture = SimFixture::new();
    fixture.install_executable(&FakeSimulation::succeeding());
    let config = fixture.config(2, 50);

    let report = JobOrchestrator::new(config.clone()).run().await;
    assert!(report.all_succeeded());

    let merge = MergeGate::new(config.clone()).run(&report).await;
    let target = fixture.data_dir.join("result.root");
    assert_eq!(
        merge,
        MergeStatus::Performed {
            inputs: 2,
            target: target.clone()
        }
    );

    let invocations = fixture.merge_invocations();
    assert_eq!(invocations.len(), 1);
    let invocation = &invocations[0];
    assert_eq!(
        invocation.args,
        vec![
            "-f".to_string(),
            target.display().to_string(),
            "output_0.root".to_string(),
            "output_1.root".to_string(),
        ]
    );
    assert_eq!(
        fs::canonicalize(&invocation.cwd).unwrap(),
        fs::canonicalize(&fixture.build_dir).unwrap()
    );

    // Merged content is job 0 followed by job 1; inputs are kept
    let merged = fs::read_to_string(&target).unwrap();
    let lines: Vec<&str> = merged.lines().collect();
    assert_eq!(lines, vec!["job 0 /run/beamOn 50", "job 1 /run/beamOn 50"]);
    assert_eq!(fixture.job_artifacts(), vec!["output_0.root", "output_1.root"]);
}

#[tokio::test]
async fn failing_merge_tool_keeps_artifacts() {
    let fixture = SimFixture::new();
    fixture.install_executable(&FakeSimulation::succeeding());
    fixture.install_merge_tool(3);
    let config = fixture.config(2, 10);

    let report = JobOrchestrator::new(config.clone()).run().await;
    let merge = MergeGate::new(config).run(&report).await;

    match merge {
        MergeStatus::Failed {
            error: MergeError::ToolFailed { exit_code, .. },
        } => assert_eq!(exit_code, Some(3)),
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert_eq!(fixture.merge_invocations().len(), 1);
    assert_eq!(fixture.job_artifacts(), vec!["output_0.root", "output_1.root"]);
}

#[tokio::test]
async fn missing_merge_tool_is_reported_distinctly() {
    let fixture = SimFixture::new();
    fixture.install_executable(&FakeSimulation::succeeding());
    let config = Arc::new(
        SimulationConfig::try_from(parsim_core::SimulationSettings {
            merge_tool: "parsim-test-no-such-merge-tool".to_string(),
            ..fixture.settings(1, 10)
        })
        .unwrap(),
    );

    let report = JobOrchestrator::new(config.clone()).run().await;
    let merge = MergeGate::new(config).run(&report).await;

    assert_eq!(
        merge,
        MergeStatus::Failed {
            error: MergeError::ToolNotFound {
                tool: "parsim-test-no-such-merge-tool".to_string()
            }
        }
    );
    assert_eq!(fixture.job_artifacts(), vec!["output_0.root"]);
}
