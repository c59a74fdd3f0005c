//! Scenario files driving a run end to end: TOML in, JSON-lines events in,
//! verdict and export file out.

use std::path::Path;

use evcheck_config::{ConfigError, EventsConfig, ScenarioConfig};
use evcheck_engine::{JsonLinesSource, RunVerdict, decode_event_line};
use evcheck_runner::TestContext;
use serde_json::json;

const SCENARIO: &str = r#"
[checker]
name = "labels"
time_limit_secs = 60
namespaces = ["labels"]
export_dir = "export"

[[expect]]
process = "adservice"
attributes = { app = { exact = "adservice" }, pod-template-hash = { regex = "[a-f0-9]+" } }

[[expect]]
process = "redis"
attributes = { app = { exact = "redis-cart" }, pod-template-hash = { regex = "[a-f0-9]+" } }

[events]
source = "file"
path = "events.jsonl"
"#;

fn exported_exec(binary: &str, namespace: &str, app: &str, hash: &str) -> String {
    json!({
        "process_exec": {
            "process": {
                "binary": binary,
                "pod": {
                    "namespace": namespace,
                    "pod_labels": { "app": app, "pod-template-hash": hash }
                }
            }
        },
        "node_name": "kind-control-plane",
        "time": "2024-01-01T00:00:00Z"
    })
    .to_string()
}

fn write_scenario(dir: &Path, events: &[String]) -> ScenarioConfig {
    std::fs::write(dir.join("events.jsonl"), events.join("\n")).unwrap();
    let path = dir.join("labels.toml");
    std::fs::write(&path, SCENARIO).unwrap();
    ScenarioConfig::load(&path).unwrap()
}

async fn run(config: &ScenarioConfig) -> evcheck_engine::CheckerReport {
    let EventsConfig::File { path } = &config.events else {
        panic!("scenario reads from a file");
    };
    let source = JsonLinesSource::open(path).await.unwrap();
    let ctx = TestContext::new(config.run_defaults());
    ctx.checker(&config.checker.name, config.expectation_set().unwrap())
        .run(source)
        .await
}

#[tokio::test]
async fn exported_events_satisfy_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_scenario(
        dir.path(),
        &[
            exported_exec("/usr/bin/adservice", "default", "adservice", "7d9f8c"),
            json!({"process_exit": {"process": {"binary": "/bin/sh"}}}).to_string(),
            String::new(),
            exported_exec("/app/adservice", "labels", "adservice", "7d9f8c"),
            json!({"kind": "process_exec", "process_name": "redis", "namespace": "labels",
                   "attributes": {"app": "redis-cart", "pod-template-hash": "5b6c"}})
            .to_string(),
        ],
    );

    let report = run(&config).await;
    assert!(report.passed(), "{report}");
    // The process_exit carries no namespace and the first exec is elsewhere.
    assert_eq!(report.events_seen(), 2);

    let exported = std::fs::read_to_string(dir.path().join("export/labels.events.jsonl")).unwrap();
    let lines: Vec<_> = exported.lines().collect();
    assert_eq!(lines.len(), 2);
    let first = decode_event_line(lines[0]).unwrap().unwrap();
    assert_eq!(first.process_name, "adservice");
    assert_eq!(first.attribute("app"), Some("adservice"));
}

#[tokio::test]
async fn malformed_line_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_scenario(
        dir.path(),
        &[
            exported_exec("/app/adservice", "labels", "adservice", "7d9f8c"),
            "{\"process_exec\": ".to_string(),
        ],
    );

    let report = run(&config).await;
    let RunVerdict::Failed { reason } = report.verdict() else {
        panic!("expected failure, got {}", report.verdict());
    };
    assert!(reason.contains("line 2"), "{reason}");
}

#[tokio::test]
async fn misspelled_flat_record_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_scenario(
        dir.path(),
        &[
            exported_exec("/app/adservice", "labels", "adservice", "7d9f8c"),
            json!({"kind": "process_exec", "proces_name": "redis", "namespace": "labels"}).to_string(),
            exported_exec("/app/redis", "labels", "redis-cart", "5b6c"),
        ],
    );

    let report = run(&config).await;
    let RunVerdict::Failed { reason } = report.verdict() else {
        panic!("expected failure, got {}", report.verdict());
    };
    assert!(reason.contains("line 2"), "{reason}");
}

#[tokio::test]
async fn maximal_time_limit_override_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_scenario(
        dir.path(),
        &[
            exported_exec("/app/adservice", "labels", "adservice", "7d9f8c"),
            exported_exec("/app/redis", "labels", "redis-cart", "5b6c"),
        ],
    );
    config.override_limits(None, Some(u64::MAX));

    let report = run(&config).await;
    assert!(report.passed(), "{report}");
}

#[tokio::test]
async fn stream_ending_early_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_scenario(
        dir.path(),
        &[exported_exec("/app/adservice", "labels", "adservice", "7d9f8c")],
    );

    let report = run(&config).await;
    assert!(!report.passed());
    assert_eq!(report.unmatched().len(), 1);
    assert!(report.unmatched()[0].contains("redis-cart"));
}

#[tokio::test]
async fn overridden_event_limit_applies() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_scenario(
        dir.path(),
        &[
            exported_exec("/app/frontend", "labels", "frontend", "aa"),
            exported_exec("/app/adservice", "labels", "adservice", "bb"),
            exported_exec("/app/redis", "labels", "redis-cart", "cc"),
        ],
    );
    config.override_limits(Some(1), None);

    let report = run(&config).await;
    assert_eq!(report.verdict(), &RunVerdict::EventLimitExceeded);
    assert_eq!(report.events_seen(), 2);
}

#[test]
fn invalid_pattern_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        "[[expect]]\nprocess = \"redis\"\nattributes = { app = { regex = \"(unclosed\" } }\n",
    )
    .unwrap();

    let err = ScenarioConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Pattern { index: 0, .. }), "{err}");
    assert_eq!(err.path(), path.as_path());
    assert!(err.to_string().contains("broken.toml"));
}
