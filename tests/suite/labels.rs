//! The demo-app labels scenario: every boutique service must be seen
//! starting in the test namespace with its pod labels, while a flaky
//! install runs alongside the checker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use anyhow::bail;
use evcheck_engine::RunVerdict;
use evcheck_runner::{RetryPolicy, RunDefaults, Task, TestContext, run_workload};
use evcheck_types::ObservedEvent;
use tokio::sync::mpsc;

use crate::common::{BOUTIQUE, NAMESPACE, labels_expectations, pod_exec};

fn context() -> TestContext {
    TestContext::new(RunDefaults {
        namespaces: vec![NAMESPACE.to_string()],
        ..RunDefaults::default()
    })
}

/// What the cluster would emit once the app is installed, with noise from
/// other namespaces and non-deployment pods interleaved.
fn install_events(skip: Option<&str>) -> Vec<ObservedEvent> {
    let mut events = Vec::new();
    for (i, (process, app)) in BOUTIQUE.iter().enumerate() {
        events.push(ObservedEvent::exec("kubelet", [("app", "kubelet")]).in_namespace("kube-system"));
        if Some(*process) == skip {
            continue;
        }
        if i % 4 == 0 {
            // A static pod has no hex template hash.
            events.push(pod_exec(process, app, "static-pod"));
        }
        events.push(pod_exec(process, app, &format!("{:x}", 0x5d8f_7c9b + i)));
    }
    events
}

#[tokio::test(start_paused = true)]
async fn all_services_observed_after_flaky_install() {
    let ctx = context();
    let checker = ctx.checker("labels", labels_expectations());
    let (tx, rx) = mpsc::channel(64);
    let attempts = Arc::new(AtomicU32::new(0));
    let uninstalled = Arc::new(AtomicBool::new(false));

    let policy = ctx.retry_policy();
    let tries = Arc::clone(&attempts);
    let flag = Arc::clone(&uninstalled);
    let outcome = ctx
        .parallel(checker)
        .setup(Task::new("create namespace", async { Ok(()) }))
        .collaborator("install demo app", move |handle| async move {
            run_workload(&handle, policy, |n| {
                tries.fetch_add(1, Ordering::SeqCst);
                let tx = tx.clone();
                async move {
                    if n == 1 {
                        bail!("helm: timed out waiting for the condition");
                    }
                    for event in install_events(None) {
                        tx.send(event).await?;
                    }
                    Ok(())
                }
            })
            .await
        })
        .cleanup(Task::new("uninstall demo app", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .run(rx)
        .await;

    assert!(outcome.passed(), "{outcome}");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(uninstalled.load(Ordering::SeqCst));

    let report = outcome.checker().unwrap();
    assert_eq!(report.matched_count(), BOUTIQUE.len());
    // kube-system noise is out of scope; static-pod execs count but never match.
    assert_eq!(report.events_seen(), (BOUTIQUE.len() + 3) as u64);
}

#[tokio::test(start_paused = true)]
async fn missing_service_times_out_naming_it() {
    let ctx = TestContext::new(RunDefaults {
        namespaces: vec![NAMESPACE.to_string()],
        limits: RunDefaults::default()
            .limits
            .with_time_limit(Duration::from_secs(60)),
        ..RunDefaults::default()
    });
    let checker = ctx.checker("labels", labels_expectations());
    let (tx, rx) = mpsc::channel(64);
    let producer = tx.clone();

    let outcome = ctx
        .parallel(checker)
        .collaborator("install demo app", move |handle| async move {
            run_workload(&handle, RetryPolicy::default(), |_| {
                let tx = producer.clone();
                async move {
                    for event in install_events(Some("loadgenerator")) {
                        tx.send(event).await?;
                    }
                    Ok(())
                }
            })
            .await
        })
        .run(rx)
        .await;
    drop(tx);

    assert!(!outcome.passed());
    let report = outcome.checker().unwrap();
    assert_eq!(report.verdict(), &RunVerdict::Timeout);
    assert_eq!(
        report.unmatched(),
        [r#"process_exec process="loadgenerator" app=exact("loadgenerator") pod-template-hash=regex("[a-f0-9]+")"#.to_string()]
    );
    assert!(outcome.collaborators()[0].passed());
    assert_eq!(outcome.failures().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn install_that_never_succeeds_fails_the_test() {
    let ctx = context();
    let checker = ctx.checker("labels", labels_expectations());
    let (tx, rx) = mpsc::channel::<ObservedEvent>(4);

    let policy = ctx.retry_policy();
    let outcome = ctx
        .parallel(checker)
        .collaborator("install demo app", move |handle| async move {
            run_workload(&handle, policy, |n| async move { bail!("chart rejected ({n})") }).await
        })
        .cleanup(Task::new("uninstall demo app", async { Ok(()) }))
        .run(rx)
        .await;
    drop(tx);

    let failures = outcome.failures();
    assert_eq!(failures.len(), 2, "{failures:?}");
    assert!(failures[0].starts_with("checker 'labels': timeout"));
    assert_eq!(
        failures[1],
        "collaborator 'install demo app' failed: workload failed after 3 tries: chart rejected (3)"
    );
    assert!(outcome.cleanup()[0].passed());
}
