//! Fork/join behavior of checker, collaborators and cleanup.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use evcheck_engine::RunVerdict;
use evcheck_runner::{RetryPolicy, Task, TestContext, run_workload};
use evcheck_types::ObservedEvent;
use tokio::sync::mpsc;

use crate::common::{adservice_and_redis, checker, exec};

#[tokio::test(start_paused = true)]
async fn retries_keep_a_short_deadline_alive() {
    // Each failed attempt takes 6s against a 10s limit; without the
    // deadline refresh the checker would time out before the third try.
    let checker = checker("reset", adservice_and_redis(), 5000, Duration::from_secs(10));
    let (tx, rx) = mpsc::channel(4);

    let outcome = TestContext::default()
        .parallel(checker)
        .collaborator("slow install", move |handle| async move {
            run_workload(&handle, RetryPolicy::default(), |n| {
                let tx = tx.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(6)).await;
                    if n < 3 {
                        bail!("attempt {n} failed");
                    }
                    tx.send(exec("adservice", "adservice")).await?;
                    tx.send(exec("redis", "redis-cart")).await?;
                    Ok(())
                }
            })
            .await
        })
        .run(rx)
        .await;

    assert!(outcome.passed(), "{outcome}");
    let report = outcome.checker().unwrap();
    assert!(report.elapsed() >= Duration::from_secs(18));
}

#[tokio::test(start_paused = true)]
async fn collaborators_run_concurrently_with_each_other() {
    let (tx, rx) = mpsc::channel(4);
    let adservice_tx = tx.clone();
    let redis_tx = tx;

    let outcome = TestContext::default()
        .parallel(checker("fanout", adservice_and_redis(), 5000, Duration::from_secs(60)))
        .collaborator("adservice", move |handle| async move {
            if !handle.wait(Duration::from_secs(1)).await {
                bail!("checker not ready");
            }
            adservice_tx.send(exec("adservice", "adservice")).await?;
            Ok(())
        })
        .collaborator("redis", move |handle| async move {
            if !handle.wait(Duration::from_secs(1)).await {
                bail!("checker not ready");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
            redis_tx.send(exec("redis", "redis-cart")).await?;
            Ok(())
        })
        .run(rx)
        .await;

    assert!(outcome.passed(), "{outcome}");
    assert_eq!(outcome.collaborators().len(), 2);
    assert!(outcome.collaborators().iter().all(|c| c.passed()));
}

#[tokio::test(start_paused = true)]
async fn panicking_collaborator_is_a_failure_not_a_crash() {
    let (tx, rx) = mpsc::channel::<ObservedEvent>(4);
    let outcome = TestContext::default()
        .parallel(checker("panic", adservice_and_redis(), 5000, Duration::from_secs(5)))
        .collaborator("exploding", |_handle| async {
            let exploded = true;
            assert!(!exploded, "workload exploded");
            Ok(())
        })
        .run(rx)
        .await;
    drop(tx);

    assert!(!outcome.passed());
    assert_eq!(outcome.checker().unwrap().verdict(), &RunVerdict::Timeout);
    let error = outcome.collaborators()[0].error().unwrap();
    assert!(error.starts_with("task panicked"), "{error}");
}

#[tokio::test(start_paused = true)]
async fn cleanup_starts_only_after_checker_and_collaborators() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel(4);

    let workload_log = Arc::clone(&log);
    let first_log = Arc::clone(&log);
    let second_log = Arc::clone(&log);
    let outcome = TestContext::default()
        .parallel(checker("ordering", adservice_and_redis(), 5000, Duration::from_secs(60)))
        .collaborator("workload", move |handle| async move {
            if !handle.wait(Duration::from_secs(1)).await {
                bail!("checker not ready");
            }
            tx.send(exec("adservice", "adservice")).await?;
            tx.send(exec("redis", "redis-cart")).await?;
            tokio::time::sleep(Duration::from_secs(3)).await;
            workload_log.lock().unwrap().push("workload");
            Ok(())
        })
        .cleanup(Task::new("first", async move {
            first_log.lock().unwrap().push("cleanup 1");
            Ok(())
        }))
        .cleanup(Task::new("second", async move {
            second_log.lock().unwrap().push("cleanup 2");
            Ok(())
        }))
        .run(rx)
        .await;

    assert!(outcome.passed(), "{outcome}");
    assert_eq!(*log.lock().unwrap(), ["workload", "cleanup 1", "cleanup 2"]);
}
