//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use evcheck_engine::{Checker, CheckerLimits};
use evcheck_types::{AttributePattern, ExpectationSet, ExpectedEventPattern, ObservedEvent};
use tokio::sync::mpsc;

/// Namespace the demo app is installed into.
pub const NAMESPACE: &str = "labels";

/// Online boutique services as `(process, app label)`.
pub const BOUTIQUE: [(&str, &str); 12] = [
    ("adservice", "adservice"),
    ("cartservice", "cartservice"),
    ("checkoutservice", "checkoutservice"),
    ("currencyservice", "currencyservice"),
    ("emailservice", "emailservice"),
    ("frontend", "frontend"),
    ("loadgenerator", "loadgenerator"),
    ("paymentservice", "paymentservice"),
    ("productcatalogservice", "productcatalogservice"),
    ("recommendationservice", "recommendationservice"),
    ("redis", "redis-cart"),
    ("shippingservice", "shippingservice"),
];

/// Exec pattern requiring an exact `app` label.
pub fn app_pattern(process: &str, app: &str) -> ExpectedEventPattern {
    ExpectedEventPattern::process_exec(process)
        .unwrap()
        .with_attribute("app", AttributePattern::exact(app))
        .unwrap()
}

/// Exec pattern for a deployment-managed pod: exact `app` label and a hex
/// `pod-template-hash`.
pub fn pod_pattern(process: &str, app: &str) -> ExpectedEventPattern {
    app_pattern(process, app)
        .with_attribute("pod-template-hash", AttributePattern::regex("[a-f0-9]+").unwrap())
        .unwrap()
}

/// Every boutique service started with its pod labels.
pub fn labels_expectations() -> ExpectationSet {
    ExpectationSet::new(BOUTIQUE.iter().map(|(process, app)| pod_pattern(process, app))).unwrap()
}

/// The two-pattern set used by the small scenarios.
pub fn adservice_and_redis() -> ExpectationSet {
    ExpectationSet::new([
        app_pattern("adservice", "adservice"),
        app_pattern("redis", "redis-cart"),
    ])
    .unwrap()
}

pub fn exec(process: &str, app: &str) -> ObservedEvent {
    ObservedEvent::exec(process, [("app", app)])
}

/// An exec from a deployment pod in the test namespace.
pub fn pod_exec(process: &str, app: &str, hash: &str) -> ObservedEvent {
    ObservedEvent::exec(process, [("app", app), ("pod-template-hash", hash)]).in_namespace(NAMESPACE)
}

pub fn checker(name: &str, expectations: ExpectationSet, event_limit: u64, time_limit: Duration) -> Checker {
    Checker::new(
        name,
        expectations,
        CheckerLimits::default()
            .with_event_limit(event_limit)
            .with_time_limit(time_limit),
    )
}

/// A channel already loaded with `events`. The sender is returned so the
/// stream stays open until the caller drops it.
pub async fn preloaded(
    events: impl IntoIterator<Item = ObservedEvent>,
) -> (mpsc::Sender<ObservedEvent>, mpsc::Receiver<ObservedEvent>) {
    let events: Vec<_> = events.into_iter().collect();
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        tx.send(event).await.unwrap();
    }
    (tx, rx)
}
