//! Non-fatal configuration warnings
//!
//! Settings that load and validate but are likely to misbehave at runtime.

use contracts::ProducerBlueprint;

/// Retries above this count are flagged, since they run back to back
const RETRY_WARN_THRESHOLD: u32 = 10;

pub fn warnings(blueprint: &ProducerBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let producer = &blueprint.producer;
    let poll_ms = producer.poll_timeout().as_millis();

    if blueprint.projects.is_empty() {
        warnings.push("No projects configured: every batch will fail with a config error".to_string());
    }

    if producer.retry_times == 0 {
        warnings.push("retry_times is 0: transient write failures are not retried".to_string());
    } else if producer.retry_times > RETRY_WARN_THRESHOLD {
        warnings.push(format!(
            "retry_times ({}) retries run immediately with no backoff",
            producer.retry_times
        ));
    }

    if u128::from(producer.io_worker_idle_timeout_ms) < poll_ms {
        warnings.push(format!(
            "io_worker_idle_timeout_ms ({}) is shorter than the queue poll interval ({poll_ms} ms)",
            producer.io_worker_idle_timeout_ms
        ));
    }

    if producer.package_timeout_ms % 2 == 1 {
        warnings.push(format!(
            "package_timeout_ms ({}) is odd: the queue poll interval rounds down to {poll_ms} ms",
            producer.package_timeout_ms
        ));
    }

    warnings
}
