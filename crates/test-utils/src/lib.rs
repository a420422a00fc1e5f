pub mod builders;
pub mod fake_executor;
pub mod recording_sink;

use std::sync::Once;
use std::time::Duration;

use rundag::dag::StepSpec;
use rundag::exec::RetryPolicy;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A step with no retries, for tests that don't care about retry timing.
pub fn step(name: &str) -> StepSpec {
    StepSpec::new(name, format!("echo {name}")).with_retry(RetryPolicy::no_retry())
}

/// The reference infrastructure pipeline:
///
/// ```text
/// Setup (critical)
///   -> Node_1: Config -> Security -> Health
///   -> Node_2: Config -> Health
///   -> Node_3: Config -> Health
/// Final_Report (report step, after every Health)
/// ```
///
/// Every step retries twice with `retry_delay` between attempts.
pub fn reference_pipeline(retry_delay: Duration) -> Vec<StepSpec> {
    let retry = RetryPolicy::new(3, retry_delay);
    let mut specs = vec![StepSpec::new("Setup", "setup").critical(true).with_retry(retry)];
    let mut report = StepSpec::new("Final_Report", "report")
        .report(true)
        .with_retry(retry);

    for node in 1..=3 {
        let config = format!("Node_{node}_Config");
        let health = format!("Node_{node}_Health");
        specs.push(
            StepSpec::new(&config, "config")
                .after("Setup")
                .branch(node.to_string())
                .with_retry(retry),
        );

        let health_dep = if node == 1 {
            let security = format!("Node_{node}_Security");
            specs.push(
                StepSpec::new(&security, "security")
                    .after(&config)
                    .branch(node.to_string())
                    .with_retry(retry),
            );
            security
        } else {
            config
        };

        specs.push(
            StepSpec::new(&health, "health")
                .after(health_dep)
                .branch(node.to_string())
                .with_retry(retry),
        );
        report = report.after(health);
    }

    specs.push(report);
    specs
}
