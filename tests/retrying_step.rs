// tests/retrying_step.rs

use std::sync::Arc;
use std::time::Duration;

use rundag::dag::{StepOutcome, StepSpec};
use rundag::exec::{RetryPolicy, RetryingStep};
use rundag::sink::StepStatus;
use rundag_test_utils::fake_executor::ScriptedExecutor;
use rundag_test_utils::recording_sink::RecordingSink;
use rundag_test_utils::{init_tracing, with_timeout};

fn spec(name: &str, retries: u32) -> StepSpec {
    StepSpec::new(name, "ignored").with_retry(RetryPolicy::new(retries + 1, Duration::from_millis(10)))
}

#[tokio::test]
async fn always_failing_step_is_attempted_exactly_three_times() {
    init_tracing();

    let executor = ScriptedExecutor::new().always_fail("flaky").build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink.clone());

    let result = with_timeout(runner.execute(&spec("flaky", 2))).await;

    assert_eq!(result.outcome, StepOutcome::Failed);
    assert_eq!(result.attempts, 3);
    assert_eq!(executor.attempts("flaky"), 3);
    assert_eq!(result.message, "flaky failed on attempt 3");

    assert_eq!(
        sink.statuses_of("flaky"),
        vec![
            StepStatus::Running,
            StepStatus::Running,
            StepStatus::Running,
            StepStatus::Failed
        ]
    );
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    init_tracing();

    let executor = ScriptedExecutor::new().fail_times("flaky", 1).build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink.clone());

    let result = with_timeout(runner.execute(&spec("flaky", 2))).await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(result.message, "flaky ok");
    assert_eq!(
        sink.statuses_of("flaky"),
        vec![StepStatus::Running, StepStatus::Running, StepStatus::Success]
    );
}

#[tokio::test]
async fn success_on_first_attempt_does_not_retry() {
    let executor = ScriptedExecutor::new().build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink.clone());

    let step = spec("steady", 2).branch("4");
    let result = with_timeout(runner.execute(&step)).await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 1);
    assert_eq!(result.branch.as_deref(), Some("4"));
    assert!(result.finished_at >= result.started_at);
    assert_eq!(executor.attempts("steady"), 1);
}

#[tokio::test]
async fn executor_fault_is_retried_and_never_escapes() {
    init_tracing();

    let executor = ScriptedExecutor::new().fault("boom").build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink);

    let result = with_timeout(runner.execute(&spec("boom", 1))).await;

    assert_eq!(result.outcome, StepOutcome::Failed);
    assert_eq!(result.attempts, 2);
    assert!(
        result.message.starts_with("executor error:"),
        "unexpected message: {}",
        result.message
    );
    assert!(result.message.contains("boom exploded"));
}

#[tokio::test]
async fn hanging_attempt_times_out_and_counts_as_failure() {
    init_tracing();

    let executor = ScriptedExecutor::new().hang("stuck").build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink);

    let step = StepSpec::new("stuck", "ignored").with_retry(
        RetryPolicy::new(2, Duration::from_millis(10)).with_timeout(Duration::from_millis(50)),
    );
    let result = with_timeout(runner.execute(&step)).await;

    assert_eq!(result.outcome, StepOutcome::Failed);
    assert_eq!(result.attempts, 2);
    assert!(result.message.contains("timed out"), "{}", result.message);
    assert_eq!(executor.attempts("stuck"), 2);
}

#[tokio::test]
async fn delay_is_applied_between_attempts() {
    let executor = ScriptedExecutor::new().always_fail("slow").build();
    let sink = Arc::new(RecordingSink::new());
    let runner = RetryingStep::new(executor.clone(), sink);

    let step = StepSpec::new("slow", "ignored")
        .with_retry(RetryPolicy::new(3, Duration::from_millis(100)));
    let started = std::time::Instant::now();
    let result = with_timeout(runner.execute(&step)).await;

    assert_eq!(result.attempts, 3);
    assert!(started.elapsed() >= Duration::from_millis(200));

    let invocations = executor.invocations();
    for pair in invocations.windows(2) {
        let gap = pair[1].started - pair[0].finished.unwrap();
        assert!(gap >= Duration::from_millis(100), "gap too short: {gap:?}");
    }
}
