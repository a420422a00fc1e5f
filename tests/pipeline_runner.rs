// tests/pipeline_runner.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use rundag::dag::{RunGraph, StepOutcome, StepSpec};
use rundag::engine::{PipelineRunner, RunPhase, RunStatus};
use rundag::errors::RundagError;
use rundag::exec::{ExecFuture, ExecOutput, StepExecutor};
use rundag::sink::StepStatus;
use rundag::types::DependencyPolicy;
use rundag_test_utils::fake_executor::ScriptedExecutor;
use rundag_test_utils::recording_sink::RecordingSink;
use rundag_test_utils::{init_tracing, reference_pipeline, step, with_timeout};

const RETRY_DELAY: Duration = Duration::from_millis(10);

fn runner(
    specs: Vec<StepSpec>,
    policy: DependencyPolicy,
    executor: Arc<ScriptedExecutor>,
    sink: Arc<RecordingSink>,
) -> PipelineRunner {
    PipelineRunner::new(RunGraph::new(specs).unwrap(), policy, executor, sink)
}

#[tokio::test]
async fn failing_branch_step_does_not_stop_other_branches() {
    init_tracing();

    let executor = ScriptedExecutor::new()
        .default_delay(Duration::from_millis(5))
        .always_fail("Node_1_Security")
        .build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        reference_pipeline(RETRY_DELAY),
        DependencyPolicy::Resolved,
        executor.clone(),
        sink.clone(),
    );

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(pipeline.phase(), RunPhase::Done);
    assert_eq!(report.total, 7);
    assert_eq!(report.succeeded, 6);
    assert_eq!(report.failed, 1);
    assert_eq!(report.exit_code(), 1);

    let security = report.result_of("Node_1_Security").unwrap();
    assert_eq!(security.outcome, StepOutcome::Failed);
    assert_eq!(security.attempts, 3);
    assert_eq!(executor.attempts("Node_1_Security"), 3);

    // Under the default policy the dependent still runs once its dependency resolved.
    let health = report.result_of("Node_1_Health").unwrap();
    assert!(health.is_success());
    assert!(
        executor.first_start("Node_1_Health").unwrap()
            >= executor.last_finish("Node_1_Security").unwrap()
    );

    let final_report = report.report.as_ref().unwrap();
    assert!(final_report.is_success());
    assert_eq!(executor.attempts("Final_Report"), 1);
    assert_eq!(
        executor.invoked_steps().last().map(String::as_str),
        Some("Final_Report")
    );

    assert!(report.to_string().contains("success 6 / failed 1"));
    assert!(sink.aborts().is_empty());
}

#[tokio::test]
async fn critical_step_failure_aborts_the_run() {
    init_tracing();

    let executor = ScriptedExecutor::new().always_fail("Setup").build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        reference_pipeline(RETRY_DELAY),
        DependencyPolicy::Resolved,
        executor.clone(),
        sink.clone(),
    );

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert!(report.is_aborted());
    assert_eq!(pipeline.phase(), RunPhase::Aborted);
    assert_eq!(
        report.status,
        RunStatus::Aborted {
            step: "Setup".to_string(),
            reason: "Setup failed on attempt 3".to_string(),
        }
    );
    assert_eq!(report.total, 0);
    assert!(report.branches.is_empty());
    assert!(report.report.is_none());
    assert_eq!(report.exit_code(), 2);

    assert_eq!(executor.invoked_steps(), vec!["Setup".to_string()]);
    assert_eq!(executor.attempts("Setup"), 3);

    assert_eq!(
        sink.aborts(),
        vec![("Setup".to_string(), "Setup failed on attempt 3".to_string())]
    );
    assert_eq!(sink.statuses_of("Node_2_Config"), vec![StepStatus::Pending]);
    assert_eq!(sink.statuses_of("Final_Report"), vec![StepStatus::Pending]);
}

#[tokio::test]
async fn succeeded_policy_skips_dependents_of_failed_steps() {
    init_tracing();

    let executor = ScriptedExecutor::new()
        .always_fail("Node_1_Security")
        .build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        reference_pipeline(RETRY_DELAY),
        DependencyPolicy::Succeeded,
        executor.clone(),
        sink.clone(),
    );

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.total, 7);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 2);

    let health = report.result_of("Node_1_Health").unwrap();
    assert_eq!(health.outcome, StepOutcome::Failed);
    assert_eq!(health.attempts, 0);
    assert_eq!(health.message, "skipped: dependency 'Node_1_Security' failed");
    assert_eq!(executor.attempts("Node_1_Health"), 0);
    assert_eq!(
        sink.statuses_of("Node_1_Health"),
        vec![StepStatus::Pending, StepStatus::Failed]
    );

    // The report step still runs exactly once.
    assert!(report.report.as_ref().unwrap().is_success());
    assert_eq!(executor.attempts("Final_Report"), 1);
}

#[tokio::test]
async fn clean_run_reports_every_step() {
    let executor = ScriptedExecutor::new().build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        reference_pipeline(RETRY_DELAY),
        DependencyPolicy::Resolved,
        executor.clone(),
        sink.clone(),
    );

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.succeeded, 7);
    assert_eq!(report.results().count(), 9);
    assert!(report.setup.as_ref().unwrap().is_success());

    // Branch results come back in dependency order.
    let order: Vec<&str> = report.branches.iter().map(|r| r.name.as_str()).collect();
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
    assert!(position("Node_1_Config") < position("Node_1_Security"));
    assert!(position("Node_1_Security") < position("Node_1_Health"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"]["state"], "done");
    assert_eq!(json["succeeded"], 7);
    assert_eq!(json["report"]["outcome"], "success");
}

#[tokio::test]
async fn dependencies_finish_before_dependents_start() {
    init_tracing();

    let executor = ScriptedExecutor::new()
        .default_delay(Duration::from_millis(20))
        .delay("Node_2_Config", Duration::from_millis(60))
        .fail_times("Node_3_Config", 1)
        .build();
    let sink = Arc::new(RecordingSink::new());
    let specs = reference_pipeline(RETRY_DELAY);
    let mut pipeline = runner(
        specs.clone(),
        DependencyPolicy::Resolved,
        executor.clone(),
        sink,
    );

    with_timeout(pipeline.run()).await.unwrap();

    for spec in &specs {
        let started = executor.first_start(&spec.name).unwrap();
        for dep in &spec.after {
            let dep_finished = executor.last_finish(dep).unwrap();
            assert!(
                dep_finished <= started,
                "{} started before its dependency {} finished",
                spec.name,
                dep
            );
        }
    }

    let config_results: Vec<_> = executor
        .invocations()
        .into_iter()
        .filter(|i| i.step == "Node_3_Config")
        .collect();
    assert_eq!(config_results.len(), 2);
}

#[tokio::test]
async fn independent_steps_run_concurrently() {
    init_tracing();

    let executor = ScriptedExecutor::new()
        .default_delay(Duration::from_millis(400))
        .build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        vec![step("left"), step("right")],
        DependencyPolicy::Resolved,
        executor.clone(),
        sink,
    );

    let started = Instant::now();
    let report = with_timeout(pipeline.run()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.succeeded, 2);
    assert!(
        elapsed < Duration::from_millis(750),
        "two 400ms steps took {elapsed:?}; they did not overlap"
    );

    let left = executor.first_start("left").unwrap();
    let right = executor.first_start("right").unwrap();
    assert!(left < executor.last_finish("right").unwrap());
    assert!(right < executor.last_finish("left").unwrap());
}

#[tokio::test]
async fn branch_context_reaches_the_executor() {
    let executor = ScriptedExecutor::new().build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        reference_pipeline(RETRY_DELAY),
        DependencyPolicy::Resolved,
        executor.clone(),
        sink,
    );

    with_timeout(pipeline.run()).await.unwrap();

    for inv in executor.invocations() {
        let expected = inv
            .step
            .strip_prefix("Node_")
            .and_then(|rest| rest.split('_').next())
            .map(str::to_string);
        assert_eq!(inv.context.get("NODE_ID").cloned(), expected, "{}", inv.step);
    }
}

#[tokio::test]
async fn runner_can_only_run_once() {
    let executor = ScriptedExecutor::new().build();
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = runner(
        vec![step("only")],
        DependencyPolicy::Resolved,
        executor.clone(),
        sink,
    );

    with_timeout(pipeline.run()).await.unwrap();
    match pipeline.run().await {
        Err(RundagError::Other(e)) => assert!(e.to_string().contains("only be run once")),
        other => panic!("expected a misuse error, got {other:?}"),
    }
    assert_eq!(executor.attempts("only"), 1);
}

/// Executor whose steps panic instead of returning.
struct PanickingExecutor;

impl StepExecutor for PanickingExecutor {
    fn run<'a>(&'a self, step: &'a StepSpec) -> ExecFuture<'a> {
        Box::pin(async move {
            if !step.name.is_empty() {
                panic!("{} blew up", step.name);
            }
            Ok(ExecOutput::success(""))
        })
    }
}

#[tokio::test]
async fn panicking_step_task_becomes_a_failed_result() {
    let sink = Arc::new(RecordingSink::new());
    let mut pipeline = PipelineRunner::new(
        RunGraph::new(vec![step("a"), step("b").after("a")]).unwrap(),
        DependencyPolicy::Resolved,
        Arc::new(PanickingExecutor),
        sink.clone(),
    );

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.failed, 2);
    let a = report.result_of("a").unwrap();
    assert!(a.message.starts_with("step task crashed"), "{}", a.message);
    assert_eq!(sink.statuses_of("b").last(), Some(&StepStatus::Failed));
}
