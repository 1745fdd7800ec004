use crate::capture::EvidenceCapture;
use crate::config::HarnessConfig;
use crate::driver::Driver;
use crate::error::{CaptureError, StepError};
use crate::oracle::Oracle;
use crate::scenario::{Scenario, Step, StepKind};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScenarioState::Passed | ScenarioState::Failed)
    }

    pub fn can_transition_to(self, next: ScenarioState) -> bool {
        matches!(
            (self, next),
            (ScenarioState::Pending, ScenarioState::Running)
                | (ScenarioState::Running, ScenarioState::Passed)
                | (ScenarioState::Running, ScenarioState::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Executor {
    oracle: Oracle,
    capture: EvidenceCapture,
}

impl Executor {
    pub fn new(oracle: Oracle) -> Self {
        Self {
            oracle,
            capture: EvidenceCapture,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(Oracle::from_config(config))
    }

    pub async fn execute(&self, scenario: &Scenario, driver: &mut dyn Driver) -> Outcome {
        let span = info_span!("scenario", name = %scenario.name);
        self.execute_steps(scenario, driver).instrument(span).await
    }

    async fn execute_steps(&self, scenario: &Scenario, driver: &mut dyn Driver) -> Outcome {
        let mut run = ScenarioRun::start(scenario);

        for (index, step) in scenario.steps.iter().enumerate() {
            let timer = Instant::now();
            debug!(index, %step, "step started");
            match self.execute_step(step, driver, &mut run).await {
                Ok(message) => {
                    run.record(StepExecution::completed(index, step, message, timer));
                }
                Err(err) => {
                    warn!(index, %step, %err, "step failed");
                    run.record(StepExecution::failed(
                        index,
                        step,
                        Some(err.to_string()),
                        timer,
                    ));
                    return run.fail(index, step, err);
                }
            }
        }

        run.pass()
    }

    async fn execute_step(
        &self,
        step: &Step,
        driver: &mut dyn Driver,
        run: &mut ScenarioRun<'_>,
    ) -> Result<Option<String>, StepError> {
        match step {
            Step::Navigate { url } => {
                driver.navigate(url).await?;
                Ok(None)
            }
            Step::SelectOption { selector, value } => {
                let handle = driver.locate(selector).await?;
                driver.select_option(&handle, value).await?;
                Ok(None)
            }
            Step::Check { selector } => {
                let handle = driver.locate(selector).await?;
                driver.check(&handle).await?;
                Ok(None)
            }
            Step::Click { selector } => {
                let handle = driver.locate(selector).await?;
                driver.click(&handle).await?;
                Ok(None)
            }
            Step::AssertVisible { text } => {
                let elapsed = self.oracle.assert_visible(driver, text).await?;
                Ok(Some(format!("visible after {}ms", elapsed.as_millis())))
            }
            Step::AssertAbsent { text } => {
                let held = self.oracle.assert_absent(driver, text).await?;
                Ok(Some(format!("absent for {}ms", held.as_millis())))
            }
            Step::Screenshot { path } => match self.capture.capture(driver, path).await {
                Ok(written) => {
                    let message = format!("saved {}", written.display());
                    run.artifacts.push(written);
                    Ok(Some(message))
                }
                Err(err) => {
                    let message = format!("capture skipped: {err}");
                    run.warnings.push(err);
                    Ok(Some(message))
                }
            },
        }
    }
}

struct ScenarioRun<'a> {
    scenario: &'a Scenario,
    state: ScenarioState,
    steps: Vec<StepExecution>,
    artifacts: Vec<PathBuf>,
    warnings: Vec<CaptureError>,
    started_at: OffsetDateTime,
    timer: Instant,
}

impl<'a> ScenarioRun<'a> {
    fn start(scenario: &'a Scenario) -> Self {
        let mut run = Self {
            scenario,
            state: ScenarioState::Pending,
            steps: Vec::with_capacity(scenario.steps.len()),
            artifacts: Vec::new(),
            warnings: Vec::new(),
            started_at: OffsetDateTime::now_utc(),
            timer: Instant::now(),
        };
        run.advance(ScenarioState::Running);
        run
    }

    fn advance(&mut self, next: ScenarioState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn record(&mut self, execution: StepExecution) {
        self.steps.push(execution);
    }

    fn fail(mut self, index: usize, step: &Step, error: StepError) -> Outcome {
        for (skipped, rest) in self.scenario.steps.iter().enumerate().skip(index + 1) {
            self.steps.push(StepExecution::skipped(skipped, rest));
        }
        self.advance(ScenarioState::Failed);
        let failure = Failure {
            step_index: Some(index),
            step: step.to_string(),
            expected: error.expected().map(str::to_string),
            actual: error.actual(),
            error,
        };
        self.finish(Some(failure))
    }

    fn pass(mut self) -> Outcome {
        self.advance(ScenarioState::Passed);
        self.finish(None)
    }

    fn finish(self, failure: Option<Failure>) -> Outcome {
        let outcome = Outcome {
            scenario: self.scenario.name.clone(),
            status: self.state,
            failure,
            steps: self.steps,
            artifacts: self.artifacts,
            capture_warnings: self.warnings,
            started_at: format_timestamp(self.started_at),
            duration_ms: self.timer.elapsed().as_millis(),
        };
        info!(
            status = ?outcome.status,
            duration_ms = outcome.duration_ms as u64,
            "scenario finished"
        );
        outcome
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Failure {
    /// `None` when the session could not be opened.
    pub step_index: Option<usize>,
    pub step: String,
    pub expected: Option<String>,
    pub actual: String,
    pub error: StepError,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub scenario: String,
    pub status: ScenarioState,
    pub failure: Option<Failure>,
    pub steps: Vec<StepExecution>,
    pub artifacts: Vec<PathBuf>,
    pub capture_warnings: Vec<CaptureError>,
    pub started_at: String,
    pub duration_ms: u128,
}

impl Outcome {
    pub fn session_failed(scenario: &Scenario, error: StepError) -> Self {
        Self {
            scenario: scenario.name.clone(),
            status: ScenarioState::Failed,
            failure: Some(Failure {
                step_index: None,
                step: "open browser session".to_string(),
                expected: None,
                actual: error.actual(),
                error,
            }),
            steps: scenario
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| StepExecution::skipped(index, step))
                .collect(),
            artifacts: Vec::new(),
            capture_warnings: Vec::new(),
            started_at: format_timestamp(OffsetDateTime::now_utc()),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ScenarioState::Passed
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(f, "[{status}] {} ({}ms)", self.scenario, self.duration_ms)?;
        for step in &self.steps {
            let status = match step.status {
                ExecutionStatus::Completed => "completed",
                ExecutionStatus::Failed => "failed",
                ExecutionStatus::Skipped => "skipped",
            };
            writeln!(
                f,
                "  - [{}] {:>2}. {} ({:?})",
                status,
                step.index + 1,
                step.description,
                step.kind
            )?;
            if let Some(message) = &step.message {
                for line in message.lines() {
                    writeln!(f, "      {}", line)?;
                }
            }
        }
        if let Some(failure) = &self.failure {
            let position = failure
                .step_index
                .map(|idx| format!("step {}", idx + 1))
                .unwrap_or_else(|| "setup".to_string());
            writeln!(f, "  failed at {position}: {}", failure.step)?;
            if let Some(expected) = &failure.expected {
                writeln!(f, "    expected: {expected}")?;
            }
            writeln!(f, "    actual:   {}", failure.actual)?;
        }
        for warning in &self.capture_warnings {
            writeln!(f, "  [warn] {warning}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepExecution {
    pub index: usize,
    pub description: String,
    pub kind: StepKind,
    pub status: ExecutionStatus,
    pub message: Option<String>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Skipped,
}

impl StepExecution {
    fn completed(index: usize, step: &Step, message: Option<String>, timer: Instant) -> Self {
        Self::new(index, step, ExecutionStatus::Completed, message, timer)
    }

    fn failed(index: usize, step: &Step, message: Option<String>, timer: Instant) -> Self {
        Self::new(index, step, ExecutionStatus::Failed, message, timer)
    }

    fn skipped(index: usize, step: &Step) -> Self {
        Self {
            index,
            description: step.to_string(),
            kind: step.kind(),
            status: ExecutionStatus::Skipped,
            message: None,
            duration_ms: 0,
        }
    }

    fn new(
        index: usize,
        step: &Step,
        status: ExecutionStatus,
        message: Option<String>,
        timer: Instant,
    ) -> Self {
        Self {
            index,
            description: step.to_string(),
            kind: step.kind(),
            status,
            message,
            duration_ms: timer.elapsed().as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakePage;
    use crate::scenario::Selector;
    use std::time::Duration;

    fn executor() -> Executor {
        Executor::new(
            Oracle::new(Duration::from_millis(1_000), Duration::from_millis(50))
                .with_absence_hold(Duration::from_millis(200)),
        )
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        use ScenarioState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Passed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Passed));
        assert!(!Passed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(Passed.is_terminal() && Failed.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_remaining_steps() {
        let scenario = Scenario::new("stops")
            .navigate("http://localhost:5173")
            .click(Selector::role("button", "Missing"))
            .click(Selector::role("button", "Calculate (Generate Plan)"))
            .expect_visible("فقط");
        let mut page = FakePage::calculator(Duration::ZERO);
        let journal = page.journal();

        let outcome = executor().execute(&scenario, &mut page).await;

        assert_eq!(outcome.status, ScenarioState::Failed);
        let failure = outcome.failure.as_ref().expect("failure recorded");
        assert_eq!(failure.step_index, Some(1));
        assert!(matches!(failure.error, StepError::ElementNotFound { .. }));
        assert_eq!(
            outcome
                .steps
                .iter()
                .map(|s| s.status)
                .collect::<Vec<_>>(),
            vec![
                ExecutionStatus::Completed,
                ExecutionStatus::Failed,
                ExecutionStatus::Skipped,
                ExecutionStatus::Skipped,
            ]
        );
        assert_eq!(
            journal.actions(),
            vec![
                "navigate http://localhost:5173".to_string(),
                "locate role button \"Missing\"".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_does_not_fail_scenario() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scenario = Scenario::new("evidence")
            .navigate("http://localhost:5173")
            .screenshot(dir.path().join("plan.png"))
            .expect_visible("Calculate (Generate Plan)");
        let mut page = FakePage::calculator(Duration::ZERO).failing_screenshots();

        let outcome = executor().execute(&scenario, &mut page).await;

        assert!(outcome.passed());
        assert!(outcome.artifacts.is_empty());
        assert_eq!(outcome.capture_warnings.len(), 1);
        assert!(outcome.to_string().contains("[warn]"));
    }

    #[tokio::test(start_paused = true)]
    async fn screenshot_before_failure_is_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("before.png");
        let scenario = Scenario::new("evidence_then_fail")
            .navigate("http://localhost:5173")
            .screenshot(&path)
            .expect_visible("يناير");
        let mut page = FakePage::calculator(Duration::ZERO);

        let outcome = executor().execute(&scenario, &mut page).await;

        assert!(!outcome.passed());
        assert_eq!(outcome.artifacts, vec![path.clone()]);
        assert!(path.exists());
        let failure = outcome.failure.expect("failure");
        assert_eq!(failure.expected.as_deref(), Some("يناير"));
        assert_eq!(failure.actual, "not visible after 1000ms");
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout_fails_first_step() {
        let scenario = Scenario::new("unreachable")
            .navigate("http://localhost:5173")
            .expect_visible("فقط");
        let mut page = FakePage::new()
            .never_ready()
            .with_timeouts(Duration::from_secs(3), Duration::from_secs(1));

        let outcome = executor().execute(&scenario, &mut page).await;

        let failure = outcome.failure.expect("failure");
        assert_eq!(failure.step_index, Some(0));
        assert_eq!(
            failure.error,
            StepError::NavigationTimeout {
                url: "http://localhost:5173".to_string(),
                timeout: Duration::from_secs(3),
            }
        );
    }

    #[test]
    fn session_failure_skips_every_step() {
        let scenario = Scenario::new("no_browser")
            .navigate("http://localhost:5173")
            .expect_visible("فقط");
        let outcome =
            Outcome::session_failed(&scenario, StepError::Browser("no chrome".to_string()));
        assert!(!outcome.passed());
        assert_eq!(outcome.failure.as_ref().and_then(|f| f.step_index), None);
        assert!(outcome
            .steps
            .iter()
            .all(|s| s.status == ExecutionStatus::Skipped));
        assert!(outcome.to_string().contains("failed at setup"));
    }
}
