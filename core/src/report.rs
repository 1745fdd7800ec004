use crate::runtime::{ExecutionStatus, Outcome};
use comfy_table::{presets::ASCII_FULL, Table};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write junit xml: {0}")]
    Xml(String),
    #[error("failed to encode json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        Self {
            passed,
            failed: outcomes.len() - passed,
            outcomes,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.passed
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec!["Scenario", "Status", "Steps", "Duration", "Detail"]);
        for outcome in &self.outcomes {
            let completed = outcome
                .steps
                .iter()
                .filter(|s| s.status == ExecutionStatus::Completed)
                .count();
            let detail = match &outcome.failure {
                Some(failure) => failure.error.to_string(),
                None => outcome
                    .artifacts
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            table.add_row(vec![
                outcome.scenario.clone(),
                if outcome.passed() { "passed" } else { "failed" }.to_string(),
                format!("{completed}/{}", outcome.steps.len()),
                format!("{}ms", outcome.duration_ms),
                detail,
            ]);
        }
        table.to_string()
    }

    pub fn to_junit(&self) -> Result<String, ReportError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        write_junit(&mut writer, self).map_err(|err| ReportError::Xml(err.to_string()))?;
        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|err| ReportError::Xml(err.to_string()))
    }
}

fn seconds(duration_ms: u128) -> String {
    format!("{:.3}", duration_ms as f64 / 1000.0)
}

fn write_junit(writer: &mut Writer<Cursor<Vec<u8>>>, report: &RunReport) -> std::io::Result<()> {
    let total_ms: u128 = report.outcomes.iter().map(|o| o.duration_ms).sum();
    let tests = report.outcomes.len().to_string();
    let failures = report.failed.to_string();
    let time = seconds(total_ms);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut suites = BytesStart::new("testsuites");
    suites.push_attribute(("tests", tests.as_str()));
    suites.push_attribute(("failures", failures.as_str()));
    writer.write_event(Event::Start(suites))?;

    let mut suite = BytesStart::new("testsuite");
    suite.push_attribute(("name", "glyphcheck"));
    suite.push_attribute(("tests", tests.as_str()));
    suite.push_attribute(("failures", failures.as_str()));
    suite.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suite))?;

    for outcome in &report.outcomes {
        let case_time = seconds(outcome.duration_ms);
        let mut case = BytesStart::new("testcase");
        case.push_attribute(("name", outcome.scenario.as_str()));
        case.push_attribute(("classname", "glyphcheck"));
        case.push_attribute(("time", case_time.as_str()));
        writer.write_event(Event::Start(case))?;

        if let Some(failure) = &outcome.failure {
            let message = failure.error.to_string();
            let mut element = BytesStart::new("failure");
            element.push_attribute(("message", message.as_str()));
            element.push_attribute(("type", failure.error.kind()));
            writer.write_event(Event::Start(element))?;
            writer.write_event(Event::Text(BytesText::new(&outcome.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }

        if !outcome.artifacts.is_empty() || !outcome.capture_warnings.is_empty() {
            let mut lines: Vec<String> = outcome
                .artifacts
                .iter()
                .map(|p| format!("artifact: {}", p.display()))
                .collect();
            lines.extend(
                outcome
                    .capture_warnings
                    .iter()
                    .map(|w| format!("warning: {w}")),
            );
            writer.write_event(Event::Start(BytesStart::new("system-out")))?;
            writer.write_event(Event::Text(BytesText::new(&lines.join("\n"))))?;
            writer.write_event(Event::End(BytesEnd::new("system-out")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;
    Ok(())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary_table())?;
        for outcome in self.outcomes.iter().filter(|o| !o.passed()) {
            writeln!(f)?;
            write!(f, "{outcome}")?;
        }
        writeln!(f)?;
        write!(
            f,
            "{} passed, {} failed, {} total",
            self.passed,
            self.failed,
            self.outcomes.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::scenario::Scenario;

    fn report() -> RunReport {
        let ok = Scenario::new("ok").navigate("http://localhost:5173");
        let broken = Scenario::new("broken <ar>")
            .navigate("http://localhost:5173")
            .expect_visible("فقط");
        let mut passed = Outcome::session_failed(&ok, StepError::Browser("unused".into()));
        passed.status = crate::runtime::ScenarioState::Passed;
        passed.failure = None;
        let failed = Outcome::session_failed(&broken, StepError::Browser("no chrome".into()));
        RunReport::new(vec![passed, failed])
    }

    #[test]
    fn counts_and_exit_code() {
        let report = report();
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(RunReport::new(Vec::new()).exit_code(), 0);
    }

    #[test]
    fn text_report_lists_every_scenario_and_failure_detail() {
        let text = report().to_string();
        assert!(text.contains("ok"));
        assert!(text.contains("broken <ar>"));
        assert!(text.contains("failed at setup"));
        assert!(text.ends_with("1 passed, 1 failed, 2 total"));
    }

    #[test]
    fn junit_escapes_names_and_marks_failures() {
        let xml = report().to_junit().expect("junit");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<testsuite name="glyphcheck" tests="2" failures="1""#));
        assert!(xml.contains("broken &lt;ar&gt;"));
        assert_eq!(xml.matches("<failure ").count(), 1);
        assert!(xml.contains(r#"type="browser""#));
    }

    #[test]
    fn json_report_round_trips_through_serde_value() {
        let json = report().to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["failed"], 1);
        assert_eq!(value["outcomes"][1]["status"], "failed");
        assert_eq!(value["outcomes"][1]["failure"]["error"]["kind"], "browser");
    }
}
