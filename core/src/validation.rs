use crate::locale;
use crate::scenario::{Scenario, Step};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn error(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            location,
            message: message.into(),
        }
    }

    fn warning(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }
}

pub fn validate_scenarios(scenarios: &[Scenario]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut names = HashSet::new();

    if scenarios.is_empty() {
        diagnostics.push(Diagnostic::error(None, "no scenarios defined"));
    }

    for scenario in scenarios {
        if !names.insert(scenario.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                Some(scenario.name.clone()),
                "duplicate scenario name",
            ));
        }
        validate_scenario(scenario, &mut diagnostics);
    }

    check_screenshot_paths(scenarios, &mut diagnostics);
    diagnostics
}

fn validate_scenario(scenario: &Scenario, diagnostics: &mut Vec<Diagnostic>) {
    let Some(first) = scenario.steps.first() else {
        diagnostics.push(Diagnostic::error(
            Some(scenario.name.clone()),
            "scenario has no steps",
        ));
        return;
    };
    if !matches!(first, Step::Navigate { .. }) {
        diagnostics.push(Diagnostic::warning(
            Some(format!("{}#1", scenario.name)),
            "first step is not a navigation; the session starts on about:blank",
        ));
    }

    for (idx, step) in scenario.steps.iter().enumerate() {
        let location = Some(format!("{}#{}", scenario.name, idx + 1));
        if let Some(selector) = step.selector() {
            if selector.needle().trim().is_empty() {
                diagnostics.push(Diagnostic::error(location.clone(), "selector text is empty"));
            }
        }
        match step {
            Step::Navigate { url } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    diagnostics.push(Diagnostic::error(
                        location,
                        format!("navigation target {url:?} is not an http(s) url"),
                    ));
                }
            }
            Step::SelectOption { value, .. } => {
                if value.trim().is_empty() {
                    diagnostics.push(Diagnostic::error(location, "option value is empty"));
                } else if locale::lookup(value).is_none() {
                    diagnostics.push(Diagnostic::warning(
                        location,
                        format!("option {value:?} is not a known locale"),
                    ));
                }
            }
            Step::AssertVisible { text } | Step::AssertAbsent { text } => {
                if text.trim().is_empty() {
                    diagnostics.push(Diagnostic::error(location, "expected text is empty"));
                }
            }
            Step::Screenshot { path } => {
                if path.as_os_str().is_empty() {
                    diagnostics.push(Diagnostic::error(location, "screenshot path is empty"));
                }
            }
            Step::Check { .. } | Step::Click { .. } => {}
        }
    }
}

fn check_screenshot_paths(scenarios: &[Scenario], diagnostics: &mut Vec<Diagnostic>) {
    let mut absolute = Vec::new();
    let mut relative = Vec::new();
    for scenario in scenarios {
        for step in &scenario.steps {
            if let Step::Screenshot { path } = step {
                if path.is_absolute() {
                    absolute.push(scenario.name.as_str());
                } else {
                    relative.push(scenario.name.as_str());
                }
            }
        }
    }
    if !absolute.is_empty() && !relative.is_empty() {
        diagnostics.push(Diagnostic::warning(
            None,
            format!(
                "screenshot paths mix absolute ({}) and relative ({}) locations",
                absolute.join(", "),
                relative.join(", ")
            ),
        ));
    }
}
