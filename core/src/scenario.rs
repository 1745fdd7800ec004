use crate::locale;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    Label { text: String },
    Role { role: String, name: String },
    Text { text: String },
}

impl Selector {
    pub fn label(text: impl Into<String>) -> Self {
        Selector::Label { text: text.into() }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Selector::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text { text: text.into() }
    }

    pub fn needle(&self) -> &str {
        match self {
            Selector::Label { text } | Selector::Text { text } => text,
            Selector::Role { name, .. } => name,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Label { text } => write!(f, "label {text:?}"),
            Selector::Role { role, name } => write!(f, "role {role} {name:?}"),
            Selector::Text { text } => write!(f, "text {text:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Navigate { url: String },
    SelectOption { selector: Selector, value: String },
    Check { selector: Selector },
    Click { selector: Selector },
    AssertVisible { text: String },
    AssertAbsent { text: String },
    Screenshot { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepKind {
    Navigate,
    SelectOption,
    Check,
    Click,
    AssertVisible,
    AssertAbsent,
    Screenshot,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Navigate { .. } => StepKind::Navigate,
            Step::SelectOption { .. } => StepKind::SelectOption,
            Step::Check { .. } => StepKind::Check,
            Step::Click { .. } => StepKind::Click,
            Step::AssertVisible { .. } => StepKind::AssertVisible,
            Step::AssertAbsent { .. } => StepKind::AssertAbsent,
            Step::Screenshot { .. } => StepKind::Screenshot,
        }
    }

    pub fn selector(&self) -> Option<&Selector> {
        match self {
            Step::SelectOption { selector, .. }
            | Step::Check { selector }
            | Step::Click { selector } => Some(selector),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate { url } => write!(f, "navigate {url}"),
            Step::SelectOption { selector, value } => {
                write!(f, "select {value:?} in {selector}")
            }
            Step::Check { selector } => write!(f, "check {selector}"),
            Step::Click { selector } => write!(f, "click {selector}"),
            Step::AssertVisible { text } => write!(f, "expect visible {text:?}"),
            Step::AssertAbsent { text } => write!(f, "expect absent {text:?}"),
            Step::Screenshot { path } => write!(f, "screenshot {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn navigate(mut self, url: impl Into<String>) -> Self {
        self.steps.push(Step::Navigate { url: url.into() });
        self
    }

    pub fn select_option(mut self, selector: Selector, value: impl Into<String>) -> Self {
        self.steps.push(Step::SelectOption {
            selector,
            value: value.into(),
        });
        self
    }

    pub fn check(mut self, selector: Selector) -> Self {
        self.steps.push(Step::Check { selector });
        self
    }

    pub fn click(mut self, selector: Selector) -> Self {
        self.steps.push(Step::Click { selector });
        self
    }

    pub fn expect_visible(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::AssertVisible { text: text.into() });
        self
    }

    pub fn expect_absent(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::AssertAbsent { text: text.into() });
        self
    }

    pub fn screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.steps.push(Step::Screenshot { path: path.into() });
        self
    }

    pub fn summary(&self) -> ScenarioSummary {
        let count = |pred: fn(&Step) -> bool| self.steps.iter().filter(|s| pred(s)).count();
        ScenarioSummary {
            name: self.name.clone(),
            total_steps: self.steps.len(),
            interactions: count(|s| s.selector().is_some()),
            assertions: count(|s| {
                matches!(s, Step::AssertVisible { .. } | Step::AssertAbsent { .. })
            }),
            screenshots: self
                .steps
                .iter()
                .filter_map(|step| match step {
                    Step::Screenshot { path } => Some(path.clone()),
                    _ => None,
                })
                .collect(),
            steps: self.steps.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub total_steps: usize,
    pub interactions: usize,
    pub assertions: usize,
    pub screenshots: Vec<PathBuf>,
    pub steps: Vec<String>,
}

impl fmt::Display for ScenarioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} step(s), {} interaction(s), {} assertion(s)",
            self.name, self.total_steps, self.interactions, self.assertions
        )?;
        for (idx, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {:>2}. {}", idx + 1, step)?;
        }
        if !self.screenshots.is_empty() {
            writeln!(f, "  Screenshots:")?;
            for path in &self.screenshots {
                writeln!(f, "    - {}", path.display())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),
    #[error("line {line}: invalid directive: {text}")]
    InvalidDirective { line: usize, text: String },
    #[error("line {line}: invalid syntax: {text}")]
    InvalidSyntax { line: usize, text: String },
    #[error("line {line}: missing required value: {what}")]
    MissingValue { line: usize, what: &'static str },
    #[error("line {line}: unknown placeholder ${{{placeholder}}}")]
    UnknownPlaceholder { line: usize, placeholder: String },
    #[error("line {line}: {message}")]
    Tokenize { line: usize, message: String },
}

/// Parses every `scenario <name> { ... }` block in `source`.
///
/// `${base_url}` is replaced by `base_url`, and navigation targets starting
/// with `/` are joined onto it. Glyph placeholders (`${month:ar:1}`,
/// `${marker:ar}`) resolve against the locale table.
pub fn parse_scenarios(source: &str, base_url: &str) -> Result<Vec<Scenario>, ParseError> {
    let mut lines = source.lines().enumerate().peekable();
    let mut scenarios = Vec::new();

    while let Some((idx, raw_line)) = next_non_empty(&mut lines) {
        let trimmed = raw_line.trim();
        if trimmed.starts_with("scenario ") {
            let scenario = parse_scenario_block(idx + 1, trimmed, &mut lines, base_url)?;
            scenarios.push(scenario);
        } else {
            return Err(ParseError::InvalidDirective {
                line: idx + 1,
                text: trimmed.to_string(),
            });
        }
    }

    Ok(scenarios)
}

fn parse_scenario_block<'a, I>(
    line_no: usize,
    first_line: &str,
    lines: &mut std::iter::Peekable<I>,
    base_url: &str,
) -> Result<Scenario, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let header = first_line
        .strip_suffix('{')
        .ok_or_else(|| ParseError::InvalidSyntax {
            line: line_no,
            text: first_line.to_string(),
        })?;
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 2 || tokens[0] != "scenario" || !is_identifier(tokens[1]) {
        return Err(ParseError::InvalidSyntax {
            line: line_no,
            text: first_line.to_string(),
        });
    }

    let mut scenario = Scenario::new(tokens[1]);
    loop {
        let (idx, raw_line) =
            next_non_empty(lines).ok_or(ParseError::UnexpectedEof("scenario block"))?;
        let trimmed = raw_line.trim();
        if trimmed == "}" {
            break;
        }
        scenario.steps.push(parse_step(idx + 1, trimmed, base_url)?);
    }

    Ok(scenario)
}

fn parse_step(line: usize, text: &str, base_url: &str) -> Result<Step, ParseError> {
    let tokens = shell_words::split(text).map_err(|err| ParseError::Tokenize {
        line,
        message: err.to_string(),
    })?;
    let (directive, args) = tokens.split_first().ok_or(ParseError::MissingValue {
        line,
        what: "step directive",
    })?;
    let invalid = || ParseError::InvalidSyntax {
        line,
        text: text.to_string(),
    };

    match directive.as_str() {
        "navigate" => {
            let [target] = args else {
                return Err(invalid());
            };
            let url = resolve_url(&expand_placeholders(line, target, base_url)?, base_url);
            if url.is_empty() {
                return Err(ParseError::MissingValue {
                    line,
                    what: "navigation url",
                });
            }
            Ok(Step::Navigate { url })
        }
        "select" => {
            let (selector, rest) = parse_selector(line, args, base_url).ok_or_else(invalid)??;
            let [value] = rest else {
                return Err(ParseError::MissingValue {
                    line,
                    what: "option value",
                });
            };
            Ok(Step::SelectOption {
                selector,
                value: expand_placeholders(line, value, base_url)?,
            })
        }
        "check" | "click" => {
            let (selector, rest) = parse_selector(line, args, base_url).ok_or_else(invalid)??;
            if !rest.is_empty() {
                return Err(invalid());
            }
            if directive == "check" {
                Ok(Step::Check { selector })
            } else {
                Ok(Step::Click { selector })
            }
        }
        "expect" | "expect_absent" => {
            let [glyph] = args else {
                return Err(ParseError::MissingValue {
                    line,
                    what: "expected text",
                });
            };
            let text = expand_placeholders(line, glyph, base_url)?;
            if directive == "expect" {
                Ok(Step::AssertVisible { text })
            } else {
                Ok(Step::AssertAbsent { text })
            }
        }
        "screenshot" => {
            let [path] = args else {
                return Err(ParseError::MissingValue {
                    line,
                    what: "screenshot path",
                });
            };
            Ok(Step::Screenshot {
                path: PathBuf::from(path),
            })
        }
        _ => Err(ParseError::InvalidDirective {
            line,
            text: text.to_string(),
        }),
    }
}

fn parse_selector<'t>(
    line: usize,
    args: &'t [String],
    base_url: &str,
) -> Option<Result<(Selector, &'t [String]), ParseError>> {
    let (by, rest) = args.split_first()?;
    let parsed = match (by.as_str(), rest) {
        ("label", [text, rest @ ..]) => {
            expand_placeholders(line, text, base_url).map(|text| (Selector::label(text), rest))
        }
        ("text", [text, rest @ ..]) => {
            expand_placeholders(line, text, base_url).map(|text| (Selector::text(text), rest))
        }
        ("role", [role, name, rest @ ..]) => expand_placeholders(line, name, base_url)
            .map(|name| (Selector::role(role.as_str(), name), rest)),
        _ => return None,
    };
    Some(parsed)
}

fn expand_placeholders(line: usize, input: &str, base_url: &str) -> Result<String, ParseError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ParseError::InvalidSyntax {
            line,
            text: input.to_string(),
        })?;
        let key = &after[..end];
        let value = resolve_placeholder(key, base_url).ok_or_else(|| {
            ParseError::UnknownPlaceholder {
                line,
                placeholder: key.to_string(),
            }
        })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn resolve_placeholder(key: &str, base_url: &str) -> Option<String> {
    let parts: Vec<&str> = key.split(':').collect();
    match parts.as_slice() {
        ["base_url"] => Some(base_url.to_string()),
        ["month", code, index] => {
            let index: u8 = index.parse().ok()?;
            locale::lookup(code)?.month(index).map(str::to_string)
        }
        ["marker", code] => locale::lookup(code)?.amount_marker.map(str::to_string),
        _ => None,
    }
}

fn resolve_url(target: &str, base_url: &str) -> String {
    if target.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), target)
    } else {
        target.trim().to_string()
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn next_non_empty<'a, I>(lines: &mut std::iter::Peekable<I>) -> Option<(usize, &'a str)>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    for (idx, line) in lines.by_ref() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        return Some((idx, line));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:5173";

    #[test]
    fn parses_block_with_every_directive() {
        let source = r#"
# month rendering
scenario arabic_month {
  navigate "${base_url}"
  select label "Language for Written Amounts" ar
  check label "Split First Year Payments?"
  click role button "+ Add Payment"
  expect "${month:ar:1}"
  expect_absent January
  screenshot /tmp/month.png
}
"#;
        let scenarios = parse_scenarios(source, BASE).expect("parse");
        assert_eq!(scenarios.len(), 1);
        let scenario = &scenarios[0];
        assert_eq!(scenario.name, "arabic_month");
        assert_eq!(
            scenario.steps,
            vec![
                Step::Navigate {
                    url: BASE.to_string()
                },
                Step::SelectOption {
                    selector: Selector::label("Language for Written Amounts"),
                    value: "ar".to_string(),
                },
                Step::Check {
                    selector: Selector::label("Split First Year Payments?"),
                },
                Step::Click {
                    selector: Selector::role("button", "+ Add Payment"),
                },
                Step::AssertVisible {
                    text: "يناير".to_string()
                },
                Step::AssertAbsent {
                    text: "January".to_string()
                },
                Step::Screenshot {
                    path: PathBuf::from("/tmp/month.png")
                },
            ]
        );
    }

    #[test]
    fn relative_navigation_is_joined_to_base_url() {
        let source = "scenario s {\n navigate /plans\n}\n";
        let scenarios = parse_scenarios(source, "http://host:1/").expect("parse");
        assert_eq!(
            scenarios[0].steps[0],
            Step::Navigate {
                url: "http://host:1/plans".to_string()
            }
        );
    }

    #[test]
    fn marker_placeholder_resolves_for_arabic_only() {
        let ok = parse_scenarios("scenario s {\n expect ${marker:ar}\n}", BASE).expect("parse");
        assert_eq!(
            ok[0].steps[0],
            Step::AssertVisible {
                text: "فقط".to_string()
            }
        );

        let err = parse_scenarios("scenario s {\n expect ${marker:en}\n}", BASE).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownPlaceholder {
                line: 2,
                placeholder: "marker:en".to_string()
            }
        );
    }

    #[test]
    fn reports_line_of_unknown_directive() {
        let source = "scenario s {\n  navigate /\n  hover label x\n}";
        let err = parse_scenarios(source, BASE).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDirective { line: 3, .. }));
    }

    #[test]
    fn select_without_value_is_rejected() {
        let source = "scenario s {\n  select label \"Language for Written Amounts\"\n}";
        let err = parse_scenarios(source, BASE).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingValue {
                line: 2,
                what: "option value"
            }
        );
    }

    #[test]
    fn unterminated_block_is_eof() {
        let err = parse_scenarios("scenario s {\n navigate /\n", BASE).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof("scenario block"));
    }

    #[test]
    fn unbalanced_quote_is_a_tokenize_error() {
        let err = parse_scenarios("scenario s {\n click text \"Calculate\n}", BASE).unwrap_err();
        assert!(matches!(err, ParseError::Tokenize { line: 2, .. }));
    }

    #[test]
    fn summary_counts_interactions_and_assertions() {
        let scenario = Scenario::new("s")
            .navigate(BASE)
            .click(Selector::role("button", "Calculate (Generate Plan)"))
            .expect_visible("فقط")
            .screenshot("plan.png");
        let summary = scenario.summary();
        assert_eq!(summary.total_steps, 4);
        assert_eq!(summary.interactions, 1);
        assert_eq!(summary.assertions, 1);
        assert_eq!(summary.screenshots, vec![PathBuf::from("plan.png")]);
        assert!(summary.to_string().contains("click role button"));
    }
}
