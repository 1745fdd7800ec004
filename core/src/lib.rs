pub mod builtin;
pub mod capture;
pub mod config;
pub mod driver;
pub mod error;
pub mod locale;
pub mod oracle;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod scenario;
pub mod validation;

pub use builtin::builtin_scenarios;
pub use capture::EvidenceCapture;
pub use config::{ConfigError, HarnessConfig, DEFAULT_BASE_URL};
pub use driver::chromium::ChromiumSessionFactory;
pub use driver::{Driver, ElementHandle, SessionFactory};
pub use error::{CaptureError, StepError};
pub use locale::{Locale, TextDirection};
pub use oracle::Oracle;
pub use report::{ReportError, RunReport};
pub use runner::Runner;
pub use runtime::{
    ExecutionStatus, Executor, Failure, Outcome, ScenarioState, StepExecution,
};
pub use scenario::{
    parse_scenarios, ParseError, Scenario, ScenarioSummary, Selector, Step, StepKind,
};
pub use validation::{validate_scenarios, Diagnostic, DiagnosticLevel};
