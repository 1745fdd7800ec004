use glyphcheck_core::driver::fake::{FakePage, FakeSessionFactory, Interaction};
use glyphcheck_core::{
    builtin_scenarios, parse_scenarios, validate_scenarios, Executor, Oracle, Runner, Scenario,
    ScenarioState, Step, StepError,
};
use std::path::Path;
use std::time::Duration;

const BASE: &str = "http://localhost:5173";

fn executor() -> Executor {
    Executor::new(
        Oracle::new(Duration::from_secs(5), Duration::from_millis(100))
            .with_absence_hold(Duration::from_millis(500)),
    )
}

fn redirect_screenshots(scenarios: &mut [Scenario], dir: &Path) {
    for scenario in scenarios {
        for step in &mut scenario.steps {
            if let Step::Screenshot { path } = step {
                if let Some(name) = path.file_name() {
                    *path = dir.join(name);
                }
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_file_runs_against_calculator() {
    let source = r#"
# Arabic month for a first-year payment
scenario month_from_file {
    navigate ${base_url}
    select label "Language for Written Amounts" ar
    check label "Split First Year Payments?"
    click role button "+ Add Payment"
    expect ${month:ar:1}
}

scenario marker_from_file {
    navigate /
    select label "Language for Written Amounts" ar
    click role button "Calculate (Generate Plan)"
    expect ${marker:ar}
}
"#;
    let scenarios = parse_scenarios(source, BASE).expect("parse");
    assert!(validate_scenarios(&scenarios).is_empty());

    let factory = FakeSessionFactory::new(|| FakePage::calculator(Duration::from_millis(800)));
    let report = Runner::new(factory, executor()).run(&scenarios).await;

    assert!(report.all_passed(), "{report}");
}

#[tokio::test(start_paused = true)]
async fn missing_translation_fails_only_its_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scenarios = builtin_scenarios(BASE);
    redirect_screenshots(&mut scenarios, dir.path());

    let factory = FakeSessionFactory::new(|| {
        FakePage::calculator(Duration::ZERO).on(|interaction, dom| {
            if matches!(interaction, Interaction::Clicked { name } if name == "+ Add Payment") {
                dom.clear("يناير");
            }
        })
    });
    let report = Runner::new(factory, executor()).with_concurrency(2).run(&scenarios).await;

    assert_eq!(report.failed_count(), 1);
    let month = &report.outcomes[0];
    assert_eq!(month.scenario, "arabic_month_translation");
    assert_eq!(month.status, ScenarioState::Failed);
    let failure = month.failure.as_ref().expect("failure");
    assert_eq!(failure.step_index, Some(4));
    assert_eq!(
        failure.error,
        StepError::AssertionFailure {
            expected: "يناير".to_string(),
            elapsed: Duration::from_secs(5),
        }
    );
    // The screenshot step comes after the failed assertion and never runs.
    assert!(month.artifacts.is_empty());
    assert!(!dir.path().join("arabic_month_verification.png").exists());

    assert!(report.outcomes[1..].iter().all(|o| o.passed()));
    assert!(dir.path().join("arabic_number_verification.png").exists());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn arabic_leaking_into_english_trips_regression_guard() {
    let scenarios: Vec<_> = builtin_scenarios(BASE)
        .into_iter()
        .filter(|s| s.name == "english_amount_regression")
        .collect();

    let factory = FakeSessionFactory::new(|| {
        FakePage::calculator(Duration::ZERO).on(|interaction, dom| {
            let calculate = "Calculate (Generate Plan)";
            if matches!(interaction, Interaction::Clicked { name } if name == calculate) {
                dom.render("فقط مائة ألف جنيه مصري لا غير", Duration::from_millis(200));
            }
        })
    });
    let report = Runner::new(factory, executor()).run(&scenarios).await;

    let failure = report.outcomes[0].failure.as_ref().expect("failure");
    assert!(matches!(
        failure.error,
        StepError::UnexpectedGlyph { ref text, .. } if text == "فقط"
    ));
    let junit = report.to_junit().expect("junit");
    assert!(junit.contains(r#"type="unexpected_glyph""#));
}
