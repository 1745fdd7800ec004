//! Scenarios run when no scenario file is given.

use crate::locale::{self, Locale};
use crate::scenario::{Scenario, Selector};

pub const LANGUAGE_LABEL: &str = "Language for Written Amounts";
pub const SPLIT_FIRST_YEAR_LABEL: &str = "Split First Year Payments?";
pub const ADD_PAYMENT_BUTTON: &str = "+ Add Payment";
pub const CALCULATE_BUTTON: &str = "Calculate (Generate Plan)";
pub const MONTH_FIELD_LABEL: &str = "Month (1-12)";
pub const WRITTEN_AMOUNT_HEADER: &str = "Written Amount";

// One capture path is absolute and the other relative. Both are kept as
// found; validation reports the mix as a warning.
pub const ARABIC_MONTH_SCREENSHOT: &str = "/tmp/arabic_month_verification.png";
pub const ARABIC_NUMBER_SCREENSHOT: &str = "arabic_number_verification.png";

pub fn builtin_scenarios(base_url: &str) -> Vec<Scenario> {
    vec![
        arabic_month_translation(base_url),
        arabic_number_conversion(base_url),
        english_month_regression(base_url),
        english_amount_regression(base_url),
    ]
}

fn first_year_payment(name: &str, base_url: &str, locale: &Locale) -> Scenario {
    Scenario::new(name)
        .navigate(base_url)
        .select_option(Selector::label(LANGUAGE_LABEL), locale.code)
        .check(Selector::label(SPLIT_FIRST_YEAR_LABEL))
        .click(Selector::role("button", ADD_PAYMENT_BUTTON))
}

fn generated_plan(name: &str, base_url: &str, locale: &Locale) -> Scenario {
    Scenario::new(name)
        .navigate(base_url)
        .select_option(Selector::label(LANGUAGE_LABEL), locale.code)
        .click(Selector::role("button", CALCULATE_BUTTON))
}

fn default_month(locale: &Locale) -> &'static str {
    locale.months[usize::from(locale::DEFAULT_MONTH) - 1]
}

pub fn arabic_month_translation(base_url: &str) -> Scenario {
    first_year_payment("arabic_month_translation", base_url, &locale::ARABIC)
        .expect_visible(default_month(&locale::ARABIC))
        .screenshot(ARABIC_MONTH_SCREENSHOT)
}

pub fn arabic_number_conversion(base_url: &str) -> Scenario {
    let marker = locale::ARABIC.amount_marker.unwrap_or_default();
    generated_plan("arabic_number_conversion", base_url, &locale::ARABIC)
        .expect_visible(marker)
        .screenshot(ARABIC_NUMBER_SCREENSHOT)
}

pub fn english_month_regression(base_url: &str) -> Scenario {
    first_year_payment("english_month_regression", base_url, &locale::ENGLISH)
        .expect_visible(MONTH_FIELD_LABEL)
        .expect_absent(default_month(&locale::ARABIC))
}

pub fn english_amount_regression(base_url: &str) -> Scenario {
    let marker = locale::ARABIC.amount_marker.unwrap_or_default();
    generated_plan("english_amount_regression", base_url, &locale::ENGLISH)
        .expect_visible(WRITTEN_AMOUNT_HEADER)
        .expect_absent(marker)
}
