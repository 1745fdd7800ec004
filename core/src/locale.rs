use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Locale {
    pub code: &'static str,
    pub direction: TextDirection,
    pub months: [&'static str; 12],
    /// Fragment every written amount carries in this locale, if any.
    pub amount_marker: Option<&'static str>,
}

pub const ARABIC: Locale = Locale {
    code: "ar",
    direction: TextDirection::Rtl,
    months: [
        "يناير",
        "فبراير",
        "مارس",
        "أبريل",
        "مايو",
        "يونيو",
        "يوليو",
        "أغسطس",
        "سبتمبر",
        "أكتوبر",
        "نوفمبر",
        "ديسمبر",
    ],
    amount_marker: Some("فقط"),
};

pub const ENGLISH: Locale = Locale {
    code: "en",
    direction: TextDirection::Ltr,
    months: [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ],
    amount_marker: None,
};

pub const LOCALES: &[Locale] = &[ARABIC, ENGLISH];

/// Month index the calculator assigns to a freshly added first-year payment.
pub const DEFAULT_MONTH: u8 = 1;

pub fn lookup(code: &str) -> Option<&'static Locale> {
    LOCALES
        .iter()
        .find(|locale| locale.code.eq_ignore_ascii_case(code.trim()))
}

impl Locale {
    pub fn month(&self, index: u8) -> Option<&'static str> {
        match index {
            1..=12 => Some(self.months[usize::from(index) - 1]),
            _ => None,
        }
    }

    pub fn is_rtl(&self) -> bool {
        self.direction == TextDirection::Rtl
    }

    pub fn glyphs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.months.iter().copied().chain(self.amount_marker)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({:?})", self.code, self.direction)?;
        for (idx, month) in self.months.iter().enumerate() {
            writeln!(f, "  month {:>2}: {}", idx + 1, month)?;
        }
        match self.amount_marker {
            Some(marker) => writeln!(f, "  amount marker: {marker}"),
            None => writeln!(f, "  amount marker: <none>"),
        }
    }
}

pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_month_in_arabic_is_january() {
        assert_eq!(ARABIC.month(DEFAULT_MONTH), Some("يناير"));
        assert_eq!(ENGLISH.month(DEFAULT_MONTH), Some("January"));
    }

    #[test]
    fn month_index_outside_range_has_no_glyph() {
        assert_eq!(ARABIC.month(0), None);
        assert_eq!(ARABIC.month(13), None);
        assert_eq!(ARABIC.month(12), Some("ديسمبر"));
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(lookup(" AR ").map(|l| l.code), Some("ar"));
        assert!(lookup("fr").is_none());
    }

    #[test]
    fn arabic_glyphs_are_detected_and_english_are_not() {
        assert!(ARABIC.glyphs().all(contains_arabic));
        assert!(!ENGLISH.glyphs().any(contains_arabic));
        assert_eq!(ARABIC.glyphs().count(), 13);
        assert!(ARABIC.is_rtl());
    }
}
