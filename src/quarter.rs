// Quarter tags ("2023Q1")
//
// Events carry free-form duration strings and reports compare them exactly;
// these helpers only produce and sanity-check the conventional form.

use chrono::{Datelike, NaiveDate, Utc};

/// Tag for the quarter containing `date`
pub fn quarter_of(date: NaiveDate) -> String {
    format!("{}Q{}", date.year(), date.month0() / 3 + 1)
}

pub fn current_quarter() -> String {
    quarter_of(Utc::now().date_naive())
}

/// The four tags of a year, in order
pub fn quarters_of_year(year: i32) -> Vec<String> {
    (1..=4).map(|q| format!("{}Q{}", year, q)).collect()
}

/// Whether `tag` looks like `YYYYQn` with n in 1..=4
pub fn is_quarter_tag(tag: &str) -> bool {
    let Some((year, quarter)) = tag.split_once('Q') else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|c| c.is_ascii_digit())
        && matches!(quarter, "1" | "2" | "3" | "4")
}
