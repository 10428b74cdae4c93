use chrono::{Datelike, Duration, NaiveDate};

/// ISO 8601 week label, e.g. `2024W1`.
pub fn iso_week_period(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}W{}", week.year(), week.week())
}

/// Month label, e.g. `202401`.
pub fn month_period(date: NaiveDate) -> String {
    format!("{}{:02}", date.year(), date.month())
}

/// Epidemiological week label, e.g. `2024W1`.
pub fn epi_week_period(date: NaiveDate) -> String {
    let (year, week) = epi_week(date);
    format!("{}W{}", year, week)
}

/// Epidemiological year and week number of a date.
///
/// Weeks run Sunday to Saturday and week 1 is the week holding January 4.
pub fn epi_week(date: NaiveDate) -> (i32, u32) {
    let mut year = date.year();
    if date >= epi_year_start(year + 1) {
        year += 1;
    } else if date < epi_year_start(year) {
        year -= 1;
    }

    let days = (date - epi_year_start(year)).num_days();
    (year, (days / 7) as u32 + 1)
}

fn epi_year_start(year: i32) -> NaiveDate {
    // January 4 always exists
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4).unwrap_or(NaiveDate::MIN);
    let offset = jan4.weekday().num_days_from_sunday() as i64;
    jan4 - Duration::days(offset)
}
