//! Compliance period calculation and compliance-year handling.
//!
//! A compliance period always closes at 23:59:59.999 on the last day of a
//! month, found as "the day before the first of the following month", which
//! absorbs month lengths and leap years.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::{FirmError, Result};
use crate::fields::ComplianceFrequency;
use crate::task::Compliance;

/// Months between the start month and the month that closes the period.
fn closing_month_offset(frequency: ComplianceFrequency) -> Option<u32> {
    match frequency {
        ComplianceFrequency::OneTime => None,
        ComplianceFrequency::Monthly => Some(0),
        ComplianceFrequency::Quarterly => Some(3),
        ComplianceFrequency::BiAnnually => Some(6),
        // Yearly spans close on the month before the start month.
        ComplianceFrequency::Annual => Some(11),
        other => other.multi_year_span().map(|n| n * 12 - 1),
    }
}

/// Last calendar day of the month `months` after the month of `start`.
pub fn last_day_of_month_after(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    let following = start.year() * 12 + start.month0() as i32 + months as i32 + 1;
    let first = NaiveDate::from_ymd_opt(following.div_euclid(12), following.rem_euclid(12) as u32 + 1, 1)?;
    first.pred_opt()
}

fn end_of_day(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_milli_opt(23, 59, 59, 999)
}

/// Canonical end of the compliance period starting on `start`.
pub fn period_end(frequency: ComplianceFrequency, start: NaiveDate) -> Option<NaiveDateTime> {
    let closing_day = match closing_month_offset(frequency) {
        None => start,
        Some(months) => last_day_of_month_after(start, months)?,
    };
    end_of_day(closing_day)
}

/// Compute the end date for a frequency label as entered on a task form.
///
/// An empty or unrecognised label is not an error: it yields `None` and the
/// end date is left for manual entry.
pub fn compute_compliance_end_date(frequency: &str, start: NaiveDate) -> Option<NaiveDateTime> {
    ComplianceFrequency::from_label(frequency).and_then(|f| period_end(f, start))
}

/// Parse a comma-separated list of 4-digit years.
pub fn parse_years(s: &str) -> Result<Vec<i32>> {
    let mut years = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.len() != 4 || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(FirmError::validation(format!(
                "compliance year '{}' must be a 4-digit year",
                part
            )));
        }
        // Four ascii digits always parse.
        years.push(part.parse::<i32>().map_err(|e| FirmError::validation(e.to_string()))?);
    }
    Ok(years)
}

/// Join years back into the comma-separated form stored on tasks.
pub fn format_years(years: &[i32]) -> String {
    years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(",")
}

/// Parse a compliance year list and check its length against the frequency.
pub fn validate_years(frequency: ComplianceFrequency, s: &str) -> Result<Vec<i32>> {
    let years = parse_years(s)?;
    let required = frequency.required_year_count();
    if years.len() != required {
        return Err(FirmError::validation(format!(
            "{} compliance needs exactly {} year(s), got '{}'",
            frequency, required, s
        )));
    }
    Ok(years)
}

/// Compliance years labelling the period that starts on `next_start`.
///
/// Annual periods move forward one year and multi-year periods move every
/// listed year forward by the span. Shorter periods take the calendar year of
/// their start date.
pub fn advance_years(frequency: ComplianceFrequency, years: &[i32], next_start: NaiveDate) -> Vec<i32> {
    match frequency {
        ComplianceFrequency::Annual => years.iter().map(|y| y + 1).collect(),
        f => match f.multi_year_span() {
            Some(span) => years.iter().map(|y| y + span as i32).collect(),
            None => vec![next_start.year()],
        },
    }
}

/// Check the invariants of a task's compliance metadata.
pub fn validate_compliance(compliance: &Compliance) -> Result<()> {
    if let Some(year) = compliance.year.as_deref().filter(|y| !y.trim().is_empty()) {
        match compliance.frequency {
            Some(f) => {
                validate_years(f, year)?;
            }
            None => {
                parse_years(year)?;
            }
        }
    }
    if let (Some(start), Some(end)) = (compliance.start_date, compliance.end_date) {
        if end.date() < start {
            return Err(FirmError::validation(format!(
                "compliance end date {} is before start date {}",
                end.date(),
                start
            )));
        }
    }
    if compliance.is_recurring && compliance.frequency.is_none() {
        return Err(FirmError::validation("recurring compliance needs a frequency"));
    }
    Ok(())
}
