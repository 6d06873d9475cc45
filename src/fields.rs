//! Enumerations and field types for firm tasks.
//!
//! This module defines the small closed sets used to classify tasks: priority,
//! compliance frequency and the quick filters offered by task lists.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task priority as shown on the task board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    #[default]
    #[serde(alias = "Regular")]
    Regular,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Urgent")]
    Urgent,
}

/// Cadence of a regulatory or filing obligation.
///
/// Serialized with the labels firms use on their compliance calendars
/// ("One Time", "Bi-Annually", "3 Years", ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComplianceFrequency {
    #[serde(rename = "One Time")]
    OneTime,
    #[serde(rename = "Monthly")]
    Monthly,
    #[serde(rename = "Quarterly")]
    Quarterly,
    #[serde(rename = "Bi-Annually")]
    BiAnnually,
    #[serde(rename = "Annual")]
    Annual,
    #[serde(rename = "2 Years")]
    TwoYears,
    #[serde(rename = "3 Years")]
    ThreeYears,
    #[serde(rename = "4 Years")]
    FourYears,
    #[serde(rename = "5 Years")]
    FiveYears,
}

impl ComplianceFrequency {
    pub const ALL: [ComplianceFrequency; 9] = [
        ComplianceFrequency::OneTime,
        ComplianceFrequency::Monthly,
        ComplianceFrequency::Quarterly,
        ComplianceFrequency::BiAnnually,
        ComplianceFrequency::Annual,
        ComplianceFrequency::TwoYears,
        ComplianceFrequency::ThreeYears,
        ComplianceFrequency::FourYears,
        ComplianceFrequency::FiveYears,
    ];

    /// Calendar label of the frequency.
    pub fn label(self) -> &'static str {
        match self {
            ComplianceFrequency::OneTime => "One Time",
            ComplianceFrequency::Monthly => "Monthly",
            ComplianceFrequency::Quarterly => "Quarterly",
            ComplianceFrequency::BiAnnually => "Bi-Annually",
            ComplianceFrequency::Annual => "Annual",
            ComplianceFrequency::TwoYears => "2 Years",
            ComplianceFrequency::ThreeYears => "3 Years",
            ComplianceFrequency::FourYears => "4 Years",
            ComplianceFrequency::FiveYears => "5 Years",
        }
    }

    /// Parse a frequency label leniently: case, spaces, hyphens and
    /// underscores are ignored, so "bi-annually", "Bi Annually" and
    /// "2_years" are all accepted. Anything else yields `None`.
    pub fn from_label(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "onetime" => Some(ComplianceFrequency::OneTime),
            "monthly" => Some(ComplianceFrequency::Monthly),
            "quarterly" => Some(ComplianceFrequency::Quarterly),
            "biannually" | "biannual" | "halfyearly" => Some(ComplianceFrequency::BiAnnually),
            "annual" | "annually" | "yearly" => Some(ComplianceFrequency::Annual),
            "2years" => Some(ComplianceFrequency::TwoYears),
            "3years" => Some(ComplianceFrequency::ThreeYears),
            "4years" => Some(ComplianceFrequency::FourYears),
            "5years" => Some(ComplianceFrequency::FiveYears),
            _ => None,
        }
    }

    /// Span in whole years for the multi-year frequencies.
    pub fn multi_year_span(self) -> Option<u32> {
        match self {
            ComplianceFrequency::TwoYears => Some(2),
            ComplianceFrequency::ThreeYears => Some(3),
            ComplianceFrequency::FourYears => Some(4),
            ComplianceFrequency::FiveYears => Some(5),
            _ => None,
        }
    }

    /// Number of 4-digit years a compliance year list must hold.
    pub fn required_year_count(self) -> usize {
        self.multi_year_span().unwrap_or(1) as usize
    }
}

impl fmt::Display for ComplianceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComplianceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComplianceFrequency::from_label(s).ok_or_else(|| {
            let known: Vec<&str> = ComplianceFrequency::ALL.iter().map(|f| f.label()).collect();
            format!("unrecognised compliance frequency '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}

/// Preset filters offered above every task list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuickFilter {
    #[default]
    All,
    My,
    Overdue,
    Today,
    Completed,
    Pending,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_is_lenient() {
        assert_eq!(ComplianceFrequency::from_label("Bi-Annually"), Some(ComplianceFrequency::BiAnnually));
        assert_eq!(ComplianceFrequency::from_label("bi annually"), Some(ComplianceFrequency::BiAnnually));
        assert_eq!(ComplianceFrequency::from_label("ONE TIME"), Some(ComplianceFrequency::OneTime));
        assert_eq!(ComplianceFrequency::from_label("3-years"), Some(ComplianceFrequency::ThreeYears));
        assert_eq!(ComplianceFrequency::from_label(""), None);
        assert_eq!(ComplianceFrequency::from_label("Weekly"), None);
    }

    #[test]
    fn test_labels_round_trip_through_serde() {
        for f in ComplianceFrequency::ALL {
            let json = serde_json::to_string(&f).unwrap();
            assert_eq!(json, format!("\"{}\"", f.label()));
            let back: ComplianceFrequency = serde_json::from_str(&json).unwrap();
            assert_eq!(back, f);
        }
    }

    #[test]
    fn test_required_year_count() {
        assert_eq!(ComplianceFrequency::Annual.required_year_count(), 1);
        assert_eq!(ComplianceFrequency::Monthly.required_year_count(), 1);
        assert_eq!(ComplianceFrequency::FourYears.required_year_count(), 4);
    }
}
