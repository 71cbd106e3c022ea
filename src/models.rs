//! Defines the core data structures used in the email-cleaner application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A candidate address, case-preserved exactly as submitted.
pub type EmailAddress = String;

/// Source marker for addresses typed or pasted rather than uploaded.
pub const DIRECT_INPUT: &str = "direct input";

/// The five result buckets a validation service sorts addresses into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum CategoryType {
    Valid,
    Invalid,
    Risky,
    Disposable,
    SpamTraps,
}

impl CategoryType {
    /// Every category, in the order the report shows its overview cards.
    pub const ALL: [CategoryType; 5] = [
        CategoryType::Valid,
        CategoryType::Invalid,
        CategoryType::Risky,
        CategoryType::SpamTraps,
        CategoryType::Disposable,
    ];

    /// Wire name, also used for export file names.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryType::Valid => "valid",
            CategoryType::Invalid => "invalid",
            CategoryType::Risky => "risky",
            CategoryType::Disposable => "disposable",
            CategoryType::SpamTraps => "spamTraps",
        }
    }

    /// Static presentation metadata for this category.
    pub fn descriptor(self) -> &'static ValidationCategory {
        match self {
            CategoryType::Valid => &VALID,
            CategoryType::Invalid => &INVALID,
            CategoryType::Risky => &RISKY,
            CategoryType::SpamTraps => &SPAM_TRAPS,
            CategoryType::Disposable => &DISPOSABLE,
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown category '{0}' (expected one of: valid, invalid, risky, disposable, spamTraps)")]
pub struct ParseCategoryError(pub String);

impl FromStr for CategoryType {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Color token a front end maps onto its palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorToken {
    Green,
    Red,
    Yellow,
    Purple,
    Blue,
}

/// Icon token a front end maps onto its icon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconToken {
    Mail,
    XCircle,
    AlertTriangle,
    Shield,
    Trash,
}

impl IconToken {
    pub fn name(self) -> &'static str {
        match self {
            IconToken::Mail => "mail",
            IconToken::XCircle => "x-circle",
            IconToken::AlertTriangle => "alert-triangle",
            IconToken::Shield => "shield",
            IconToken::Trash => "trash-2",
        }
    }
}

/// Presentation descriptor for one category. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationCategory {
    pub category: CategoryType,
    pub label: &'static str,
    pub color: ColorToken,
    pub description: &'static str,
    pub icon: IconToken,
}

static VALID: ValidationCategory = ValidationCategory {
    category: CategoryType::Valid,
    label: "Valid Emails",
    color: ColorToken::Green,
    description: "These emails are valid and safe to send to",
    icon: IconToken::Mail,
};

static INVALID: ValidationCategory = ValidationCategory {
    category: CategoryType::Invalid,
    label: "Invalid Emails",
    color: ColorToken::Red,
    description: "These emails are invalid or non-existent",
    icon: IconToken::XCircle,
};

static RISKY: ValidationCategory = ValidationCategory {
    category: CategoryType::Risky,
    label: "Risky Emails",
    color: ColorToken::Yellow,
    description: "These emails might have deliverability issues",
    icon: IconToken::AlertTriangle,
};

static SPAM_TRAPS: ValidationCategory = ValidationCategory {
    category: CategoryType::SpamTraps,
    label: "Spam Traps",
    color: ColorToken::Purple,
    description: "Known spam trap addresses",
    icon: IconToken::Shield,
};

static DISPOSABLE: ValidationCategory = ValidationCategory {
    category: CategoryType::Disposable,
    label: "Disposable Emails",
    color: ColorToken::Blue,
    description: "Temporary email addresses",
    icon: IconToken::Trash,
};

/// Lifecycle of a single submission.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Reading,
    Submitting,
    Awaiting,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Reading => "reading",
            JobState::Submitting => "submitting",
            JobState::Awaiting => "awaiting",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One submission, from file acceptance to a terminal state.
#[derive(Debug, Clone, Default)]
pub struct ValidationJob {
    /// The originating file name or [`DIRECT_INPUT`].
    pub source_identifier: Option<String>,
    /// Addresses as produced by the normalizer.
    pub input_addresses: Vec<EmailAddress>,
    pub state: JobState,
    /// Always within 0..=100.
    pub progress_percent: u8,
}

/// Server-side status of a validation result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Processing,
    Failed,
}

/// The authoritative output of a completed job, in the service's wire shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Opaque identifier assigned by the service.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub total_emails: usize,
    #[serde(default)]
    pub valid: Vec<EmailAddress>,
    #[serde(default)]
    pub invalid: Vec<EmailAddress>,
    #[serde(default)]
    pub risky: Vec<EmailAddress>,
    #[serde(default)]
    pub disposable: Vec<EmailAddress>,
    #[serde(default)]
    pub spam_traps: Vec<EmailAddress>,
    /// One credit per submitted address, regardless of outcome.
    pub credits_used: u64,
    pub status: ResultStatus,
}

/// Ephemeral state of a report view over one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportViewState {
    pub selected_category: CategoryType,
    pub search_text: String,
    /// 1-indexed.
    pub current_page: usize,
}

impl Default for ReportViewState {
    fn default() -> Self {
        Self {
            selected_category: CategoryType::Valid,
            search_text: String::new(),
            current_page: 1,
        }
    }
}

/// Filters accepted by the history endpoint. Unset fields are not sent.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// One page of past validation results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub results: Vec<ValidationResult>,
    pub total: usize,
    pub pages: usize,
}
