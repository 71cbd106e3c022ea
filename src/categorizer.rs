//! Read-only views over a [`ValidationResult`]: buckets, percentages and counts.

use crate::models::{CategoryType, EmailAddress, ValidationResult};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Returns the addresses the service placed in `category`.
pub fn bucket_for(result: &ValidationResult, category: CategoryType) -> &[EmailAddress] {
    match category {
        CategoryType::Valid => &result.valid,
        CategoryType::Invalid => &result.invalid,
        CategoryType::Risky => &result.risky,
        CategoryType::Disposable => &result.disposable,
        CategoryType::SpamTraps => &result.spam_traps,
    }
}

/// Share of the submitted addresses that landed in `category`, as 0.0..=100.0.
/// An empty submission yields 0.0.
pub fn percent_of(result: &ValidationResult, category: CategoryType) -> f64 {
    if result.total_emails == 0 {
        return 0.0;
    }
    bucket_for(result, category).len() as f64 / result.total_emails as f64 * 100.0
}

/// Per-category counts for the overview cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    counts: BTreeMap<CategoryType, usize>,
}

impl StatsSummary {
    pub fn count(&self, category: CategoryType) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Sum over all five categories.
    pub fn classified(&self) -> usize {
        self.counts.values().sum()
    }

    /// Addresses the service returned no category for.
    pub fn unclassified(&self, total_emails: usize) -> usize {
        total_emails.saturating_sub(self.classified())
    }
}

pub fn stats_summary(result: &ValidationResult) -> StatsSummary {
    let counts = CategoryType::ALL
        .into_iter()
        .map(|c| (c, bucket_for(result, c).len()))
        .collect();
    StatsSummary { counts }
}

/// A result that breaks the partition rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("address '{address}' appears in both {first} and {second}")]
    Overlap {
        address: EmailAddress,
        first: CategoryType,
        second: CategoryType,
    },

    #[error("{classified} addresses classified but only {total} submitted")]
    OverClassified { classified: usize, total: usize },

    #[error("result reports {reported} emails but {expected} were submitted")]
    TotalMismatch { reported: usize, expected: usize },
}

/// Verifies the buckets are pairwise disjoint, their sizes add up to at most
/// `total_emails`, and (when given) `total_emails` matches the submission size.
///
/// Repeated occurrences of one address inside a single bucket are allowed,
/// since duplicate input rows pass through untouched.
pub fn check_invariants(
    result: &ValidationResult,
    expected_total: Option<usize>,
) -> Result<(), InvariantViolation> {
    if let Some(expected) = expected_total {
        if result.total_emails != expected {
            return Err(InvariantViolation::TotalMismatch {
                reported: result.total_emails,
                expected,
            });
        }
    }

    let summary = stats_summary(result);
    if summary.classified() > result.total_emails {
        return Err(InvariantViolation::OverClassified {
            classified: summary.classified(),
            total: result.total_emails,
        });
    }

    let mut owner: HashMap<&str, CategoryType> = HashMap::new();
    for category in CategoryType::ALL {
        for address in bucket_for(result, category) {
            match owner.get(address.as_str()) {
                Some(&first) if first != category => {
                    return Err(InvariantViolation::Overlap {
                        address: address.clone(),
                        first,
                        second: category,
                    });
                }
                Some(_) => {}
                None => {
                    owner.insert(address.as_str(), category);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;

    fn addrs(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}@x.com", prefix, i)).collect()
    }

    fn sample() -> ValidationResult {
        ValidationResult {
            id: "r1".to_string(),
            date: None,
            file_name: None,
            total_emails: 10,
            valid: addrs("v", 6),
            invalid: addrs("i", 2),
            risky: addrs("r", 1),
            disposable: vec![],
            spam_traps: vec![],
            credits_used: 10,
            status: ResultStatus::Completed,
        }
    }

    #[test]
    fn test_stats_summary_scenario() {
        let result = sample();
        let summary = stats_summary(&result);
        assert_eq!(summary.count(CategoryType::Valid), 6);
        assert_eq!(summary.count(CategoryType::Invalid), 2);
        assert_eq!(summary.count(CategoryType::Risky), 1);
        assert_eq!(summary.count(CategoryType::Disposable), 0);
        assert_eq!(summary.count(CategoryType::SpamTraps), 0);
        assert_eq!(summary.classified(), 9);
        assert_eq!(summary.unclassified(result.total_emails), 1);
        assert_eq!(percent_of(&result, CategoryType::Valid), 60.0);
        assert_eq!(percent_of(&result, CategoryType::Risky), 10.0);
    }

    #[test]
    fn test_percent_of_zero_total() {
        let mut result = sample();
        result.total_emails = 0;
        result.valid.clear();
        for category in CategoryType::ALL {
            let pct = percent_of(&result, category);
            assert_eq!(pct, 0.0);
            assert!(!pct.is_nan());
        }
    }

    #[test]
    fn test_bucket_for_each_field() {
        let result = sample();
        assert_eq!(bucket_for(&result, CategoryType::Valid).len(), 6);
        assert_eq!(bucket_for(&result, CategoryType::Risky), &["r0@x.com".to_string()]);
        assert!(bucket_for(&result, CategoryType::SpamTraps).is_empty());
    }

    #[test]
    fn test_check_invariants_accepts_partial_classification() {
        assert_eq!(check_invariants(&sample(), Some(10)), Ok(()));
    }

    #[test]
    fn test_check_invariants_overlap() {
        let mut result = sample();
        result.spam_traps.push("v3@x.com".to_string());
        assert_eq!(
            check_invariants(&result, None),
            Err(InvariantViolation::Overlap {
                address: "v3@x.com".to_string(),
                first: CategoryType::Valid,
                second: CategoryType::SpamTraps,
            })
        );
    }

    #[test]
    fn test_check_invariants_duplicates_within_bucket_allowed() {
        let mut result = sample();
        result.valid.push("v0@x.com".to_string());
        assert_eq!(check_invariants(&result, None), Ok(()));
    }

    #[test]
    fn test_check_invariants_bound_and_total() {
        let mut result = sample();
        result.total_emails = 8;
        assert!(matches!(
            check_invariants(&result, None),
            Err(InvariantViolation::OverClassified { classified: 9, total: 8 })
        ));
        assert!(matches!(
            check_invariants(&sample(), Some(12)),
            Err(InvariantViolation::TotalMismatch { reported: 10, expected: 12 })
        ));
    }
}
