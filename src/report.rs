//! Browsing one category of a result at a time: search, pages and export.

use crate::categorizer::{StatsSummary, bucket_for, percent_of, stats_summary};
use crate::models::{CategoryType, ReportViewState, ValidationResult};
use std::io;
use std::path::{Path, PathBuf};

/// Rows per report page.
pub const PAGE_SIZE: usize = 10;

/// One page of the selected category after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRows<'a> {
    pub rows: Vec<&'a str>,
    /// Matches across all pages.
    pub total_filtered: usize,
    /// At least 1, even when nothing matches.
    pub total_pages: usize,
    /// The page actually shown, after clamping.
    pub page: usize,
}

pub fn total_pages(filtered_count: usize) -> usize {
    filtered_count.div_ceil(PAGE_SIZE).max(1)
}

/// Case-insensitive substring match; empty search matches everything.
fn matches_search(address: &str, needle_lower: &str) -> bool {
    needle_lower.is_empty() || address.to_lowercase().contains(needle_lower)
}

/// Derives the rows to show for `state`. Out-of-range pages are clamped
/// into `1..=total_pages`, never rejected.
pub fn visible_rows<'a>(result: &'a ValidationResult, state: &ReportViewState) -> VisibleRows<'a> {
    let needle = state.search_text.to_lowercase();
    let filtered: Vec<&str> = bucket_for(result, state.selected_category)
        .iter()
        .map(String::as_str)
        .filter(|address| matches_search(address, &needle))
        .collect();

    let total_filtered = filtered.len();
    let total_pages = total_pages(total_filtered);
    let page = state.current_page.clamp(1, total_pages);

    let rows = filtered
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();

    VisibleRows {
        rows,
        total_filtered,
        total_pages,
        page,
    }
}

/// Plain-text download of one bucket: one address per line, no header and
/// no trailing newline. An empty bucket exports as zero bytes.
pub fn export_category(result: &ValidationResult, category: CategoryType) -> Vec<u8> {
    bucket_for(result, category).join("\n").into_bytes()
}

pub fn export_file_name(category: CategoryType) -> String {
    format!("{}-emails.txt", category.as_str())
}

/// A report view that owns its result and view state.
///
/// Changing the category or the search text sends the view back to page 1.
#[derive(Debug, Clone)]
pub struct ReportBrowser {
    result: ValidationResult,
    state: ReportViewState,
}

impl ReportBrowser {
    /// Opens a fresh view on the `valid` category.
    pub fn new(result: ValidationResult) -> Self {
        Self {
            result,
            state: ReportViewState::default(),
        }
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn state(&self) -> &ReportViewState {
        &self.state
    }

    pub fn stats(&self) -> StatsSummary {
        stats_summary(&self.result)
    }

    pub fn percent(&self, category: CategoryType) -> f64 {
        percent_of(&self.result, category)
    }

    pub fn select_category(&mut self, category: CategoryType) {
        self.state.selected_category = category;
        self.state.current_page = 1;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.state.search_text {
            self.state.search_text = text;
            self.state.current_page = 1;
        }
    }

    /// Jumps to `page`, clamped to the pages the current filter yields.
    pub fn set_page(&mut self, page: usize) {
        let pages = self.rows().total_pages;
        self.state.current_page = page.clamp(1, pages);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.state.current_page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.state.current_page.saturating_sub(1));
    }

    pub fn rows(&self) -> VisibleRows<'_> {
        visible_rows(&self.result, &self.state)
    }

    pub fn export(&self, category: CategoryType) -> Vec<u8> {
        export_category(&self.result, category)
    }

    /// Writes `<category>-emails.txt` into `dir` and returns its path.
    pub fn export_to_dir(&self, dir: &Path, category: CategoryType) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(category));
        std::fs::write(&path, self.export(category))?;
        tracing::info!(
            "Exported {} {} addresses to {}",
            bucket_for(&self.result, category).len(),
            category,
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;

    fn result_with_valid(valid: Vec<String>) -> ValidationResult {
        ValidationResult {
            id: "rep".to_string(),
            date: None,
            file_name: None,
            total_emails: valid.len() + 2,
            valid,
            invalid: vec!["bad@x.com".to_string(), "Worse@Acme.io".to_string()],
            risky: vec![],
            disposable: vec![],
            spam_traps: vec![],
            credits_used: 0,
            status: ResultStatus::Completed,
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("user{:02}@example.com", i)).collect()
    }

    fn state(category: CategoryType, search: &str, page: usize) -> ReportViewState {
        ReportViewState {
            selected_category: category,
            search_text: search.to_string(),
            current_page: page,
        }
    }

    #[test]
    fn test_pagination_clamp_for_any_page() {
        for count in [0usize, 1, 9, 10, 11, 25] {
            let result = result_with_valid(numbered(count));
            for page in [0usize, 1, 2, 3, 4, 100, usize::MAX] {
                let view = visible_rows(&result, &state(CategoryType::Valid, "", page));
                assert!(view.total_pages >= 1);
                assert!(view.rows.len() <= PAGE_SIZE);
                assert!(view.page >= 1 && view.page <= view.total_pages);
                assert_eq!(view.total_filtered, count);
            }
        }
    }

    #[test]
    fn test_last_page_is_partial() {
        let result = result_with_valid(numbered(25));
        let view = visible_rows(&result, &state(CategoryType::Valid, "", 3));
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.rows, vec!["user21@example.com", "user22@example.com", "user23@example.com", "user24@example.com", "user25@example.com"]);

        let clamped = visible_rows(&result, &state(CategoryType::Valid, "", 9));
        assert_eq!(clamped.page, 3);
        assert_eq!(clamped.rows, view.rows);
    }

    #[test]
    fn test_empty_bucket_is_one_empty_page() {
        let result = result_with_valid(numbered(3));
        let view = visible_rows(&result, &state(CategoryType::SpamTraps, "", 1));
        assert!(view.rows.is_empty());
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.total_filtered, 0);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let result = result_with_valid(numbered(3));
        let view = visible_rows(&result, &state(CategoryType::Invalid, "ACME", 1));
        assert_eq!(view.rows, vec!["Worse@Acme.io"]);

        let view = visible_rows(&result, &state(CategoryType::Valid, "02@", 1));
        assert_eq!(view.rows, vec!["user02@example.com"]);
    }

    #[test]
    fn test_search_change_resets_page() {
        let mut browser = ReportBrowser::new(result_with_valid(numbered(40)));
        browser.set_search("a");
        browser.set_page(3);
        assert_eq!(browser.state().current_page, 3);

        browser.set_search("b");
        assert_eq!(browser.state().current_page, 1);
    }

    #[test]
    fn test_same_search_keeps_page() {
        let mut browser = ReportBrowser::new(result_with_valid(numbered(40)));
        browser.set_page(2);
        browser.set_search("");
        assert_eq!(browser.state().current_page, 2);
    }

    #[test]
    fn test_category_switch_resets_page() {
        let mut browser = ReportBrowser::new(result_with_valid(numbered(40)));
        assert_eq!(browser.state().selected_category, CategoryType::Valid);
        browser.next_page();
        browser.next_page();
        assert_eq!(browser.state().current_page, 3);

        browser.select_category(CategoryType::Invalid);
        assert_eq!(browser.state().current_page, 1);
        assert_eq!(browser.rows().rows.len(), 2);
    }

    #[test]
    fn test_page_navigation_clamps() {
        let mut browser = ReportBrowser::new(result_with_valid(numbered(15)));
        browser.prev_page();
        assert_eq!(browser.state().current_page, 1);
        browser.set_page(50);
        assert_eq!(browser.state().current_page, 2);
        browser.next_page();
        assert_eq!(browser.state().current_page, 2);
    }

    #[test]
    fn test_export_format() {
        let result = result_with_valid(numbered(2));
        assert_eq!(
            export_category(&result, CategoryType::Valid),
            b"user01@example.com\nuser02@example.com".to_vec()
        );
        assert!(export_category(&result, CategoryType::Risky).is_empty());
        assert_eq!(export_file_name(CategoryType::SpamTraps), "spamTraps-emails.txt");
    }

    #[test]
    fn test_export_to_dir_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let browser = ReportBrowser::new(result_with_valid(numbered(1)));
        let path = browser.export_to_dir(dir.path(), CategoryType::Invalid).unwrap();
        assert_eq!(path.file_name().unwrap(), "invalid-emails.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "bad@x.com\nWorse@Acme.io");
    }
}
