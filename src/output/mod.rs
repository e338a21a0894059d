//! Output module for crawl summaries and history listings
//!
//! This module handles:
//! - Printing the end-of-crawl report
//! - Listing stored snapshots of a resource

pub mod history;

pub use history::{format_history, load_history, print_history, HistoryEntry, ResourceHistory};

use crate::crawler::CrawlReport;

/// Formats a crawl report
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::from("=== Crawl Report ===\n\n");
    out.push_str(&format!("  Rounds: {}\n", report.rounds));
    out.push_str(&format!("  Snapshots stored: {}\n", report.snapshots_stored));
    out.push_str(&format!("  Unchanged: {}\n", report.duplicates));
    out.push_str(&format!("  Fetch failures: {}\n", report.fetch_failures));

    if report.handler_failures > 0 {
        out.push_str(&format!("  Handler failures: {}\n", report.handler_failures));
    }
    if report.round_failures > 0 {
        out.push_str(&format!("  Failed rounds: {}\n", report.round_failures));
    }

    out
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_report_hides_zero_failures() {
        let report = CrawlReport {
            rounds: 2,
            snapshots_stored: 3,
            duplicates: 1,
            fetch_failures: 0,
            handler_failures: 0,
            round_failures: 0,
        };

        let text = format_report(&report);
        assert!(text.contains("Rounds: 2\n"));
        assert!(text.contains("Snapshots stored: 3\n"));
        assert!(!text.contains("Handler failures"));
        assert!(!text.contains("Failed rounds"));
    }

    #[test]
    fn test_format_report_shows_failures() {
        let report = CrawlReport {
            handler_failures: 1,
            round_failures: 2,
            ..CrawlReport::default()
        };

        let text = format_report(&report);
        assert!(text.contains("Handler failures: 1\n"));
        assert!(text.contains("Failed rounds: 2\n"));
    }
}
