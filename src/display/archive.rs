//! Archive display formatting
//!
//! Formats archive listings and restore summaries for terminal output.

use chrono::{DateTime, Duration, Utc};

use crate::store::{Archive, PruneReport};

/// Format archives as a numbered table, newest first as given
///
/// The numbers are the 1-based indices accepted as restore selectors.
pub fn format_archive_list(archives: &[Archive], now: DateTime<Utc>) -> String {
    if archives.is_empty() {
        return "No archives found.".to_string();
    }

    let name_width = archives
        .iter()
        .map(|a| a.file_name().len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:>3}  {:<name_width$}  {:<11}  {:<19}  {:>6}  {:>10}\n",
        "#",
        "File",
        "Kind",
        "Created (UTC)",
        "Age",
        "Size",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:->3}  {:-<name_width$}  {:-<11}  {:-<19}  {:->6}  {:->10}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    for (i, archive) in archives.iter().enumerate() {
        output.push_str(&format!(
            "{:>3}  {:<name_width$}  {:<11}  {:<19}  {:>6}  {:>10}\n",
            i + 1,
            archive.file_name(),
            archive.kind.to_string(),
            archive.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_age(archive.age(now)),
            format_size(archive.size_bytes),
            name_width = name_width,
        ));
    }

    output.push_str(&format!("\n{} archive(s)", archives.len()));
    output
}

/// Describe what a restore is about to do
pub fn format_restore_summary(archive: &Archive, database: &str, target: &str) -> String {
    let mut output = String::new();
    output.push_str("Restore plan\n");
    output.push_str(&format!("  Archive:  {}\n", archive.file_name()));
    output.push_str(&format!(
        "  Created:  {}\n",
        archive.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("  Size:     {}\n", format_size(archive.size_bytes)));
    output.push_str(&format!("  Database: {}\n", database));
    output.push_str(&format!("  Target:   {}", target));
    output
}

/// Summarize a retention pass; `dry_run` changes the verb only
pub fn format_prune_report(report: &PruneReport, dry_run: bool) -> String {
    let verb = if dry_run { "Would remove" } else { "Removed" };

    if report.removed.is_empty() && report.failed.is_empty() {
        return match report.swept.len() {
            0 => "No archives past the retention window.".to_string(),
            n => format!(
                "No archives past the retention window.\nCleaned up {} abandoned partial file(s)",
                n
            ),
        };
    }

    let mut output = String::new();
    for archive in &report.removed {
        output.push_str(&format!("{} {}\n", verb, archive.file_name()));
    }
    for (archive, reason) in &report.failed {
        output.push_str(&format!("Could not remove {}: {}\n", archive.file_name(), reason));
    }
    if !report.swept.is_empty() {
        output.push_str(&format!("Cleaned up {} abandoned partial file(s)\n", report.swept.len()));
    }
    output.push_str(&format!("{} {} archive(s)", verb, report.count()));
    output
}

/// Compact age such as `45s`, `3h`, `12d` or `2mo`
pub fn format_age(age: Duration) -> String {
    let total_seconds = age.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Human-readable byte size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
