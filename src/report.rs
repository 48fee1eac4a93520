//! Plain-text conflict report export.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictStatus, Severity};
use crate::error::ValidationError;

const BANNER: &str = "================================================================";
const DIVIDER: &str = "----------------------------------------------------------------";

/// Ordering of the report entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// High, Medium, Low.
    #[default]
    Severity,
    /// Unresolved, resolved, ignored.
    Status,
    /// Alphabetically by document titles.
    Documents,
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "severity" => Ok(Self::Severity),
            "status" => Ok(Self::Status),
            "documents" | "document" => Ok(Self::Documents),
            _ => Err(ValidationError::UnknownValue {
                field: "sort key",
                value: s.to_string(),
            }),
        }
    }
}

/// Which conflicts go into a report, and in what order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Keep only conflicts with this status.
    pub status: Option<ConflictStatus>,
    /// Keep only conflicts with this severity.
    pub severity: Option<Severity>,
    /// Entry order. Ties keep store order.
    pub sort: SortKey,
}

impl ReportOptions {
    /// True if the conflict passes both filters.
    #[must_use]
    pub fn includes(&self, conflict: &Conflict) -> bool {
        self.status.map_or(true, |s| conflict.status == s)
            && self.severity.map_or(true, |s| conflict.severity == s)
    }

    /// Filters and sorts `conflicts`.
    #[must_use]
    pub fn select<'a>(&self, conflicts: &'a [Conflict]) -> Vec<&'a Conflict> {
        let mut selected: Vec<&Conflict> = conflicts.iter().filter(|c| self.includes(c)).collect();
        match self.sort {
            SortKey::Severity => selected.sort_by_key(|c| c.severity.rank()),
            SortKey::Status => selected.sort_by_key(|c| c.status.rank()),
            SortKey::Documents => selected.sort_by_cached_key(|c| {
                (
                    c.document_titles[0].to_lowercase(),
                    c.document_titles[1].to_lowercase(),
                )
            }),
        }
        selected
    }
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Suggested file name.
    pub filename: String,
    /// When the report was rendered.
    pub generated_at: DateTime<Utc>,
    /// Number of conflicts listed.
    pub conflict_count: usize,
    /// Full text.
    pub body: String,
}

/// File name for the `counter`-th export.
#[must_use]
pub fn report_filename(counter: u32) -> String {
    format!("conflict-report-{counter:03}.txt")
}

/// Renders the report text.
#[must_use]
pub fn render_report(
    conflicts: &[Conflict],
    options: &ReportOptions,
    counter: u32,
    generated_at: DateTime<Utc>,
) -> Report {
    let filename = report_filename(counter);
    let selected = options.select(conflicts);

    let mut body = String::new();
    // fmt::Write for String never fails.
    let _ = write_body(&mut body, &filename, generated_at, options, &selected);

    Report {
        filename,
        generated_at,
        conflict_count: selected.len(),
        body,
    }
}

fn write_body(
    out: &mut String,
    filename: &str,
    generated_at: DateTime<Utc>,
    options: &ReportOptions,
    selected: &[&Conflict],
) -> fmt::Result {
    writeln!(out, "{BANNER}")?;
    writeln!(out, "CONFLICT REPORT")?;
    writeln!(out, "File: {filename}")?;
    writeln!(out, "Generated: {}", generated_at.to_rfc3339())?;
    writeln!(out, "Total conflicts: {}", selected.len())?;
    if let Some(status) = options.status {
        writeln!(out, "Status filter: {status}")?;
    }
    if let Some(severity) = options.severity {
        writeln!(out, "Severity filter: {severity}")?;
    }
    writeln!(out, "{BANNER}")?;

    for (idx, conflict) in selected.iter().enumerate() {
        let [first, second] = &conflict.document_titles;
        writeln!(out)?;
        writeln!(out, "#{} [{}]", idx + 1, conflict.id)?;
        writeln!(out, "Documents: {first} <-> {second}")?;
        writeln!(out, "Severity: {}", conflict.severity)?;
        match conflict.resolution {
            Some(resolution) => writeln!(out, "Status: {} ({resolution})", conflict.status)?,
            None => writeln!(out, "Status: {}", conflict.status)?,
        }
        writeln!(out, "Explanation: {}", conflict.explanation)?;
        writeln!(out, "Excerpt from {first}:")?;
        writeln!(out, "  \"{}\"", conflict.excerpts[0])?;
        writeln!(out, "Excerpt from {second}:")?;
        writeln!(out, "  \"{}\"", conflict.excerpts[1])?;
        writeln!(out, "{DIVIDER}")?;
    }

    if selected.is_empty() {
        writeln!(out)?;
        writeln!(out, "No conflicts match the selected filters.")?;
    }
    writeln!(out)?;
    writeln!(out, "{BANNER}")?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{BANNER}")
}
