use crate::model::{DeleteOutcome, PodRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

const POD_HEADERS: [&str; 7] = ["NAME", "NAMESPACE", "STATUS", "READY", "RESTARTS", "AGE", "NODE"];
const OUTCOME_HEADERS: [&str; 3] = ["ID", "DELETED", "ERROR"];

pub fn json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .context("failed to encode output as JSON")
}

pub fn pods_table(records: &[PodRecord], now: DateTime<Utc>) -> String {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.name.clone(),
                record.namespace.clone(),
                record.status.to_string(),
                record.ready.to_string(),
                record.restarts.to_string(),
                human_age(&record.age, now),
                if record.node.is_empty() {
                    "-".to_string()
                } else {
                    record.node.clone()
                },
            ]
        })
        .collect::<Vec<_>>();
    table(&POD_HEADERS, &rows)
}

pub fn outcomes_table(outcomes: &[DeleteOutcome]) -> String {
    let rows = outcomes
        .iter()
        .map(|outcome| {
            vec![
                outcome.id.clone(),
                outcome.deleted.to_string(),
                outcome
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect::<Vec<_>>();
    table(&OUTCOME_HEADERS, &rows)
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|header| header.len()).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header_cells = headers
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>();
    for cells in std::iter::once(&header_cells).chain(rows) {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Elapsed time since an RFC 3339 timestamp, in its most significant unit.
pub fn human_age(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = DateTime::parse_from_rfc3339(timestamp.trim()) else {
        return "-".to_string();
    };
    let elapsed_seconds = (now.timestamp() - created.timestamp()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}
