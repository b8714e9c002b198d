use std::io;
use std::path::Path;

use crate::error::Result;
use crate::reconcile::{EntityKind, ReconcileSummary};

/// Export every classified record to a semicolon-delimited CSV file.
///
/// Columns: Entity ; Change ; UID ; Label ; Detail
/// Returns the number of records written.
pub fn export_summary_csv(summary: &ReconcileSummary, path: &Path) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)
        .map_err(io::Error::from)?;

    wtr.write_record(["Entity", "Change", "UID", "Label", "Detail"])
        .map_err(io::Error::from)?;

    let mut written = 0;
    for kind in EntityKind::ALL {
        let s = summary.get(kind);
        let entity = kind.title();
        let mut rows: Vec<[String; 5]> = Vec::new();

        for u in &s.updated {
            rows.push(record_row(
                entity,
                "updated",
                &u.record.uid,
                u.record.label.as_deref(),
                u.changes.join(", "),
            ));
        }
        for (change, records) in [
            ("inserted", &s.inserted),
            ("deleted", &s.deleted),
            ("kept (old)", &s.kept_old),
        ] {
            for r in records {
                rows.push(record_row(entity, change, &r.uid, r.label.as_deref(), String::new()));
            }
        }
        for r in &s.skipped {
            rows.push(record_row(
                entity,
                "skipped",
                r.uid.as_deref().unwrap_or(""),
                r.label.as_deref(),
                r.reason.to_string(),
            ));
        }

        for row in &rows {
            wtr.write_record(row).map_err(io::Error::from)?;
        }
        written += rows.len();
    }

    wtr.flush()?;
    Ok(written)
}

fn record_row(
    entity: &str,
    change: &str,
    uid: &str,
    label: Option<&str>,
    detail: String,
) -> [String; 5] {
    [
        entity.to_string(),
        change.to_string(),
        uid.to_string(),
        label.unwrap_or("").to_string(),
        detail,
    ]
}
