//! Task sheets exported from MS Project as text or workbook grids.

use crate::error::{ImportError, Result};
use crate::model::task::{DependencyKind, PredecessorLink};
use crate::model::value::{clean_text, parse_float, parse_int, parse_timestamp};
use crate::model::{ParsedProject, Sections, Task};

use super::duration::normalize_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Uid,
    Name,
    Wbs,
    OutlineLevel,
    Start,
    Finish,
    Duration,
    PercentComplete,
    ActualStart,
    ActualFinish,
    FixedCost,
    Notes,
    Predecessors,
    BaselineStart,
    BaselineFinish,
}

/// Normalize a header string to a canonical column key.
fn normalize_header(h: &str) -> String {
    h.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace([' ', '-', '_', '%'], "")
}

fn header_to_column(normalized: &str) -> Option<Column> {
    match normalized {
        "uniqueid" | "uid" | "taskuid" | "taskuniqueid" => Some(Column::Uid),
        "name" | "taskname" | "title" => Some(Column::Name),
        "wbs" | "wbscode" => Some(Column::Wbs),
        "outlinelevel" | "level" => Some(Column::OutlineLevel),
        "start" | "startdate" => Some(Column::Start),
        "finish" | "finishdate" | "end" | "enddate" => Some(Column::Finish),
        "duration" => Some(Column::Duration),
        "complete" | "percentcomplete" | "pctcomplete" => Some(Column::PercentComplete),
        "actualstart" => Some(Column::ActualStart),
        "actualfinish" => Some(Column::ActualFinish),
        "fixedcost" => Some(Column::FixedCost),
        "notes" | "note" | "comments" => Some(Column::Notes),
        "predecessors" | "uniqueidpredecessors" | "predecessoruids" => {
            Some(Column::Predecessors)
        }
        "baselinestart" | "baseline0start" => Some(Column::BaselineStart),
        "baselinefinish" | "baseline0finish" => Some(Column::BaselineFinish),
        _ => None,
    }
}

/// Parse a `Predecessors` cell such as `3,5SS+2d`. Lag is ignored; entries
/// without leading digits are dropped.
pub fn parse_predecessor_list(cell: &str) -> Vec<PredecessorLink> {
    cell.split([',', ';'])
        .filter_map(|token| {
            let token = token.trim();
            let digits_end = token
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(token.len());
            if digits_end == 0 {
                return None;
            }
            let rest = &token[digits_end..];
            let kind = rest
                .get(..2)
                .and_then(DependencyKind::from_abbrev)
                .unwrap_or(DependencyKind::FinishToStart);
            Some(PredecessorLink {
                predecessor_uid: token[..digits_end].to_string(),
                link_type: Some(kind.code()),
            })
        })
        .collect()
}

/// Parse a grid whose first row is the header. Yields tasks only.
pub fn parse_task_grid(grid: &[Vec<String>]) -> Result<ParsedProject> {
    let Some((header, rows)) = grid.split_first() else {
        return Err(ImportError::Parse("file is empty".into()));
    };

    let columns: Vec<Option<Column>> = header
        .iter()
        .map(|h| header_to_column(&normalize_header(h)))
        .collect();
    let has = |col: Column| columns.contains(&Some(col));
    if !has(Column::Uid) || !has(Column::Name) {
        let found: Vec<&str> = header.iter().map(String::as_str).collect();
        return Err(ImportError::Parse(format!(
            "missing required columns. Found headers: {:?}. Need columns for: Unique ID, Name.",
            found
        )));
    }

    let mut tasks = Vec::new();
    for row in rows {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        tasks.push(read_row(&columns, row));
    }

    Ok(ParsedProject {
        tasks,
        sections: Sections::TASKS_ONLY,
        ..Default::default()
    })
}

fn read_row(columns: &[Option<Column>], row: &[String]) -> Task {
    let mut task = Task::default();
    let mut wbs = None;
    let mut links = Vec::new();

    for (col, cell) in columns.iter().zip(row.iter()) {
        let Some(col) = col else { continue };
        match col {
            Column::Uid => task.uid = clean_text(cell),
            Column::Name => task.name = clean_text(cell),
            Column::Wbs => wbs = clean_text(cell),
            Column::OutlineLevel => task.outline_level = parse_int(cell),
            Column::Start => task.start = parse_timestamp(cell),
            Column::Finish => task.finish = parse_timestamp(cell),
            Column::Duration => task.duration = Some(normalize_duration(cell)),
            Column::PercentComplete => {
                task.percent_complete = parse_float(cell.trim().trim_end_matches('%'))
            }
            Column::ActualStart => task.actual_start = parse_timestamp(cell),
            Column::ActualFinish => task.actual_finish = parse_timestamp(cell),
            Column::FixedCost => {
                task.fixed_cost = parse_float(cell.trim().trim_start_matches(['$', '€', '£']))
            }
            Column::Notes => task.notes = clean_text(cell),
            Column::Predecessors => links = parse_predecessor_list(cell),
            Column::BaselineStart => task.baseline_start = parse_timestamp(cell),
            Column::BaselineFinish => task.baseline_finish = parse_timestamp(cell),
        }
    }

    task.set_wbs(wbs);
    task.set_predecessors(links);
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_predecessor_list() {
        let links = parse_predecessor_list("3, 5SS+2d;7ff; x; 9FS-1d");
        let pairs: Vec<(&str, Option<i64>)> = links
            .iter()
            .map(|l| (l.predecessor_uid.as_str(), l.link_type))
            .collect();
        assert_eq!(
            pairs,
            vec![("3", Some(1)), ("5", Some(3)), ("7", Some(0)), ("9", Some(1))]
        );
        assert!(parse_predecessor_list("").is_empty());
    }

    #[test]
    fn test_headers_match_synonyms() {
        let g = grid(&[
            &["Unique ID", "Task Name", "WBS", "% Complete", "Start", "Duration", "Predecessors"],
            &["4", "Build", "2.1", "25%", "1/15/2024 8:00 AM", "5 days", "1,2SS"],
            &["", "", "", "", "", "", ""],
            &["5", "Test", "", "", "", "", ""],
        ]);
        let project = parse_task_grid(&g).unwrap();
        assert_eq!(project.tasks.len(), 2);
        assert!(project.resources.is_empty());
        assert_eq!(project.sections, Sections::TASKS_ONLY);

        let build = &project.tasks[0];
        assert_eq!(build.uid.as_deref(), Some("4"));
        assert_eq!(build.parent_wbs.as_deref(), Some("2"));
        assert_eq!(build.percent_complete, Some(25.0));
        assert_eq!(
            build.start.map(|d| d.format("%Y-%m-%d %H:%M").to_string()).as_deref(),
            Some("2024-01-15 08:00")
        );
        assert_eq!(build.duration.as_deref(), Some("5 days"));
        assert_eq!(build.predecessors.len(), 2);
        assert!(build.has_predecessors);

        let test = &project.tasks[1];
        assert_eq!(test.wbs, None);
        assert_eq!(test.duration.as_deref(), Some("0 seconds"));
        assert!(!test.has_predecessors);
    }

    #[test]
    fn test_missing_required_column_lists_headers() {
        let g = grid(&[&["ID", "Task Name"], &["1", "Plan"]]);
        let err = parse_task_grid(&g).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"ID\""), "{}", msg);
        assert!(msg.contains("Unique ID"), "{}", msg);
    }

    #[test]
    fn test_empty_grid_is_error() {
        assert!(matches!(parse_task_grid(&[]), Err(ImportError::Parse(_))));
    }
}
