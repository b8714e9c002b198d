//! MS Project XML exports (`<Project>` with `Tasks`, `Resources`,
//! `Assignments` sections).

use crate::error::{ImportError, Result};
use crate::model::task::PredecessorLink;
use crate::model::value::{parse_float, parse_int, parse_timestamp};
use crate::model::{Assignment, ParsedProject, Resource, Sections, Task};

use super::duration::normalize_duration;
use super::xml::{parse_document, Element};

pub fn parse_project_xml(text: &str) -> Result<ParsedProject> {
    let root = parse_document(text)?;
    if root.name != "Project" {
        return Err(ImportError::Parse(format!(
            "expected a <Project> document, found <{}>",
            root.name
        )));
    }

    let tasks = section(&root, "Tasks", "Task").map(read_task).collect();
    let resources = section(&root, "Resources", "Resource")
        .map(read_resource)
        .collect();
    let assignments = section(&root, "Assignments", "Assignment")
        .map(read_assignment)
        .collect();

    let has = |container: &str| root.child(container).is_some();
    Ok(ParsedProject {
        tasks,
        resources,
        assignments,
        sections: Sections {
            tasks: has("Tasks"),
            resources: has("Resources"),
            assignments: has("Assignments"),
        },
    })
}

fn section<'a>(
    root: &'a Element,
    container: &'a str,
    item: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    root.children(container).flat_map(move |c| c.children(item))
}

fn read_task(el: &Element) -> Task {
    let mut task = Task {
        uid: el.child_text("UID"),
        name: el.child_text("Name"),
        outline_level: el.child_text("OutlineLevel").and_then(|s| parse_int(&s)),
        start: el.child_text("Start").and_then(|s| parse_timestamp(&s)),
        finish: el.child_text("Finish").and_then(|s| parse_timestamp(&s)),
        duration: el.child("Duration").map(|d| normalize_duration(&d.text)),
        percent_complete: el
            .child_text("PercentComplete")
            .and_then(|s| parse_float(&s)),
        actual_start: el.child_text("ActualStart").and_then(|s| parse_timestamp(&s)),
        actual_finish: el
            .child_text("ActualFinish")
            .and_then(|s| parse_timestamp(&s)),
        fixed_cost: el.child_text("FixedCost").and_then(|s| parse_float(&s)),
        notes: el.child_text("Notes"),
        ..Default::default()
    };
    task.set_wbs(el.child_text("WBS"));

    if let Some(baseline) = el
        .children("Baseline")
        .find(|b| b.child_text("Number").as_deref() == Some("0"))
    {
        task.baseline_start = baseline.child_text("Start").and_then(|s| parse_timestamp(&s));
        task.baseline_finish = baseline
            .child_text("Finish")
            .and_then(|s| parse_timestamp(&s));
    }

    let links = el
        .children("PredecessorLink")
        .filter_map(|link| {
            Some(PredecessorLink {
                predecessor_uid: link.child_text("PredecessorUID")?,
                link_type: link.child_text("Type").and_then(|s| parse_int(&s)),
            })
        })
        .collect();
    task.set_predecessors(links);
    task
}

fn read_resource(el: &Element) -> Resource {
    Resource {
        uid: el.child_text("UID"),
        row_id: el.child_text("ID"),
        name: el.child_text("Name"),
        type_code: el.child_text("Type"),
        max_units: el.child_text("MaxUnits").and_then(|s| parse_int(&s)),
        standard_rate: el.child_text("StandardRate").and_then(|s| parse_float(&s)),
    }
}

fn read_assignment(el: &Element) -> Assignment {
    Assignment {
        uid: el.child_text("UID"),
        task_uid: el.child_text("TaskUID"),
        resource_uid: el.child_text("ResourceUID"),
    }
}
