use serde::{Deserialize, Serialize};

use super::{Assignment, Resource, Task};

/// Which record kinds the source file actually describes.
///
/// A kind the file does not carry says nothing about the stored rows of that
/// kind, so reconciliation leaves them alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sections {
    pub tasks: bool,
    pub resources: bool,
    pub assignments: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Self::ALL
    }
}

impl Sections {
    pub const ALL: Sections = Sections {
        tasks: true,
        resources: true,
        assignments: true,
    };

    pub const TASKS_ONLY: Sections = Sections {
        tasks: true,
        resources: false,
        assignments: false,
    };
}

/// Everything read from one export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedProject {
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub sections: Sections,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCounts {
    pub tasks: usize,
    pub resources: usize,
    pub assignments: usize,
}

impl ParsedProject {
    pub fn counts(&self) -> ParsedCounts {
        ParsedCounts {
            tasks: self.tasks.len(),
            resources: self.resources.len(),
            assignments: self.assignments.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.resources.is_empty() && self.assignments.is_empty()
    }
}
