//! Display status of a build node.
//!
//! The feed supplies a handful of overlapping boolean flags. They are folded
//! into a single [`Status`] exactly once per node, by walking an ordered rule
//! list where the first matching rule wins. Everything downstream (animation,
//! info boxes, rendering) only ever looks at the resulting [`Status`].

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::record::NodeRecord;

pub const TEXT_NOT_STARTED: &str = "Not yet started";
pub const TEXT_PARENT_FAILED: &str = "A parent build failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Inactive,
    Failed,
    RunningButFailed,
    Running,
    Succeeded,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Inactive => "inactive",
            Status::Failed => "failed",
            Status::RunningButFailed => "runningButFailed",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
        }
    }

    /// The build is still executing, whether or not it has failed already.
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running | Status::RunningButFailed)
    }

    /// Nothing is happening on this node and nothing needs attention.
    pub fn is_settled(self) -> bool {
        matches!(self, Status::Succeeded | Status::Inactive)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub status_text: String,
}

struct Rule {
    matches: fn(&NodeRecord) -> bool,
    status: Status,
    /// Overrides the supplied status text when it returns `Some`.
    text: fn(&NodeRecord) -> Option<&'static str>,
}

fn keep_text(_: &NodeRecord) -> Option<&'static str> {
    None
}

/// Precedence is part of the contract: flags overlap in real data.
const RULES: [Rule; 4] = [
    Rule {
        matches: |r| r.inactive,
        status: Status::Inactive,
        text: |_| Some(TEXT_NOT_STARTED),
    },
    Rule {
        matches: |r| r.failed,
        status: Status::Failed,
        text: |r| r.failed_dependency.then_some(TEXT_PARENT_FAILED),
    },
    Rule {
        matches: |r| r.failed_but_still_running,
        status: Status::RunningButFailed,
        text: keep_text,
    },
    Rule {
        matches: |r| r.running,
        status: Status::Running,
        text: keep_text,
    },
];

/// Map a record's raw flags to its display status and status text.
pub fn classify(record: &NodeRecord) -> Classification {
    let rule = RULES.iter().find(|rule| (rule.matches)(record));

    match rule {
        Some(rule) => Classification {
            status: rule.status,
            status_text: (rule.text)(record)
                .map(str::to_owned)
                .unwrap_or_else(|| record.status_text.clone()),
        },
        None => Classification {
            status: Status::Succeeded,
            status_text: record.status_text.clone(),
        },
    }
}
