//! Work items flowing down the line.

use crate::id::{PartId, PartType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of work with a fixed identity and an append-only processing history.
///
/// The history holds the names of the stages that completed work on the part,
/// in the order they did so. Only a stage finishing its cycle appends to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    id: PartId,
    part_type: PartType,
    history: Vec<String>,
}

impl Part {
    pub fn new(id: impl Into<PartId>, part_type: impl Into<PartType>) -> Self {
        Self {
            id: id.into(),
            part_type: part_type.into(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &PartId {
        &self.id
    }

    pub fn part_type(&self) -> &PartType {
        &self.part_type
    }

    /// Names of the stages that processed this part, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Name of the stage that most recently completed work on this part.
    pub fn last_stage(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub(crate) fn record(&mut self, stage_name: &str) {
        self.history.push(stage_name.to_owned());
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Part({}, {})", self.id, self.part_type)
    }
}
