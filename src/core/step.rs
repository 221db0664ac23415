use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of operation a step illustrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Initialization,
    Comparison,
    Assignment,
    Iteration,
    Return,
    Custom,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Initialization => "initialization",
            StepKind::Comparison => "comparison",
            StepKind::Assignment => "assignment",
            StepKind::Iteration => "iteration",
            StepKind::Return => "return",
            StepKind::Custom => "custom",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of an algorithm trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Identifier, unique within its trace
    pub id: String,

    pub kind: StepKind,

    /// Narration shown alongside the frame
    pub description: String,

    /// Line of the displayed solution code to highlight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    /// Solution-defined render data. Never interpreted by the engine.
    #[serde(default)]
    pub payload: Value,

    /// Snapshot of solution-local variables at this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Value>>,
}

impl Step {
    /// Create a step with no payload, line or variables
    pub fn new(id: impl Into<String>, kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            description: description.into(),
            source_line: None,
            payload: Value::Null,
            variables: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.source_line = Some(line);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Add one variable to the snapshot, creating it if needed
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Look up a captured variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.as_ref().and_then(|vars| vars.get(name))
    }
}
