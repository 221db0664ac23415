use crate::core::step::{Step, StepKind};
use crate::error::TraceError;
use serde_json::Value;

/// Default cap on the number of steps a single trace may record
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// The full output of one solution run: ordered steps plus the final result
#[derive(Debug, Clone)]
pub struct Trace<R> {
    pub steps: Vec<Step>,
    pub result: R,
    /// Set when the step cap cut recording short
    pub truncated: bool,
}

impl<R> Trace<R> {
    pub fn new(steps: Vec<Step>, result: R) -> Self {
        Self {
            steps,
            result,
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A solution that can narrate its own execution
///
/// Implementations must be pure with respect to playback state and must
/// terminate for every input. Bound any loop that could cycle (for example
/// walking a linked list with a back edge) with [`TraceBuilder::is_full`].
pub trait TraceProducer: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Display name of the solution
    fn name(&self) -> &str;

    /// Run the solution against `input` and record every step
    fn execute(&self, input: &Self::Input) -> Result<Trace<Self::Output>, TraceError>;
}

/// Records steps for a trace, assigning ids and enforcing a step cap
pub struct TraceBuilder {
    steps: Vec<Step>,
    cap: usize,
    dropped: usize,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl TraceBuilder {
    pub fn new(cap: usize) -> Self {
        Self {
            steps: Vec::new(),
            cap: cap.max(1),
            dropped: 0,
        }
    }

    /// Start recording a step. Once the cap is reached the draft is discarded.
    pub fn record(&mut self, kind: StepKind, description: impl Into<String>) -> StepDraft<'_> {
        let id = format!("step-{}", self.steps.len());
        StepDraft {
            builder: self,
            step: Some(Step::new(id, kind, description)),
        }
    }

    /// True once no more steps will be recorded
    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Finish the trace with the solution's result
    pub fn finish<R>(self, result: R) -> Trace<R> {
        Trace {
            steps: self.steps,
            result,
            truncated: self.dropped > 0,
        }
    }

    fn push(&mut self, step: Step) {
        if self.is_full() {
            if self.dropped == 0 {
                tracing::warn!(cap = self.cap, "Step cap reached, dropping further steps");
            }
            self.dropped += 1;
            return;
        }
        self.steps.push(step);
    }
}

/// A step being recorded; committed to the builder when dropped
pub struct StepDraft<'a> {
    builder: &'a mut TraceBuilder,
    step: Option<Step>,
}

impl StepDraft<'_> {
    pub fn line(mut self, line: u32) -> Self {
        if let Some(step) = self.step.as_mut() {
            step.source_line = Some(line);
        }
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        if let Some(step) = self.step.as_mut() {
            step.payload = payload;
        }
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.step = self.step.take().map(|step| step.with_variable(name, value));
        self
    }
}

impl Drop for StepDraft<'_> {
    fn drop(&mut self) {
        if let Some(step) = self.step.take() {
            self.builder.push(step);
        }
    }
}
