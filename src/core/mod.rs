pub mod step;
pub mod trace;

pub use step::{Step, StepKind};
pub use trace::{StepDraft, Trace, TraceBuilder, TraceProducer, DEFAULT_MAX_STEPS};
