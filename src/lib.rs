//! Step-by-step playback of algorithm execution traces.
//!
//! A [`TraceProducer`] runs a solution against an input and records an
//! ordered list of [`Step`]s. A [`PlaybackController`] loads the newest such
//! trace into its [`PlaybackEngine`], which owns the current position and the
//! play/pause/seek/speed/loop state machine and notifies subscribers after
//! every change.

pub mod core;
pub mod error;
pub mod playback;

pub use crate::core::{Step, StepKind, Trace, TraceBuilder, TraceProducer, DEFAULT_MAX_STEPS};
pub use error::{ConfigError, TraceError};
pub use playback::{
    LoadOutcome, LoadedTrace, PlaybackConfig, PlaybackController, PlaybackEngine, PlaybackState,
    Subscription,
};
