use crate::core::{Step, TraceProducer};
use crate::error::TraceError;
use crate::playback::{PlaybackConfig, PlaybackEngine, PlaybackState, Subscription};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// Details of the trace currently shown by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTrace {
    pub solution: String,
    pub generation: u64,
    pub step_count: usize,
    pub truncated: bool,
    pub loaded_at: DateTime<Utc>,
}

/// What happened to a successful trace computation
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<R> {
    /// The trace was loaded into the engine
    Loaded { generation: u64, result: R },
    /// A newer request started first; the trace was dropped
    Superseded { generation: u64, result: R },
    /// The controller was destroyed before the trace could be loaded
    Disposed,
}

impl<R> LoadOutcome<R> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            LoadOutcome::Loaded { result, .. } | LoadOutcome::Superseded { result, .. } => Some(result),
            LoadOutcome::Disposed => None,
        }
    }

    pub fn into_result(self) -> Option<R> {
        match self {
            LoadOutcome::Loaded { result, .. } | LoadOutcome::Superseded { result, .. } => Some(result),
            LoadOutcome::Disposed => None,
        }
    }
}

/// Front door for a presentation layer
///
/// Runs solutions to produce traces, loads the winning trace into its
/// [`PlaybackEngine`], and forwards playback commands. Cloning yields another
/// handle to the same engine and generation counter.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    engine: PlaybackEngine,
    /// Token of the most recent load request
    generation: AtomicU64,
    disposed: AtomicBool,
    last_load: Mutex<Option<LoadedTrace>>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        Self::from_engine(PlaybackEngine::with_config(config))
    }

    /// Controller whose autoplay runs on `runtime`, or on host ticks when `None`
    pub fn with_runtime(config: PlaybackConfig, runtime: Option<Handle>) -> Self {
        Self::from_engine(PlaybackEngine::with_runtime(config, runtime))
    }

    fn from_engine(engine: PlaybackEngine) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                generation: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                last_load: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        self.inner.engine.config()
    }

    /// Token issued to the most recent load request
    pub fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn last_load(&self) -> Option<LoadedTrace> {
        self.inner
            .last_load
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run `solution` against `input` and load the resulting trace
    ///
    /// The generation token is taken when this is called, not when the future
    /// is first polled. The trace is only loaded if no later request has been
    /// issued by the time it is ready, whatever order requests complete in.
    /// A failure is returned to the caller and leaves the loaded trace alone.
    pub fn execute_solution<P>(
        &self,
        solution: Arc<P>,
        input: P::Input,
    ) -> impl Future<Output = Result<LoadOutcome<P::Output>, TraceError>> + Send + 'static
    where
        P: TraceProducer,
    {
        let inner = self.inner.clone();
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        async move {
            if inner.disposed.load(Ordering::SeqCst) {
                return Ok(LoadOutcome::Disposed);
            }

            let name = solution.name().to_owned();
            tracing::debug!(solution = %name, generation, "Producing trace");

            let produced = tokio::task::spawn_blocking(move || solution.execute(&input))
                .await
                .unwrap_or_else(|e| Err(TraceError::Aborted(e.to_string())));

            let trace = match produced {
                Ok(trace) => trace,
                Err(e) => {
                    tracing::warn!(solution = %name, generation, error = %e, "Trace production failed");
                    return Err(e);
                }
            };

            let step_count = trace.steps.len();
            let truncated = trace.truncated;
            let applied = inner.engine.load_steps_if(trace.steps, || {
                inner.generation.load(Ordering::SeqCst) == generation
            });

            if applied {
                tracing::info!(solution = %name, generation, steps = step_count, "Trace loaded");
                inner.record_load(LoadedTrace {
                    solution: name,
                    generation,
                    step_count,
                    truncated,
                    loaded_at: Utc::now(),
                });
                Ok(LoadOutcome::Loaded {
                    generation,
                    result: trace.result,
                })
            } else if inner.engine.is_destroyed() {
                Ok(LoadOutcome::Disposed)
            } else {
                tracing::debug!(solution = %name, generation, "Discarding stale trace");
                Ok(LoadOutcome::Superseded {
                    generation,
                    result: trace.result,
                })
            }
        }
    }

    /// Load steps directly. Any request still in flight becomes stale.
    pub fn load_steps(&self, steps: Vec<Step>) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let step_count = steps.len();
        let applied = self.inner.engine.load_steps_if(steps, || {
            self.inner.generation.load(Ordering::SeqCst) == generation
        });
        if applied {
            self.inner.record_load(LoadedTrace {
                solution: String::new(),
                generation,
                step_count,
                truncated: false,
                loaded_at: Utc::now(),
            });
        }
    }

    pub fn play(&self) {
        self.inner.engine.play();
    }

    pub fn pause(&self) {
        self.inner.engine.pause();
    }

    pub fn step_forward(&self) {
        self.inner.engine.step_forward();
    }

    pub fn step_backward(&self) {
        self.inner.engine.step_backward();
    }

    pub fn go_to_step(&self, index: usize) {
        self.inner.engine.go_to_step(index);
    }

    pub fn set_speed(&self, speed: f64) {
        self.inner.engine.set_speed(speed);
    }

    pub fn toggle_loop(&self) {
        self.inner.engine.toggle_loop();
    }

    pub fn reset(&self) {
        self.inner.engine.reset();
    }

    /// Advance autoplay by one tick, for hosts without a tokio runtime.
    /// Does nothing when the engine runs its own timer.
    pub fn tick(&self) {
        self.inner.engine.tick();
    }

    pub fn current_step(&self) -> Option<Step> {
        self.inner.engine.current_step()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.engine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.engine.is_playing()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackState) + Send + Sync + 'static,
    {
        self.inner.engine.subscribe(listener)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Stop playback and tear down the engine. Safe to call repeatedly.
    pub fn destroy(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.engine.pause();
        self.inner.engine.destroy();
    }
}

impl ControllerInner {
    fn record_load(&self, load: LoadedTrace) {
        let mut last = self.last_load.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref().map_or(true, |prev| prev.generation < load.generation) {
            *last = Some(load);
        }
    }
}
