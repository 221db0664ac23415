use crate::core::Step;
use crate::playback::listeners::{
    Listener, ListenerRegistry, NotificationQueue, Subscription, Unsubscribe,
};
use crate::playback::{PlaybackConfig, PlaybackState};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Playback engine for algorithm traces
///
/// Sole owner and mutator of a [`PlaybackState`]. Every command that changes
/// the state notifies each subscriber exactly once with the updated state;
/// commands that change nothing notify nobody. Notifications are delivered in
/// mutation order: a command issued from inside a listener is delivered to
/// everyone after the current round finishes.
///
/// While playing, a tokio task advances one step per `base_delay / speed`.
/// An engine built outside a runtime has no timer: `play()` still flips
/// `is_playing` and the host advances playback by calling [`tick`](Self::tick)
/// once per period.
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    config: PlaybackConfig,
    runtime: Option<Handle>,
}

struct Shared {
    inner: Mutex<Inner>,
    notifications: NotificationQueue,
}

struct Inner {
    state: PlaybackState,
    listeners: ListenerRegistry,
    autoplay: Autoplay,
    destroyed: bool,
}

/// The armed autoplay task. Each arming gets a new epoch, and a tick whose
/// epoch is no longer current does nothing.
#[derive(Default)]
struct Autoplay {
    task: Option<JoinHandle<()>>,
    epoch: u64,
}

impl Autoplay {
    fn cancel(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `mutate` under the lock; if it reports a change, queue the new
    /// state while still holding the lock and deliver after releasing it.
    /// Returns whether anything changed.
    fn apply<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut Inner) -> bool,
    {
        {
            let mut inner = self.lock();
            if inner.destroyed || !mutate(&mut *inner) {
                return false;
            }
            self.notifications.push(inner.state.clone());
        }
        self.notifications.drain(|| self.lock().listeners.snapshot());
        true
    }
}

impl Unsubscribe for Shared {
    fn unsubscribe(&self, id: u64) -> bool {
        self.lock().listeners.remove(id)
    }
}

impl Inner {
    /// One autoplay step. Reaching the last index without looping stops playback
    /// in the same mutation.
    fn advance(&mut self) -> bool {
        if !self.state.is_playing {
            return false;
        }

        let last = self.state.last_index();
        if self.state.steps.is_empty() {
            self.stop();
        } else if self.state.current_index < last {
            self.state.current_index += 1;
            if self.state.current_index == last && !self.state.looping {
                self.stop();
            }
        } else if self.state.looping {
            // a one-step loop has nowhere to go
            if self.state.current_index == 0 {
                return false;
            }
            self.state.current_index = 0;
        } else {
            self.stop();
        }

        tracing::trace!(
            index = self.state.current_index,
            playing = self.state.is_playing,
            "Autoplay tick"
        );
        true
    }

    fn stop(&mut self) {
        self.state.is_playing = false;
        self.autoplay.cancel();
    }
}

async fn run_autoplay(shared: Weak<Shared>, epoch: u64, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(shared) = shared.upgrade() else {
            break;
        };

        let mut keep_going = false;
        shared.apply(|inner| {
            if inner.autoplay.epoch != epoch {
                return false;
            }
            let changed = inner.advance();
            keep_going = inner.state.is_playing;
            changed
        });

        if !keep_going {
            break;
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    /// Create an engine that arms its timer on the current tokio runtime, if any
    pub fn with_config(config: PlaybackConfig) -> Self {
        Self::with_runtime(config, Handle::try_current().ok())
    }

    /// Create an engine with an explicit runtime for the autoplay timer.
    /// `None` leaves ticking to the host.
    pub fn with_runtime(config: PlaybackConfig, runtime: Option<Handle>) -> Self {
        let config = config.normalized();
        let state = PlaybackState {
            speed: config.clamp_speed(config.initial_speed),
            looping: config.loop_playback,
            ..PlaybackState::default()
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    listeners: ListenerRegistry::default(),
                    autoplay: Autoplay::default(),
                    destroyed: false,
                }),
                notifications: NotificationQueue::default(),
            }),
            config,
            runtime,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Replace the trace, rewinding to the first step and pausing
    pub fn load_steps(&self, steps: Vec<Step>) {
        self.load_steps_if(steps, || true);
    }

    /// Load `steps` only if `guard` still holds once the engine lock is taken
    pub(crate) fn load_steps_if<G>(&self, steps: Vec<Step>, guard: G) -> bool
    where
        G: FnOnce() -> bool,
    {
        let count = steps.len();
        let loaded = self.shared.apply(|inner| {
            if !guard() {
                return false;
            }
            inner.autoplay.cancel();
            inner.state.steps = Arc::from(steps);
            inner.state.current_index = 0;
            inner.state.is_playing = false;
            true
        });

        if loaded {
            tracing::debug!(steps = count, "Loaded steps");
        }
        loaded
    }

    /// Start autoplay. Does nothing when empty or already playing.
    pub fn play(&self) {
        let started = self.shared.apply(|inner| {
            if inner.state.steps.is_empty() || inner.state.is_playing {
                return false;
            }
            inner.state.is_playing = true;
            self.arm(inner);
            true
        });

        if started {
            tracing::debug!("Playback started");
        }
    }

    /// Pause playback
    pub fn pause(&self) {
        let paused = self.shared.apply(|inner| {
            if !inner.state.is_playing {
                return false;
            }
            inner.stop();
            true
        });

        if paused {
            tracing::debug!("Playback paused");
        }
    }

    /// Step forward by one frame, wrapping to the start when looping
    pub fn step_forward(&self) {
        self.shared.apply(|inner| {
            let state = &mut inner.state;
            if state.current_index < state.last_index() {
                state.current_index += 1;
                true
            } else if state.looping && state.current_index != 0 {
                state.current_index = 0;
                true
            } else {
                false
            }
        });
    }

    /// Step backward by one frame
    pub fn step_backward(&self) {
        self.shared.apply(|inner| {
            if inner.state.current_index == 0 {
                return false;
            }
            inner.state.current_index -= 1;
            true
        });
    }

    /// Seek to a step index, clamped into range. Leaves play/pause untouched.
    pub fn go_to_step(&self, index: usize) {
        self.shared.apply(|inner| {
            let target = index.min(inner.state.last_index());
            if target == inner.state.current_index {
                return false;
            }
            inner.state.current_index = target;
            true
        });
    }

    /// Set playback speed. Out-of-range values are clamped; while playing
    /// the timer is re-armed with the new period.
    pub fn set_speed(&self, speed: f64) {
        let speed = self.config.clamp_speed(speed);
        let changed = self.shared.apply(|inner| {
            if inner.state.speed == speed {
                return false;
            }
            inner.state.speed = speed;
            if inner.state.is_playing {
                self.arm(inner);
            }
            true
        });

        if changed {
            tracing::debug!(speed, "Playback speed changed");
        }
    }

    pub fn toggle_loop(&self) {
        self.shared.apply(|inner| {
            inner.state.looping = !inner.state.looping;
            true
        });
    }

    /// Pause and rewind to the first step, as a single change
    pub fn reset(&self) {
        self.shared.apply(|inner| {
            let mut changed = false;
            if inner.state.is_playing {
                inner.stop();
                changed = true;
            }
            if inner.state.current_index != 0 {
                inner.state.current_index = 0;
                changed = true;
            }
            changed
        });
    }

    /// Advance autoplay by one tick. Hosts without a tokio runtime call this
    /// once per period while playing. Does nothing when the engine has its
    /// own timer.
    pub fn tick(&self) {
        if self.runtime.is_some() {
            return;
        }
        self.shared.apply(|inner| inner.advance());
    }

    /// Get the step at the current position
    pub fn current_step(&self) -> Option<Step> {
        self.shared.lock().state.current_step().cloned()
    }

    /// Snapshot of the full playback state
    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state.clone()
    }

    pub fn position(&self) -> usize {
        self.shared.lock().state.current_index
    }

    pub fn len(&self) -> usize {
        self.shared.lock().state.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().state.is_playing
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    /// Current autoplay period
    pub fn interval(&self) -> Duration {
        self.config.interval_for(self.shared.lock().state.speed)
    }

    /// Register a listener called after every state change
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackState) + Send + Sync + 'static,
    {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return Subscription::inert();
        }
        let id = inner.listeners.add(Arc::new(listener) as Listener);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        Subscription::new(id, weak)
    }

    /// Cancel the timer and drop all listeners. Later calls are no-ops.
    pub fn destroy(&self) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.state.is_playing = false;
        inner.autoplay.cancel();
        inner.listeners.clear();
        tracing::debug!("Playback engine destroyed");
    }

    fn arm(&self, inner: &mut Inner) {
        inner.autoplay.cancel();

        let Some(runtime) = self.runtime.as_ref() else {
            tracing::debug!("No runtime for autoplay timer, waiting for host ticks");
            return;
        };

        let interval = self.config.interval_for(inner.state.speed);
        let task = runtime.spawn(run_autoplay(
            Arc::downgrade(&self.shared),
            inner.autoplay.epoch,
            interval,
        ));
        inner.autoplay.task = Some(task);
        tracing::debug!(?interval, "Autoplay timer armed");
    }

    #[cfg(test)]
    fn timer_armed(&self) -> bool {
        self.shared.lock().autoplay.task.is_some()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepKind;
    use crate::playback::MIN_SPEED_FLOOR;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn steps(n: usize) -> Vec<Step> {
        (0..n)
            .map(|i| Step::new(format!("s{}", i), StepKind::Iteration, format!("step {}", i)))
            .collect()
    }

    fn fast_config() -> PlaybackConfig {
        PlaybackConfig {
            base_delay_ms: 100,
            ..Default::default()
        }
    }

    /// Engine driven only by explicit ticks
    fn manual_engine(n: usize) -> PlaybackEngine {
        let engine = PlaybackEngine::with_runtime(fast_config(), None);
        engine.load_steps(steps(n));
        engine
    }

    fn record(engine: &PlaybackEngine) -> (Arc<Mutex<Vec<PlaybackState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = engine.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        (seen, sub)
    }

    fn assert_in_bounds(engine: &PlaybackEngine) {
        let state = engine.state();
        assert!(state.current_index < state.steps.len().max(1));
    }

    #[test]
    fn test_fresh_engine_state() {
        let engine = PlaybackEngine::with_runtime(PlaybackConfig::default(), None);
        let state = engine.state();
        assert!(state.steps.is_empty());
        assert_eq!(state.current_index, 0);
        assert!(!state.is_playing);
        assert_eq!(state.speed, 1.0);
        assert!(!state.looping);
        assert!(engine.current_step().is_none());
    }

    #[test]
    fn test_index_stays_in_bounds() {
        let engine = manual_engine(4);
        for _ in 0..10 {
            engine.step_forward();
            assert_in_bounds(&engine);
        }
        assert_eq!(engine.position(), 3);

        for _ in 0..10 {
            engine.step_backward();
            assert_in_bounds(&engine);
        }
        assert_eq!(engine.position(), 0);

        engine.go_to_step(usize::MAX);
        assert_eq!(engine.position(), 3);
        assert_in_bounds(&engine);

        let empty = manual_engine(0);
        empty.go_to_step(5);
        empty.step_forward();
        empty.step_backward();
        assert_eq!(empty.position(), 0);
    }

    #[test]
    fn test_play_on_empty_is_noop() {
        let engine = manual_engine(0);
        let (seen, _sub) = record(&engine);
        engine.play();
        assert!(!engine.is_playing());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pause_is_idempotent() {
        let engine = manual_engine(3);
        let (seen, _sub) = record(&engine);
        engine.play();
        engine.pause();
        let after_one = engine.state();
        engine.pause();

        assert_eq!(engine.state(), after_one);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_manual_ticks_stop_at_end() {
        let engine = manual_engine(3);
        engine.play();
        engine.tick();
        engine.tick();
        assert_eq!(engine.position(), 2);
        assert!(!engine.is_playing());

        let before = engine.state();
        engine.tick();
        assert_eq!(engine.state(), before);
    }

    #[test]
    fn test_manual_ticks_wrap_when_looping() {
        let engine = manual_engine(3);
        engine.toggle_loop();
        engine.play();
        for _ in 0..3 {
            engine.tick();
        }
        assert_eq!(engine.position(), 0);
        assert!(engine.is_playing());
    }

    #[test]
    fn test_step_forward_wraps_only_when_looping() {
        let engine = manual_engine(2);
        engine.go_to_step(1);
        engine.step_forward();
        assert_eq!(engine.position(), 1);

        engine.toggle_loop();
        engine.step_forward();
        assert_eq!(engine.position(), 0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_load_resets_position_mid_playback() {
        let engine = manual_engine(5);
        engine.go_to_step(3);
        engine.play();

        engine.load_steps(steps(2));
        let state = engine.state();
        assert_eq!(state.current_index, 0);
        assert!(!state.is_playing);
        assert_eq!(state.steps.len(), 2);
    }

    #[test]
    fn test_set_speed_clamps() {
        let engine = manual_engine(3);
        engine.set_speed(0.0);
        assert_eq!(engine.state().speed, 0.1);
        engine.set_speed(-5.0);
        assert_eq!(engine.state().speed, 0.1);
        engine.set_speed(1000.0);
        assert_eq!(engine.state().speed, 10.0);
        engine.set_speed(2.0);
        assert_eq!(engine.interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_each_change_notifies_exactly_once() {
        let engine = manual_engine(4);
        let (seen, _sub) = record(&engine);
        let count = || seen.lock().unwrap().len();

        engine.play();
        assert_eq!(count(), 1);
        engine.pause();
        assert_eq!(count(), 2);
        engine.step_forward();
        assert_eq!(count(), 3);
        engine.step_backward();
        assert_eq!(count(), 4);
        engine.go_to_step(2);
        assert_eq!(count(), 5);
        engine.set_speed(3.0);
        assert_eq!(count(), 6);
        engine.toggle_loop();
        assert_eq!(count(), 7);
        engine.reset();
        assert_eq!(count(), 8);
        engine.load_steps(steps(3));
        assert_eq!(count(), 9);

        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last, engine.state());
    }

    #[test]
    fn test_noop_commands_do_not_notify() {
        let engine = manual_engine(3);
        let (seen, _sub) = record(&engine);

        engine.step_backward();
        engine.pause();
        engine.go_to_step(0);
        engine.set_speed(1.0);
        engine.reset();
        engine.tick();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reset_notifies_once() {
        let engine = manual_engine(4);
        engine.go_to_step(2);
        engine.play();
        let (seen, _sub) = record(&engine);

        engine.reset();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].current_index, 0);
        assert!(!seen[0].is_playing);
    }

    #[test]
    fn test_listener_sees_complete_state() {
        let engine = manual_engine(3);
        let (seen, _sub) = record(&engine);
        engine.toggle_loop();
        engine.go_to_step(2);

        let seen = seen.lock().unwrap();
        assert!(seen[0].looping);
        assert_eq!(seen[1].current_index, 2);
        assert!(seen[1].looping);
    }

    #[test]
    fn test_every_subscriber_notified() {
        let engine = manual_engine(3);
        let hits = Arc::new(AtomicUsize::new(0));
        let subs: Vec<_> = (0..3)
            .map(|_| {
                let hits = hits.clone();
                engine.subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        engine.step_forward();
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        subs[1].unsubscribe();
        engine.step_forward();
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_listener_may_call_back_into_engine() {
        let engine = Arc::new(manual_engine(5));
        let weak = Arc::downgrade(&engine);
        let _sub = engine.subscribe(move |state| {
            if state.current_index == 1 {
                if let Some(engine) = weak.upgrade() {
                    engine.go_to_step(3);
                }
            }
        });

        engine.step_forward();
        assert_eq!(engine.position(), 3);
    }

    #[test]
    fn test_reentrant_command_reaches_later_listeners_in_order() {
        let engine = Arc::new(manual_engine(5));
        let (before, _before_sub) = record(&engine);
        let weak = Arc::downgrade(&engine);
        let _jump = engine.subscribe(move |state| {
            if state.current_index == 1 {
                if let Some(engine) = weak.upgrade() {
                    engine.go_to_step(3);
                }
            }
        });
        let (after, _after_sub) = record(&engine);

        engine.step_forward();

        let indices = |seen: &Arc<Mutex<Vec<PlaybackState>>>| -> Vec<usize> {
            seen.lock().unwrap().iter().map(|s| s.current_index).collect()
        };
        assert_eq!(indices(&before), vec![1, 3]);
        assert_eq!(indices(&after), vec![1, 3]);
        assert_eq!(engine.position(), 3);
    }

    #[test]
    fn test_commands_from_many_threads_end_on_final_state() {
        let engine = manual_engine(8);
        let (seen, _sub) = record(&engine);

        std::thread::scope(|scope| {
            for offset in 0..4 {
                let engine = &engine;
                scope.spawn(move || {
                    for i in 0..50 {
                        engine.go_to_step((i + offset) % 8);
                        engine.toggle_loop();
                    }
                });
            }
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&engine.state()));
    }

    #[test]
    fn test_single_step_loop_ticks_quietly() {
        let engine = manual_engine(1);
        engine.toggle_loop();
        engine.play();
        let (seen, _sub) = record(&engine);

        for _ in 0..3 {
            engine.tick();
        }

        assert!(seen.lock().unwrap().is_empty());
        assert!(engine.is_playing());
        assert_eq!(engine.position(), 0);
    }

    #[test]
    fn test_degenerate_speed_floor_is_normalized() {
        for min_speed in [1e-300, 0.0, -1.0, f64::NAN] {
            let config = PlaybackConfig {
                min_speed,
                ..fast_config()
            };
            let engine = PlaybackEngine::with_runtime(config, None);
            engine.load_steps(steps(3));
            engine.set_speed(0.0);
            engine.play();

            assert_eq!(engine.state().speed, MIN_SPEED_FLOOR);
            let interval = engine.interval().as_secs_f64();
            assert!((interval - 10.0).abs() < 1e-6, "interval {}s", interval);
        }
    }

    #[test]
    fn test_destroy_is_safe_and_idempotent() {
        let engine = manual_engine(3);
        let (seen, sub) = record(&engine);
        engine.destroy();
        engine.destroy();

        engine.play();
        engine.step_forward();
        engine.go_to_step(2);
        engine.set_speed(4.0);
        engine.toggle_loop();
        engine.reset();
        engine.load_steps(steps(7));
        engine.tick();
        sub.unsubscribe();

        assert!(engine.is_destroyed());
        assert!(!engine.is_playing());
        assert_eq!(engine.len(), 3);
        assert!(seen.lock().unwrap().is_empty());
        assert!(!engine.subscribe(|_| {}).is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_stops_at_end() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(3));
        let (seen, _sub) = record(&engine);

        engine.play();
        assert!(engine.timer_armed());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(engine.position(), 1);
        assert!(engine.is_playing());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.position(), 2);
        assert!(!engine.is_playing());
        assert!(!engine.timer_armed());

        let notified = seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(engine.position(), 2);
        assert_eq!(seen.lock().unwrap().len(), notified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_loops() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(3));
        engine.toggle_loop();
        engine.play();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(engine.position(), 0);
        assert!(engine.is_playing());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_rearms_timer() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(10));

        let start = tokio::time::Instant::now();
        let ticks = Arc::new(Mutex::new(Vec::<(usize, Duration)>::new()));
        let sink = ticks.clone();
        let _sub = engine.subscribe(move |state| {
            let mut ticks = sink.lock().unwrap();
            if ticks.last().map(|(i, _)| *i) != Some(state.current_index) && state.current_index > 0 {
                ticks.push((state.current_index, start.elapsed()));
            }
        });

        engine.play();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(engine.position(), 2);

        engine.set_speed(2.0);
        tokio::time::sleep(Duration::from_millis(175)).await;
        assert_eq!(engine.position(), 5);

        let ticks = ticks.lock().unwrap();
        let indices: Vec<usize> = ticks.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        let expected = [100u128, 100, 50, 50];
        for (window, want) in ticks.windows(2).zip(expected) {
            let gap = (window[1].1 - window[0].1).as_millis();
            assert!(gap.abs_diff(want) <= 1, "gap {}ms, expected {}ms", gap, want);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_runs_at_speed_floor() {
        let config = PlaybackConfig {
            min_speed: 1e-300,
            ..fast_config()
        };
        let engine = PlaybackEngine::with_config(config);
        engine.load_steps(steps(3));
        engine.set_speed(0.0);
        engine.play();
        assert!(engine.timer_armed());

        tokio::time::sleep(Duration::from_millis(9_000)).await;
        assert_eq!(engine.position(), 0);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(engine.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_tick_ignored_while_timer_runs() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(5));
        engine.play();

        engine.tick();
        engine.tick();
        assert_eq!(engine.position(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(engine.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_timer() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(5));
        engine.play();
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.pause();
        assert!(!engine.timer_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.position(), 1);
        assert!(!engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_autoplay() {
        let engine = PlaybackEngine::with_config(fast_config());
        engine.load_steps(steps(5));
        engine.play();
        engine.destroy();
        engine.play();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.position(), 0);
        assert!(!engine.is_playing());
    }
}
