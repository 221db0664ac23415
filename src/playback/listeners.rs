use crate::playback::PlaybackState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Callback invoked with the post-mutation state
pub type Listener = Arc<dyn Fn(&PlaybackState) + Send + Sync>;

/// Registered listeners in subscription order
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Vec<(u64, Listener)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the current listeners, so dispatch can run without the engine lock
    pub fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}

/// Invoke every listener with the same state, in registration order
pub(crate) fn dispatch(listeners: &[Listener], state: &PlaybackState) {
    for listener in listeners {
        listener(state);
    }
}

/// Ordered delivery of post-mutation states
///
/// States are pushed in mutation order. Whichever call finds the queue idle
/// delivers everything pending; a call made meanwhile, from another thread or
/// from inside a listener, only enqueues. Each listener therefore sees states
/// in mutation order and ends on the latest one.
#[derive(Default)]
pub(crate) struct NotificationQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<PlaybackState>,
    draining: bool,
}

impl NotificationQueue {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, state: PlaybackState) {
        self.lock().pending.push_back(state);
    }

    /// Deliver pending states unless another call is already doing so.
    /// `listeners` is asked for the current listeners before each delivery.
    pub fn drain<F>(&self, listeners: F)
    where
        F: Fn() -> Vec<Listener>,
    {
        {
            let mut queue = self.lock();
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        let _reset = DrainReset(self);

        loop {
            let state = {
                let mut queue = self.lock();
                match queue.pending.pop_front() {
                    Some(state) => state,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };
            dispatch(&listeners(), &state);
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock().pending.len()
    }
}

/// Releases the drain flag if a listener panics mid-delivery
struct DrainReset<'a>(&'a NotificationQueue);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// Something a [`Subscription`] can detach itself from
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64) -> bool;
}

/// Handle returned by `subscribe`. The listener stays registered until
/// [`Subscription::unsubscribe`] is called or the engine is destroyed;
/// dropping the handle does not detach it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    source: Option<Weak<dyn Unsubscribe>>,
    active: Mutex<bool>,
}

impl Subscription {
    pub(crate) fn new(id: u64, source: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            source: Some(source),
            active: Mutex::new(true),
        }
    }

    /// A subscription that was never registered (e.g. made after destroy)
    pub(crate) fn inert() -> Self {
        Self {
            id: u64::MAX,
            source: None,
            active: Mutex::new(false),
        }
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !*active {
            return;
        }
        *active = false;
        if let Some(source) = self.source.as_ref().and_then(Weak::upgrade) {
            source.unsubscribe(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
