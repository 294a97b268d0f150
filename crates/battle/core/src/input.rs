//! Reference-counted input lock.
//!
//! Several systems may hold the lock at once; input is accepted only when no
//! source holds it. Releasing a source that is not held is a logged no-op.

use std::collections::BTreeMap;

use tracing::{debug, warn};

/// Who is holding the input lock.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum LockSource {
    TurnTransition,
    AbilityExecution,
    PresentationPlaying,
    AiThinking,
}

type LockListener = Box<dyn FnMut(bool)>;

#[derive(Default)]
pub struct InputLock {
    counts: BTreeMap<LockSource, u32>,
    listeners: Vec<LockListener>,
}

impl InputLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, source: LockSource) {
        let was_locked = self.is_locked();
        let count = self.counts.entry(source).or_insert(0);
        *count += 1;
        debug!(%source, count = *count, "input locked");
        if !was_locked {
            self.notify(true);
        }
    }

    pub fn release(&mut self, source: LockSource) {
        let was_locked = self.is_locked();
        match self.counts.get_mut(&source) {
            Some(count) if *count > 0 => {
                *count -= 1;
                debug!(%source, remaining = *count, "input lock released");
                if *count == 0 {
                    self.counts.remove(&source);
                }
            }
            _ => {
                warn!(%source, "tried to release an input lock that is not held");
                return;
            }
        }
        if was_locked && !self.is_locked() {
            self.notify(false);
        }
    }

    pub fn force_unlock_all(&mut self) {
        if self.counts.is_empty() {
            return;
        }
        warn!(sources = self.counts.len(), "force unlocking all input locks");
        self.counts.clear();
        self.notify(false);
    }

    pub fn is_locked(&self) -> bool {
        self.counts.values().any(|count| *count > 0)
    }

    pub fn is_locked_by(&self, source: LockSource) -> bool {
        self.counts.get(&source).is_some_and(|count| *count > 0)
    }

    /// Listener is called with the new state on every locked/unlocked edge.
    pub fn on_change(&mut self, listener: impl FnMut(bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// e.g. `"ai_thinking(1), presentation_playing(2)"` or `"unlocked"`.
    pub fn debug_summary(&self) -> String {
        if !self.is_locked() {
            return "unlocked".to_owned();
        }
        self.counts
            .iter()
            .map(|(source, count)| format!("{source}({count})"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn notify(&mut self, locked: bool) {
        for listener in &mut self.listeners {
            listener(locked);
        }
    }
}
