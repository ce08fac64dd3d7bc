//! Append-only event log for a scenario run.

use std::sync::{Arc, Mutex};

use kest_common::Event;

/// Shared handle to a scenario's event log.
///
/// Cloning a `Recorder` yields another handle to the same log; every part
/// of the engine (actions, retry loop, reverting stack, client wrappers)
/// holds one. Appending never fails and never blocks on I/O; the log lives
/// in memory for the scenario's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single event in program order.
    pub fn record(&self, event: Event) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    /// Snapshot of the full event sequence in insertion order.
    ///
    /// Later appends do not mutate a returned snapshot.
    pub fn events(&self) -> Vec<Event> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_insertion_order() {
        let recorder = Recorder::new();
        recorder.record(Event::ScenarioStart { name: "a".into() });
        recorder.record(Event::RetryStart);
        recorder.record(Event::ScenarioEnd);

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::ScenarioStart { name: "a".into() });
        assert_eq!(events[2], Event::ScenarioEnd);
    }

    #[test]
    fn snapshots_do_not_observe_later_appends() {
        let recorder = Recorder::new();
        recorder.record(Event::RetryStart);
        let snapshot = recorder.events();
        recorder.record(Event::ScenarioEnd);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(recorder.events().len(), 2);
    }

    #[test]
    fn clones_share_the_same_log() {
        let recorder = Recorder::new();
        let other = recorder.clone();
        other.record(Event::RetryStart);
        assert_eq!(recorder.len(), 1);
    }
}
