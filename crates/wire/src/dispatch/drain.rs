use crate::channel::Remote;
use crate::tick::tick_reached;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainEntry {
    pub remote: Remote,
    pub disconnect_after_tick: u32,
}

/// Remotes being disconnected, held until their queued data has had time to
/// flush.
#[derive(Debug, Default)]
pub struct DisconnectDrainQueue {
    entries: Vec<DrainEntry>,
}

impl DisconnectDrainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, remote: Remote, disconnect_after_tick: u32) {
        if self.contains(remote) {
            return;
        }
        self.entries.push(DrainEntry {
            remote,
            disconnect_after_tick,
        });
    }

    pub fn contains(&self, remote: Remote) -> bool {
        self.entries.iter().any(|e| e.remote == remote)
    }

    /// Removes and returns every remote whose threshold has been reached.
    pub fn take_due(&mut self, current_tick: u32) -> Vec<Remote> {
        let mut due = Vec::new();
        self.entries.retain(|entry| {
            if tick_reached(current_tick, entry.disconnect_after_tick) {
                due.push(entry.remote);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn remove(&mut self, remote: Remote) {
        self.entries.retain(|e| e.remote != remote);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrainEntry> {
        self.entries.iter()
    }
}
