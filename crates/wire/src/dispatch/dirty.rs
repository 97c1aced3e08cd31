use crate::channel::Remote;

/// Remotes with queued writes since the last dispatch pass, in mark order.
#[derive(Debug, Default)]
pub struct DirtyList {
    entries: Vec<Remote>,
}

impl DirtyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, remote: Remote) {
        self.entries.push(remote);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Remote> {
        self.entries.get(index).copied()
    }

    pub fn contains(&self, remote: Remote) -> bool {
        self.entries.contains(&remote)
    }

    /// Removes the `processed` entries handled by a pass. Entries appended
    /// while the pass ran stay queued for the next one.
    pub fn finish_pass(&mut self, processed: usize) {
        let processed = processed.min(self.entries.len());
        if self.entries.len() > processed {
            log::trace!(
                "dirty list grew during dispatch, keeping {} entries",
                self.entries.len() - processed
            );
        }
        self.entries.drain(..processed);
    }

    pub fn remove(&mut self, remote: Remote) {
        self.entries.retain(|r| *r != remote);
    }
}
