use std::collections::VecDeque;
use std::sync::Arc;

/// Failover rotation over a fixed host list.
///
/// The first host starts active and the rest wait in a queue. Each
/// `advance` activates the next queued host; once the queue runs dry it is
/// refilled from the full list, so already-failed hosts are tried again.
#[derive(Debug, Clone)]
pub struct HostCursor {
    hosts: Arc<[String]>,
    pending: VecDeque<String>,
    active: String,
}

impl HostCursor {
    /// Returns `None` for an empty host list
    pub fn new(hosts: Arc<[String]>) -> Option<Self> {
        let mut pending: VecDeque<String> = hosts.iter().cloned().collect();
        let active = pending.pop_front()?;
        Some(Self {
            hosts,
            pending,
            active,
        })
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Move to the next host and return it
    pub fn advance(&mut self) -> &str {
        match self.pending.pop_front() {
            Some(next) => self.active = next,
            None => self.refill(),
        }
        &self.active
    }

    /// Hosts not yet tried in the current rotation
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn refill(&mut self) {
        self.pending = self.hosts.iter().cloned().collect();
        // hosts is non-empty, checked in `new`
        if let Some(first) = self.pending.pop_front() {
            self.active = first;
        }
    }
}
