use serde::{Deserialize, Serialize};

/// Shell-reported reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReachabilitySignal {
    Online,
    Offline,
}

/// Tracks whether the platform believes the network is reachable.
///
/// This is advisory only. Requests are attempted regardless of the flag,
/// and request failures never feed back into it; the shell's reachability
/// events are the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityMonitor {
    online: bool,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        // Assume reachable until the shell says otherwise.
        Self { online: true }
    }
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Applies a reachability signal. Returns true when the flag changed.
    pub fn apply(&mut self, signal: ReachabilitySignal) -> bool {
        let online = matches!(signal, ReachabilitySignal::Online);
        let changed = online != self.online;
        self.online = online;
        changed
    }
}
