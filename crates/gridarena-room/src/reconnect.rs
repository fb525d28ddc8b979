//! Last-known-position cache for players who left or disconnected.

use std::collections::HashMap;

use gridarena_protocol::PlayerId;

/// Remembers where each departed player last stood so a rejoin resumes
/// there instead of respawning at the center.
///
/// Entries survive restores (a player can disconnect and return repeatedly)
/// and are only ever overwritten by a later departure. Lives inside the room
/// actor; no locking needed.
#[derive(Debug, Default)]
pub(crate) struct ReconnectCache {
    last_known: HashMap<PlayerId, (f64, f64)>,
}

impl ReconnectCache {
    /// Records the position a player held when they departed.
    pub fn remember(&mut self, id: &PlayerId, x: f64, y: f64) {
        self.last_known.insert(id.clone(), (x, y));
    }

    /// Looks up a returning player's last position, if any.
    pub fn restore(&self, id: &PlayerId) -> Option<(f64, f64)> {
        self.last_known.get(id).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_known.len()
    }
}
