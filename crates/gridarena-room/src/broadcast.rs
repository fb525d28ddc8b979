//! Per-tick broadcast payload construction: delta against the last
//! broadcast state, with a full-state fallback when the delta stops paying.

use std::collections::HashMap;

use gridarena_protocol::{PlayerId, PlayerState, ServerMessage};

use crate::player::Player;

/// Tracks the last state each subscriber was sent, and decides between a
/// delta and a full-state payload each tick.
#[derive(Debug, Default)]
pub(crate) struct BroadcastState {
    last: HashMap<PlayerId, PlayerState>,
}

impl BroadcastState {
    /// Builds this tick's payload and advances the tracked state to match
    /// what subscribers will now hold.
    ///
    /// A player counts as changed if they are new since the last broadcast
    /// or their position differs. When the changed set is no smaller than
    /// the room population, a full `state` payload goes out instead and the
    /// tracked state is replaced wholesale (this also covers the first
    /// broadcast, and an empty room).
    pub fn next_update(
        &mut self,
        tick: u64,
        players: &HashMap<PlayerId, Player>,
        acks: HashMap<PlayerId, i64>,
    ) -> ServerMessage {
        let removed: Vec<PlayerId> = self
            .last
            .keys()
            .filter(|id| !players.contains_key(*id))
            .cloned()
            .collect();

        let mut changed: Vec<PlayerState> = Vec::new();
        for (id, player) in players {
            match self.last.get(id) {
                Some(prev) if prev.x == player.x && prev.y == player.y => {}
                _ => changed.push(player.state()),
            }
        }

        if changed.len() >= players.len() {
            let full: Vec<PlayerState> =
                players.values().map(Player::state).collect();
            self.last = full
                .iter()
                .map(|state| (state.id.clone(), state.clone()))
                .collect();
            return ServerMessage::State {
                tick,
                players: full,
                acks,
            };
        }

        for id in &removed {
            self.last.remove(id);
        }
        for state in &changed {
            self.last.insert(state.id.clone(), state.clone());
        }
        ServerMessage::Delta {
            tick,
            players: changed,
            removed,
            acks,
        }
    }
}

/// An on-demand full snapshot. Does not touch broadcast tracking: the
/// requester gets the authoritative picture, everyone else's delta baseline
/// is unaffected.
pub(crate) fn snapshot_payload(
    tick: u64,
    players: &HashMap<PlayerId, Player>,
    acks: HashMap<PlayerId, i64>,
) -> ServerMessage {
    ServerMessage::Snapshot {
        tick,
        players: players.values().map(Player::state).collect(),
        acks,
    }
}
