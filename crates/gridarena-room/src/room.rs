//! The room actor: single owner of all room state, driven by a command
//! channel and a fixed-cadence tick scheduler.
//!
//! All mutation happens on one task, so joins, departures, intents, and
//! config updates never race. Handles talk to the actor through channels;
//! a cloned [`RoomHandle`] is the only public surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gridarena_protocol::{Codec, Direction, PlayerId, RoomId, ServerMessage};
use gridarena_tick::{TickInfo, TickScheduler};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::admission::{self, DelayQueue, Intent, ScheduledIntent};
use crate::broadcast::{self, BroadcastState};
use crate::config::{ConfigUpdate, RoomConfig, SimConfig};
use crate::error::RoomError;
use crate::metrics::{MetricsSnapshot, RoomMetrics};
use crate::player::{OutboundFrame, OutboundSender, Player};
use crate::reconnect::ReconnectCache;

/// Commands handled by the actor between ticks.
enum RoomCommand {
    Join {
        player_id: PlayerId,
        sender: OutboundSender,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        player_id: PlayerId,
    },
    Configure {
        update: ConfigUpdate,
        reply: oneshot::Sender<()>,
    },
    GetConfig {
        reply: oneshot::Sender<RoomConfig>,
    },
}

/// A queued departure, tagged with the outbound sender of the departing
/// incarnation so a stale teardown can't evict a replacement player.
struct Departure {
    player_id: PlayerId,
    sender: OutboundSender,
}

const COMMAND_CHANNEL_SIZE: usize = 64;

/// Cheap-to-clone handle to a running room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    commands: mpsc::Sender<RoomCommand>,
    departures: mpsc::Sender<Departure>,
    intents: mpsc::Sender<Intent>,
    delayed: mpsc::UnboundedSender<ScheduledIntent>,
    /// Shared with the actor so submit-time sampling sees live updates.
    sim: Arc<RwLock<SimConfig>>,
    metrics: Arc<RoomMetrics>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Adds a player to the room and completes once the actor has placed
    /// them and queued their initial snapshot.
    ///
    /// A second join for an id already present replaces the previous
    /// connection: the old outbound handle is dropped and the position
    /// carries over.
    pub async fn join(
        &self,
        player_id: PlayerId,
        sender: OutboundSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Join {
                player_id,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Queues a departure for the incarnation identified by `sender`.
    /// Waits for queue space if needed; a departure is never silently
    /// lost. Takes effect at the start of the next tick, where it is
    /// ignored if a newer join has replaced the player since.
    pub async fn leave(
        &self,
        player_id: PlayerId,
        sender: OutboundSender,
    ) -> Result<(), RoomError> {
        self.departures
            .send(Departure { player_id, sender })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Submits a move intent through admission.
    ///
    /// Outcomes are silent by design: the intent may be dropped by
    /// simulated loss, delayed, discarded by a full queue, or later
    /// rejected inside the tick. Counters record each fate.
    pub async fn submit_intent(
        &self,
        player_id: PlayerId,
        direction: Direction,
        seq: i64,
    ) {
        let sim = self.sim.read().await.clone();
        let Some(delay) = admission::sample(&sim) else {
            self.metrics.inc_drops_simulated();
            tracing::debug!(
                room_id = %self.room_id,
                %player_id,
                seq,
                "simulated loss — dropping intent"
            );
            return;
        };

        let intent = Intent {
            player_id,
            direction,
            seq,
        };
        if delay.is_zero() {
            // Fast path: no timer round-trip.
            admission::offer(&self.intents, intent, &self.metrics);
        } else {
            let scheduled = ScheduledIntent {
                visible_at: tokio::time::Instant::now() + delay,
                intent,
            };
            // Fails only once the room is gone; the intent dies with it.
            let _ = self.delayed.send(scheduled);
        }
    }

    /// Asks the actor to send this player a full snapshot out of band.
    pub async fn request_snapshot(
        &self,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        self.commands
            .send(RoomCommand::Snapshot { player_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Applies a live configuration update between ticks.
    ///
    /// Completes only after the actor has applied the update, so an
    /// intent submitted afterwards samples the new settings.
    pub async fn configure(
        &self,
        update: ConfigUpdate,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Configure {
                update,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Reads the room's current effective configuration.
    pub async fn config(&self) -> Result<RoomConfig, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::GetConfig { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Point-in-time counters. Never blocks on the actor.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Spawns a room actor and its delay-queue task.
pub(crate) fn spawn_room<C: Codec>(
    room_id: RoomId,
    config: RoomConfig,
    codec: C,
) -> RoomHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (departure_tx, departure_rx) =
        mpsc::channel(config.departure_queue_capacity.max(1));
    let (intent_tx, intent_rx) =
        mpsc::channel(config.intent_queue_capacity.max(1));

    let metrics = RoomMetrics::shared();
    let delayed =
        DelayQueue::spawn(intent_tx.clone(), Arc::clone(&metrics));
    let sim = Arc::new(RwLock::new(config.sim.clone()));
    let scheduler = TickScheduler::with_rate(config.tick_rate_hz);

    let actor = RoomActor {
        room_id: room_id.clone(),
        config,
        sim: Arc::clone(&sim),
        codec,
        scheduler,
        commands: command_rx,
        departures: departure_rx,
        intents: intent_rx,
        players: HashMap::new(),
        last_accepted_seq: HashMap::new(),
        accepted_this_tick: HashMap::new(),
        reconnect: ReconnectCache::default(),
        broadcast: BroadcastState::default(),
        tick: 0,
        metrics: Arc::clone(&metrics),
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        commands: command_tx,
        departures: departure_tx,
        intents: intent_tx,
        delayed,
        sim,
        metrics,
    }
}

struct RoomActor<C: Codec> {
    room_id: RoomId,
    config: RoomConfig,
    sim: Arc<RwLock<SimConfig>>,
    codec: C,
    scheduler: TickScheduler,
    commands: mpsc::Receiver<RoomCommand>,
    departures: mpsc::Receiver<Departure>,
    intents: mpsc::Receiver<Intent>,
    players: HashMap<PlayerId, Player>,
    /// Highest accepted seq per player. Grows only; survives departures so
    /// a reconnecting client's stale retransmits stay rejected.
    last_accepted_seq: HashMap<PlayerId, i64>,
    /// Per-player accept count within the current tick.
    accepted_this_tick: HashMap<PlayerId, usize>,
    reconnect: ReconnectCache,
    broadcast: BroadcastState,
    tick: u64,
    metrics: Arc<RoomMetrics>,
}

impl<C: Codec> RoomActor<C> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        // Every handle dropped: the room winds down.
                        None => break,
                    }
                }
                info = self.scheduler.wait_for_tick() => {
                    self.run_tick(&info);
                }
            }
        }
        tracing::info!(
            room_id = %self.room_id,
            ticks = self.tick,
            "room actor stopped"
        );
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                sender,
                reply,
            } => {
                self.handle_join(player_id, sender);
                let _ = reply.send(());
            }
            RoomCommand::Snapshot { player_id } => {
                self.handle_snapshot_request(&player_id);
            }
            RoomCommand::Configure { update, reply } => {
                self.config.apply(&update);
                *self.sim.write().await = self.config.sim.clone();
                tracing::info!(
                    room_id = %self.room_id,
                    step = self.config.step,
                    max_inputs_per_tick = self.config.max_inputs_per_tick,
                    delay_min_ms = self.config.sim.delay_min_ms,
                    delay_max_ms = self.config.sim.delay_max_ms,
                    drop_prob = self.config.sim.drop_prob,
                    "configuration updated"
                );
                // Ack only after the shared sim config is written, so a
                // caller's next submission samples the new settings.
                let _ = reply.send(());
            }
            RoomCommand::GetConfig { reply } => {
                let _ = reply.send(self.config.clone());
            }
        }
    }

    fn handle_join(&mut self, player_id: PlayerId, sender: OutboundSender) {
        let (x, y) = if let Some(old) = self.players.remove(&player_id) {
            // Replacing a live connection: drop the old outbound handle,
            // keep the position.
            self.reconnect.remember(&player_id, old.x, old.y);
            tracing::warn!(
                room_id = %self.room_id,
                %player_id,
                "duplicate join — replacing existing connection"
            );
            (old.x, old.y)
        } else if let Some((x, y)) = self.reconnect.restore(&player_id) {
            tracing::info!(
                room_id = %self.room_id,
                %player_id,
                x,
                y,
                "restoring last known position"
            );
            (x, y)
        } else {
            self.config.spawn_point()
        };

        self.players
            .insert(player_id.clone(), Player::new(player_id.clone(), x, y, sender));
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            players = self.players.len(),
            "player joined"
        );

        // Immediate snapshot so the client can render before the next tick.
        self.handle_snapshot_request(&player_id);
    }

    fn handle_snapshot_request(&mut self, player_id: &PlayerId) {
        let Some(player) = self.players.get(player_id) else {
            tracing::debug!(
                room_id = %self.room_id,
                %player_id,
                "snapshot requested for absent player"
            );
            return;
        };
        let payload = broadcast::snapshot_payload(
            self.tick,
            &self.players,
            self.last_accepted_seq.clone(),
        );
        if let Some(frame) = self.encode_frame(&payload) {
            player.send(frame);
        }
    }

    fn run_tick(&mut self, info: &TickInfo) {
        let start = std::time::Instant::now();

        self.tick += 1;
        self.accepted_this_tick.clear();

        self.drain_departures();
        self.drain_intents();
        self.update_world(info.dt);
        self.broadcast_tick();

        self.metrics.record_tick(start.elapsed());
    }

    /// Departures resolve before intents so a leaver's queued moves fall
    /// into the absent-player path.
    ///
    /// A departure only evicts the incarnation it was issued for: if a
    /// newer join replaced the player's outbound channel in the meantime,
    /// the stale teardown is ignored.
    fn drain_departures(&mut self) {
        while let Ok(departure) = self.departures.try_recv() {
            let Departure { player_id, sender } = departure;
            let current = self
                .players
                .get(&player_id)
                .is_some_and(|p| p.same_channel(&sender));
            if !current {
                tracing::debug!(
                    room_id = %self.room_id,
                    %player_id,
                    "ignoring departure for replaced connection"
                );
                continue;
            }
            let Some(player) = self.players.remove(&player_id) else {
                continue;
            };
            self.reconnect.remember(&player_id, player.x, player.y);
            tracing::info!(
                room_id = %self.room_id,
                %player_id,
                players = self.players.len(),
                "player left"
            );
        }
    }

    fn drain_intents(&mut self) {
        while let Ok(intent) = self.intents.try_recv() {
            self.resolve_intent(intent);
        }
    }

    fn resolve_intent(&mut self, intent: Intent) {
        let Some(player) = self.players.get_mut(&intent.player_id) else {
            tracing::debug!(
                room_id = %self.room_id,
                player_id = %intent.player_id,
                "dropping intent for absent player"
            );
            return;
        };

        // Dedup applies only to sequenced intents; seq 0 is unsequenced.
        if intent.seq > 0 {
            if let Some(&last) = self.last_accepted_seq.get(&intent.player_id)
            {
                if intent.seq <= last {
                    self.metrics.inc_stale_rejected();
                    tracing::debug!(
                        room_id = %self.room_id,
                        player_id = %intent.player_id,
                        seq = intent.seq,
                        last,
                        "rejecting stale intent"
                    );
                    return;
                }
            }
        }

        let accepted = self
            .accepted_this_tick
            .get(&intent.player_id)
            .copied()
            .unwrap_or(0);
        if accepted >= self.config.max_inputs_per_tick {
            self.metrics.inc_rate_limited();
            tracing::debug!(
                room_id = %self.room_id,
                player_id = %intent.player_id,
                seq = intent.seq,
                "per-tick input cap reached — rejecting intent"
            );
            return;
        }

        player.apply_move(
            intent.direction,
            self.config.step,
            self.config.width,
            self.config.height,
        );

        self.accepted_this_tick
            .insert(intent.player_id.clone(), accepted + 1);
        if intent.seq > 0 {
            self.last_accepted_seq
                .insert(intent.player_id.clone(), intent.seq);
        }
        self.metrics.inc_inputs_accepted();
    }

    /// Extension point for time-driven world logic beyond player moves.
    fn update_world(&mut self, _dt: Duration) {}

    fn broadcast_tick(&mut self) {
        let payload = self.broadcast.next_update(
            self.tick,
            &self.players,
            self.last_accepted_seq.clone(),
        );
        let Some(frame) = self.encode_frame(&payload) else {
            return;
        };
        for player in self.players.values() {
            player.send(frame.clone());
        }
    }

    /// Encodes once per payload; recipients share the allocation.
    fn encode_frame(&self, payload: &ServerMessage) -> Option<OutboundFrame> {
        match self.codec.encode(payload) {
            Ok(text) => Some(Arc::from(text)),
            Err(error) => {
                tracing::error!(
                    room_id = %self.room_id,
                    %error,
                    "failed to encode outbound payload"
                );
                None
            }
        }
    }
}
