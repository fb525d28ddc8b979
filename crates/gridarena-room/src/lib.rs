//! Room engine for Gridarena: per-room actors that own all world state and
//! advance it on a fixed tick.
//!
//! Each room runs as a single Tokio task. Connections talk to it through a
//! cloned [`RoomHandle`]; move intents pass through an admission stage that
//! simulates network delay and loss before they reach the tick loop, where
//! sequencing, rate limiting, and the authoritative move resolution happen.
//! Every tick ends with one broadcast payload, a delta when cheap and a
//! full state when not, fanned out to per-player bounded queues.
//!
//! The [`RoomRegistry`] maps room ids to handles, creating rooms on demand.

mod admission;
mod broadcast;
mod config;
mod error;
mod metrics;
mod player;
mod reconnect;
mod registry;
mod room;

pub use admission::Intent;
pub use config::{ConfigUpdate, RoomConfig, SimConfig};
pub use error::RoomError;
pub use metrics::{MetricsSnapshot, RoomMetrics};
pub use player::{OutboundFrame, OutboundSender};
pub use registry::RoomRegistry;
pub use room::RoomHandle;
