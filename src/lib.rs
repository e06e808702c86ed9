//! adabridge - home-automation MQTT bridge
//!
//! Relays messages between a local MQTT broker and Adafruit IO, translating
//! topics and payloads on the way, and feeds the local broker with readings
//! from polled sources (weather, energy monitor, parking bays).
//!
//! ## Architecture
//! ```text
//! [local broker] <-> LocalBroker worker --+            +-- Cloud worker <-> [Adafruit IO]
//!                                         |            |
//! [weather/energy/bays] -> pollers -------+-> events --+-- Throttle worker <- [Adafruit IO]
//!                                         |     |
//!                          scheduler -----+     v
//!                                           dispatcher -> worker command queues
//! ```
//!
//! Each worker owns one client, reads its own bounded command queue and
//! writes to the shared event queue. The dispatcher is the only consumer of
//! the event queue and the only producer of commands.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod registry;
pub mod scheduler;
pub mod supervisor;
pub mod utils;
pub mod workers;
