//! Topic registry.
//!
//! Static bidirectional mapping between local broker topics and Adafruit IO
//! `(group, feed)` identifiers. The table is built once at startup and is
//! read-only afterwards; every worker and the dispatcher hold their own copy.
//!
//! ## Resolution rules
//! - Local topics resolve by exact match first, then by scanning wildcard
//!   entries (`prefix/#`) in declaration order. The first matching wildcard
//!   wins, even if a later one has a longer prefix.
//! - Remote feed ids resolve by exact match only.

mod table;

use std::collections::HashMap;
use std::fmt;

pub use table::{LOCAL_ENTRIES, REMOTE_ENTRIES};

/// Trailing marker of a wildcard local topic.
pub const WILDCARD_MARKER: char = '#';

/// Local topic carrying bridge commands.
pub const TOPIC_LOCAL_CMD: &str = "/aio/local/cmd";
/// Local topic carrying ring-mqtt commands.
pub const TOPIC_RING_CMD: &str = "/aio/ring/cmd";
/// Local topic reporting the cloud connection state.
pub const TOPIC_CONNECTION: &str = "/aio/connected";
/// Local topic receiving the cloud's notion of local time.
pub const TOPIC_LOCAL_TIME: &str = "/aio/local_time";
/// Local topic receiving the randomizer words.
pub const TOPIC_RANDOMIZER: &str = "/aio/words";
/// Local topic receiving the current weather forecast.
pub const TOPIC_WEATHER_CURRENT: &str = "/aio/weather/current";
/// Prefix of the local topics fed by the weather poller.
pub const TOPIC_OPENWEATHER_PREFIX: &str = "/openweather";

/// Full feed key of the attic motion trigger (group-qualified).
pub const FEED_ATTIC_MOTION: &str = "home-motion.attic";
/// Feed id (within `home-motion`) of the attic motion trigger.
pub const FEED_ATTIC_MOTION_SHORT: &str = "attic";
/// Feed id (within `home-motion`) of the attic camera keep-alive.
pub const FEED_ATTIC_CAMERA_SHORT: &str = "attic-camera";

/// Remote feed group identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    HomeTemperature,
    HomeHumidity,
    HomeLux,
    HomeMotion,
    HomeZone,
    ElectricMeters,
    BaselineElectric,
    HomeDevice,
    SolarRate,
    DeviceFreeMemory,
    DeviceUptime,
    /// Bridge command topic, consumed locally.
    LocalCommand,
    /// ring-mqtt command topic, consumed locally.
    RingCommand,
    /// Parking-bay display feeds.
    EvBays,
    Randomizer,
    Weather,
}

impl Group {
    /// Identifier of this group on the remote side.
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::HomeTemperature => "home-temperature",
            Group::HomeHumidity => "home-humidity",
            Group::HomeLux => "home-lux",
            Group::HomeMotion => "home-motion",
            Group::HomeZone => "home-zone",
            Group::ElectricMeters => "electric-meters",
            Group::BaselineElectric => "baseline-electric",
            Group::HomeDevice => "home-device",
            Group::SolarRate => "solar-rate",
            Group::DeviceFreeMemory => "device-free-memory",
            Group::DeviceUptime => "device-uptime",
            Group::LocalCommand => TOPIC_LOCAL_CMD,
            Group::RingCommand => TOPIC_RING_CMD,
            Group::EvBays => "ev",
            Group::Randomizer => "randomizer",
            Group::Weather => "weather",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the topic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicEntry {
    /// Local topic, possibly ending in [`WILDCARD_MARKER`].
    pub local: &'static str,
    /// Remote groups this topic fans out to, in handler invocation order.
    pub groups: &'static [Group],
    /// Remote feed id. Empty for wildcard entries.
    pub feed_id: &'static str,
}

impl TopicEntry {
    pub const fn new(local: &'static str, groups: &'static [Group], feed_id: &'static str) -> Self {
        Self {
            local,
            groups,
            feed_id,
        }
    }

    /// Whether the local topic is a `prefix/#` pattern.
    pub fn is_wildcard(&self) -> bool {
        self.local.ends_with(WILDCARD_MARKER)
    }

    /// Local topic without the trailing wildcard marker.
    pub fn prefix(&self) -> &'static str {
        self.local
            .strip_suffix(WILDCARD_MARKER)
            .unwrap_or(self.local)
    }

    /// First group of the entry.
    pub fn primary_group(&self) -> Option<Group> {
        self.groups.first().copied()
    }
}

/// Errors raised while building a registry from a table.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate local topic '{0}'")]
    DuplicateLocal(&'static str),

    #[error("Duplicate remote feed id '{0}'")]
    DuplicateRemote(&'static str),

    #[error("Wildcard entry '{0}' must not carry a fixed feed id")]
    WildcardWithFeedId(&'static str),

    #[error("Entry '{0}' has no groups")]
    NoGroups(&'static str),
}

/// Read-only lookup structures over the topic table.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    local: HashMap<&'static str, TopicEntry>,
    wildcards: Vec<TopicEntry>,
    remote: HashMap<&'static str, TopicEntry>,
    local_order: Vec<&'static str>,
    remote_order: Vec<&'static str>,
}

impl TopicRegistry {
    /// Build a registry from local and remote tables.
    pub fn new(
        local_entries: &[TopicEntry],
        remote_entries: &[TopicEntry],
    ) -> Result<Self, RegistryError> {
        let mut local = HashMap::with_capacity(local_entries.len());
        let mut wildcards = Vec::new();
        let mut local_order = Vec::with_capacity(local_entries.len());

        for entry in local_entries {
            if entry.groups.is_empty() {
                return Err(RegistryError::NoGroups(entry.local));
            }
            if entry.is_wildcard() {
                if !entry.feed_id.is_empty() {
                    return Err(RegistryError::WildcardWithFeedId(entry.local));
                }
                if wildcards.iter().any(|w: &TopicEntry| w.local == entry.local) {
                    return Err(RegistryError::DuplicateLocal(entry.local));
                }
                wildcards.push(*entry);
            } else if local.insert(entry.local, *entry).is_some() {
                return Err(RegistryError::DuplicateLocal(entry.local));
            }
            local_order.push(entry.local);
        }

        let mut remote = HashMap::with_capacity(remote_entries.len());
        let mut remote_order = Vec::with_capacity(remote_entries.len());
        for entry in remote_entries {
            if entry.groups.is_empty() {
                return Err(RegistryError::NoGroups(entry.local));
            }
            if remote.insert(entry.feed_id, *entry).is_some() {
                return Err(RegistryError::DuplicateRemote(entry.feed_id));
            }
            remote_order.push(entry.feed_id);
        }

        Ok(Self {
            local,
            wildcards,
            remote,
            local_order,
            remote_order,
        })
    }

    /// Registry over the bridge's fixed topology.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(LOCAL_ENTRIES, REMOTE_ENTRIES)
    }

    /// Resolve a local topic: exact match, then first matching wildcard.
    pub fn resolve_local(&self, topic: &str) -> Option<&TopicEntry> {
        self.local.get(topic).or_else(|| {
            self.wildcards
                .iter()
                .find(|entry| topic.starts_with(entry.prefix()))
        })
    }

    /// Resolve a remote feed id. No wildcards on this side.
    pub fn resolve_remote(&self, feed_id: &str) -> Option<&TopicEntry> {
        self.remote.get(feed_id)
    }

    /// Local topics to subscribe to, in table order (wildcards included).
    pub fn local_topics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.local_order.iter().copied()
    }

    /// Remote feed ids to subscribe to, in table order.
    pub fn remote_feed_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.remote_order.iter().copied()
    }
}

/// Feed id to publish under for `topic` resolved to `entry`.
///
/// Exact entries use their fixed feed id. Wildcard entries derive it from the
/// last `/` segment of the topic, with underscores turned into hyphens.
pub fn extract_feed_id(topic: &str, entry: &TopicEntry) -> String {
    if !entry.feed_id.is_empty() {
        return entry.feed_id.to_string();
    }
    topic
        .rsplit('/')
        .next()
        .unwrap_or(topic)
        .replace('_', "-")
}

#[cfg(test)]
mod tests;
