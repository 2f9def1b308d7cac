//! Configuration structures.
//!
//! Field names follow the attribute surface (`MaxSize`,
//! `PitEntryPruningTimout`, `Frequency`, ...). Durations accept ns-3 style
//! strings such as `"50ms"` or `"2s"` as well as plain seconds.

use crate::policy::DEFAULT_MAX_SIZE;
use nnnsim_common::time::{serde_duration, serde_opt_duration};
use nnnsim_common::{Error, Name, NnnAddress, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Content Store knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContentStoreConfig {
    /// Registry name of the replacement policy, or `"None"` to disable
    /// caching.
    pub policy: String,
    pub max_size: usize,
    /// Expire entries according to the Data freshness period.
    pub freshness: bool,
    /// Admit each Data with this probability.
    pub cache_probability: Option<f64>,
    /// Record dwell time and report it when entries are removed.
    pub stats: bool,
    pub seed: u64,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            policy: "Lru".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            freshness: false,
            cache_probability: None,
            stats: false,
            seed: 0,
        }
    }
}

impl ContentStoreConfig {
    pub fn is_disabled(&self) -> bool {
        self.policy.eq_ignore_ascii_case("none") || self.policy.eq_ignore_ascii_case("nocache")
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.cache_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!(
                    "CacheProbability must be within [0, 1], got {}",
                    p
                )));
            }
        }
        Ok(())
    }
}

/// PIT knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PitConfig {
    pub policy: String,
    /// `0` means unbounded.
    pub max_size: usize,
    #[serde(with = "serde_duration")]
    pub pit_entry_pruning_timout: Duration,
    #[serde(with = "serde_duration")]
    pub max_pit_entry_lifetime: Duration,
}

impl Default for PitConfig {
    fn default() -> Self {
        Self {
            policy: "Persistent".to_string(),
            max_size: 0,
            pit_entry_pruning_timout: Duration::from_millis(100),
            max_pit_entry_lifetime: Duration::from_secs(2),
        }
    }
}

/// Inter-packet gap randomisation of the CBR consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Randomize {
    #[default]
    None,
    Uniform,
    Exponential,
}

impl std::str::FromStr for Randomize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "" => Ok(Randomize::None),
            "uniform" => Ok(Randomize::Uniform),
            "exponential" => Ok(Randomize::Exponential),
            other => Err(Error::Config(format!("unknown Randomize value '{}'", other))),
        }
    }
}

/// Consumer application knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ConsumerConfig {
    pub prefix: Name,
    pub start_seq: u64,
    #[serde(with = "serde_duration")]
    pub life_time: Duration,
    #[serde(with = "serde_duration")]
    pub retx_timer: Duration,
    /// Interests per second.
    pub frequency: f64,
    pub randomize: Randomize,
    /// Highest sequence number (exclusive); unbounded when absent.
    pub max_seq: Option<u64>,
    #[serde(rename = "3NLifetime", with = "serde_duration")]
    pub nnn_lifetime: Duration,
    pub is_mobile: bool,
    pub seed: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            prefix: Name::new(),
            start_seq: 0,
            life_time: Duration::from_secs(2),
            retx_timer: Duration::from_millis(50),
            frequency: 1.0,
            randomize: Randomize::None,
            max_seq: None,
            nnn_lifetime: Duration::from_secs(3),
            is_mobile: false,
            seed: 0,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.frequency > 0.0 && self.frequency.is_finite()) {
            return Err(Error::Config(format!(
                "Frequency must be a positive number, got {}",
                self.frequency
            )));
        }
        if self.retx_timer.is_zero() {
            return Err(Error::Config("RetxTimer must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Producer application knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProducerConfig {
    pub prefix: Name,
    /// Appended to every Data name.
    pub postfix: Name,
    pub payload_size: usize,
    #[serde(with = "serde_duration")]
    pub freshness: Duration,
    pub signature: u32,
    pub key_locator: Option<Name>,
    #[serde(rename = "3NLifetime", with = "serde_duration")]
    pub nnn_lifetime: Duration,
    pub is_mobile: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            prefix: Name::new(),
            postfix: Name::new(),
            payload_size: 1024,
            freshness: Duration::ZERO,
            signature: 0,
            key_locator: None,
            nnn_lifetime: Duration::from_secs(3),
            is_mobile: false,
        }
    }
}

/// Strategy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    BestRoute,
    Flooding,
}

/// Per-node knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NodeConfig {
    /// Fixed 3N name, if the node starts named.
    pub name: Option<NnnAddress>,
    /// Whether the node hands out names to neighbours that enroll.
    pub produce_names: bool,
    /// Lease granted with produced names.
    #[serde(with = "serde_duration")]
    pub lease: Duration,
    /// How long before expiry a name is renewed.
    #[serde(with = "serde_duration")]
    pub renewal: Duration,
    /// Retransmission delay of buffered PDUs.
    #[serde(with = "serde_duration")]
    pub buffer_retx: Duration,
    pub strategy: StrategyKind,
    pub content_store: ContentStoreConfig,
    pub pit: PitConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: None,
            produce_names: false,
            lease: Duration::from_secs(300),
            renewal: Duration::from_secs(10),
            buffer_retx: Duration::from_millis(200),
            strategy: StrategyKind::BestRoute,
            content_store: ContentStoreConfig::default(),
            pit: PitConfig::default(),
        }
    }
}

/// Route installed at scenario start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteConfig {
    pub node: String,
    pub prefix: Name,
    /// Index of the node's link, in the order links were declared.
    pub link: usize,
    #[serde(default)]
    pub cost: u16,
}

/// Point-to-point link between two named nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    #[serde(default = "default_link_delay", with = "serde_duration")]
    pub delay: Duration,
}

fn default_link_delay() -> Duration {
    Duration::from_millis(10)
}

/// An application installed on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum AppKind {
    Consumer(ConsumerConfig),
    Producer(ProducerConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    pub node: String,
    #[serde(default, with = "serde_opt_duration")]
    pub start: Option<Duration>,
    #[serde(default, with = "serde_opt_duration")]
    pub stop: Option<Duration>,
    #[serde(flatten)]
    pub kind: AppKind,
}

/// A named node of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeEntry {
    pub id: String,
    #[serde(flatten)]
    pub config: NodeConfig,
}

/// A complete simulation scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ScenarioConfig {
    pub nodes: Vec<NodeEntry>,
    pub links: Vec<LinkConfig>,
    pub routes: Vec<RouteConfig>,
    pub apps: Vec<AppConfig>,
    #[serde(with = "serde_opt_duration")]
    pub stop_time: Option<Duration>,
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        let known = |id: &str| self.nodes.iter().any(|n| n.id == id);
        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !known(end) {
                    return Err(Error::Config(format!("link references unknown node '{}'", end)));
                }
            }
        }
        for app in &self.apps {
            if !known(&app.node) {
                return Err(Error::Config(format!("app references unknown node '{}'", app.node)));
            }
            if let AppKind::Consumer(c) = &app.kind {
                c.validate()?;
            }
        }
        for route in &self.routes {
            if !known(&route.node) {
                return Err(Error::Config(format!(
                    "route references unknown node '{}'",
                    route.node
                )));
            }
        }
        for node in &self.nodes {
            node.config.content_store.validate()?;
        }
        Ok(())
    }
}
