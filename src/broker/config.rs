/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;

const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_IQ_HANDLERS: usize = 64;

/// Tunables of a [`StanzaBroker`](super::StanzaBroker).
///
/// Durations are given in whole seconds when deserialized:
///
/// ```json
/// { "ping_interval": 30, "ping_timeout": 10, "sm_max": 600 }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Idle time before the peer is probed.
    #[serde(deserialize_with = "seconds")]
    pub ping_interval: Duration,
    /// How long a probe may stay unanswered.
    #[serde(deserialize_with = "seconds")]
    pub ping_timeout: Duration,
    /// Ask for a resumable session when enabling stream management.
    pub sm_resumable: bool,
    /// Preferred resumption timeout in seconds.
    pub sm_max: Option<u32>,
    /// Upper bound of concurrently running IQ request handlers.
    pub max_iq_handlers: usize,
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            sm_resumable: true,
            sm_max: None,
            max_iq_handlers: DEFAULT_MAX_IQ_HANDLERS,
        }
    }
}

impl BrokerConfig {
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::new()
    }
}

pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    pub fn new() -> Self {
        BrokerConfigBuilder {
            config: BrokerConfig::default(),
        }
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    pub fn sm_resumable(mut self, resumable: bool) -> Self {
        self.config.sm_resumable = resumable;
        self
    }

    pub fn sm_max(mut self, max: Option<u32>) -> Self {
        self.config.sm_max = max;
        self
    }

    pub fn max_iq_handlers(mut self, max: usize) -> Self {
        self.config.max_iq_handlers = max.max(1);
        self
    }

    pub fn build(self) -> BrokerConfig {
        self.config
    }
}

impl Default for BrokerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
