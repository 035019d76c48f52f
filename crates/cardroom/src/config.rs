//! Client configuration.

use std::time::Duration;

use cardroom_room::{CreateGame, RoomRules};
use cardroom_transport::ReconnectPolicy;

use crate::CardroomError;

/// Everything a [`GameSession`](crate::GameSession) needs to know besides
/// who and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/ws`.
    pub url: String,

    /// How long to wait for the first snapshot before giving up. Also
    /// bounds every re-fetch.
    pub load_timeout: Duration,

    /// How long to wait for a signed-in identity.
    pub identity_timeout: Duration,

    pub reconnect: ReconnectPolicy,

    pub rules: RoomRules,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            load_timeout: Duration::from_secs(10),
            identity_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            rules: RoomRules::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Replaces values that cannot work with something that can.
    ///
    /// Zero timeouts fall back to the defaults, an inverted delay or
    /// table-size range is widened to contain its lower bound.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.load_timeout.is_zero() {
            self.load_timeout = defaults.load_timeout;
        }
        if self.identity_timeout.is_zero() {
            self.identity_timeout = defaults.identity_timeout;
        }
        if self.reconnect.max_delay < self.reconnect.initial_delay {
            self.reconnect.max_delay = self.reconnect.initial_delay;
        }
        if self.rules.max_table_size < self.rules.min_table_size {
            self.rules.max_table_size = self.rules.min_table_size;
        }
        self
    }

    /// Builds a create-game request for a table of `max_players` seats,
    /// checked against this config's room rules.
    pub fn create_request(&self, max_players: u32) -> Result<CreateGame, CardroomError> {
        Ok(self.rules.validate_create(max_players)?)
    }
}

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use cardroom::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .url("ws://cards.example:3000/ws")
///     .load_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(config.url, "ws://cards.example:3000/ws");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    pub fn identity_timeout(mut self, timeout: Duration) -> Self {
        self.config.identity_timeout = timeout;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    pub fn rules(mut self, rules: RoomRules) -> Self {
        self.config.rules = rules;
        self
    }

    /// Finishes the builder. The result is already [`validated`](ClientConfig::validated).
    pub fn build(self) -> ClientConfig {
        self.config.validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.load_timeout, Duration::from_secs(10));
        assert_eq!(config.rules.min_non_host_players, 4);
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn test_validated_repairs_nonsense() {
        let config = ClientConfig {
            load_timeout: Duration::ZERO,
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_secs(3),
                max_delay: Duration::from_secs(1),
                ..ReconnectPolicy::default()
            },
            rules: RoomRules {
                min_table_size: 6,
                max_table_size: 2,
                ..RoomRules::default()
            },
            ..ClientConfig::default()
        }
        .validated();

        assert_eq!(config.load_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(3));
        assert_eq!(config.rules.table_sizes(), 6..=6);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = ClientConfig::builder()
            .url("ws://x/ws")
            .identity_timeout(Duration::from_millis(50))
            .reconnect(ReconnectPolicy::disabled())
            .build();
        assert_eq!(config.url, "ws://x/ws");
        assert_eq!(config.identity_timeout, Duration::from_millis(50));
        assert_eq!(config.reconnect.max_attempts, Some(0));
    }

    #[test]
    fn test_create_request_within_rules() {
        let request = ClientConfig::default().create_request(6).unwrap();
        assert_eq!(request, CreateGame { min_players: 4, max_players: 6 });
    }

    #[test]
    fn test_create_request_outside_rules_is_rule_error() {
        let err = ClientConfig::default().create_request(9).unwrap_err();
        assert!(matches!(err, CardroomError::Rule(_)));
    }
}
