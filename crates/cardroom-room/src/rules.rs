//! Table rules the client checks locally.
//!
//! These are advisory. The server's rules engine has the final word and
//! may still reject; the client only avoids sending requests that are
//! bound to fail.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::RuleError;

// ---------------------------------------------------------------------------
// RoomRules
// ---------------------------------------------------------------------------

/// Member-count bounds for starting and creating games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRules {
    /// Non-host members that must be seated before the host may start.
    pub min_non_host_players: usize,

    /// Smallest table a new game may be created for.
    pub min_table_size: u32,

    /// Largest table a new game may be created for.
    pub max_table_size: u32,
}

impl Default for RoomRules {
    fn default() -> Self {
        Self {
            min_non_host_players: 4,
            min_table_size: 4,
            max_table_size: 8,
        }
    }
}

impl RoomRules {
    /// The accepted `maxPlayers` range for a new game.
    pub fn table_sizes(&self) -> RangeInclusive<u32> {
        self.min_table_size..=self.max_table_size
    }

    /// Whether the host may start with `non_host_players` seated.
    pub fn can_start(&self, non_host_players: usize) -> bool {
        non_host_players >= self.min_non_host_players
    }

    /// Validates a create-game request and builds its body.
    pub fn validate_create(&self, max_players: u32) -> Result<CreateGame, RuleError> {
        if !self.table_sizes().contains(&max_players) {
            return Err(RuleError::MaxPlayersOutOfRange {
                requested: max_players,
                min: self.min_table_size,
                max: self.max_table_size,
            });
        }
        Ok(CreateGame {
            min_players: self.min_table_size,
            max_players,
        })
    }
}

/// Body of a create-game request, as the game API expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub min_players: u32,
    pub max_players: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_rules_default() {
        let rules = RoomRules::default();
        assert_eq!(rules.min_non_host_players, 4);
        assert_eq!(rules.table_sizes(), 4..=8);
    }

    #[test]
    fn test_can_start_needs_four_non_host_players() {
        let rules = RoomRules::default();
        assert!(!rules.can_start(0));
        assert!(!rules.can_start(3));
        assert!(rules.can_start(4));
        assert!(rules.can_start(7));
    }

    #[test]
    fn test_validate_create_accepts_range_bounds() {
        let rules = RoomRules::default();
        assert_eq!(
            rules.validate_create(4).unwrap(),
            CreateGame {
                min_players: 4,
                max_players: 4
            }
        );
        assert_eq!(rules.validate_create(8).unwrap().max_players, 8);
    }

    #[test]
    fn test_validate_create_rejects_out_of_range() {
        let rules = RoomRules::default();
        for bad in [0, 3, 9, 100] {
            assert!(matches!(
                rules.validate_create(bad),
                Err(RuleError::MaxPlayersOutOfRange { requested, .. }) if requested == bad
            ));
        }
    }

    #[test]
    fn test_create_game_serializes_camel_case() {
        let body = RoomRules::default().validate_create(6).unwrap();
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"minPlayers":4,"maxPlayers":6}"#
        );
    }
}
