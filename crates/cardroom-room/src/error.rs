//! Error types for the room layer.

/// A request that breaks the local table rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The requested table size is outside the allowed range.
    #[error("max players must be between {min} and {max}, got {requested}")]
    MaxPlayersOutOfRange { requested: u32, min: u32, max: u32 },
}
