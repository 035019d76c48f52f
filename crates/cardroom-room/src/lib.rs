//! Table actions and rules for Cardroom clients.
//!
//! This crate decides whether the viewing user may *attempt* an action,
//! and turns permitted actions into outbound events:
//!
//! - [`ActionDispatcher`] checks capabilities (host-only vs. non-host-only,
//!   minimum members to start) against an [`ActorView`] and forwards to an
//!   [`OutboundSink`].
//! - [`RoomRules`] holds the member-count bounds and validates create-game
//!   requests.
//!
//! Gating here is advisory: the server still enforces every rule.

mod dispatch;
mod error;
mod rules;

pub use dispatch::{Action, ActionDispatcher, ActorView, Dispatch, OutboundSink, Refusal};
pub use error::RuleError;
pub use rules::{CreateGame, RoomRules};
