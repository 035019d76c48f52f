//! Client-side session state for Cardroom.
//!
//! Everything a client keeps about "the game I'm sitting at" lives here:
//!
//! - **Channels** ([`Channel`], [`Subscription`]): ordered multicast
//!   delivery with explicit unsubscribe and no replay.
//! - **Multiplexer** ([`EventMultiplexer`]): one channel per inbound
//!   event kind, plus `errors` and `connected`.
//! - **Mirror** ([`StateReconciler`], [`ResyncGate`]): the latest
//!   authoritative snapshot, replaced wholesale.
//! - **Authority** ([`AuthorityTracker`], [`HostAuthority`]): who may act
//!   as host right now, and whether the session is still valid.
//! - **Collaborators** ([`IdentityCell`], [`SessionApi`]): who the viewer
//!   is, and the request/response half of the game API.
//!
//! # Data flow
//!
//! ```text
//!  frames ─► EventMultiplexer ─┬─► StateReconciler (gameState)
//!                              ├─► AuthorityTracker (host*/forceLeaveAll)
//!                              └─► application subscribers
//! ```

mod api;
mod authority;
mod channel;
mod error;
mod identity;
mod multiplexer;
mod reconciler;

pub use api::SessionApi;
pub use authority::{AuthorityTracker, Eviction, HostAuthority};
pub use channel::{Channel, Subscription, SubscriptionSet};
pub use error::{ApiError, ErrorEvent};
pub use identity::IdentityCell;
pub use multiplexer::EventMultiplexer;
pub use reconciler::{ResyncGate, StateReconciler};
