//! The session's single event loop.
//!
//! Everything that reaches session subscribers goes through here, one
//! event at a time: frames and faults from the link, and results produced
//! by the session's own background work (re-fetches, failed leaves).
//!
//! The loop re-checks the teardown flag before every event, so once a
//! handler has torn the session down (e.g. on `forceLeaveAll`) nothing
//! queued behind it is processed.

use std::sync::Arc;

use cardroom_protocol::Game;
use cardroom_session::{ApiError, ErrorEvent, SessionApi};
use tokio::sync::mpsc;

use crate::lifecycle::{ExitReason, SessionInner};
use crate::link::{Link, LinkEvent, LinkEvents};

/// Work handed back to the loop by the session's own tasks.
#[derive(Debug)]
pub(crate) enum LoopEvent {
    /// A re-fetched snapshot (or why it could not be fetched).
    Resynced(Result<Game, ApiError>),
    /// An error to surface on the `errors` channel.
    Report(ErrorEvent),
}

pub(crate) async fn run<L: Link, A: SessionApi>(
    inner: Arc<SessionInner<L, A>>,
    mut link_events: LinkEvents,
    mut loop_events: mpsc::UnboundedReceiver<LoopEvent>,
) {
    let mut exit = inner.exit_watch();

    loop {
        if inner.is_torn_down() {
            break;
        }
        tokio::select! {
            biased;
            _ = exit.changed() => break,
            Some(event) = loop_events.recv() => on_loop_event(&inner, event),
            event = link_events.recv() => match event {
                Some(event) => on_link_event(&inner, event),
                None => {
                    inner.teardown(ExitReason::LinkLost);
                    break;
                }
            },
        }
    }
    tracing::debug!(room_code = %inner.room_code(), "session loop stopped");
}

fn on_link_event<L: Link, A: SessionApi>(inner: &SessionInner<L, A>, event: LinkEvent) {
    match event {
        LinkEvent::Frame(text) => {
            inner.events().route_frame(inner.codec(), &text);
        }
        LinkEvent::Connected(id) => inner.events().announce_connected(id),
        LinkEvent::Fault(error) => inner.events().report(error),
        LinkEvent::Lost => {
            inner.teardown(ExitReason::LinkLost);
        }
    }
}

fn on_loop_event<L: Link, A: SessionApi>(inner: &SessionInner<L, A>, event: LoopEvent) {
    match event {
        LoopEvent::Resynced(Ok(game)) => {
            tracing::debug!(room_code = %inner.room_code(), "applying re-fetched snapshot");
            inner.state().replace(game);
        }
        LoopEvent::Resynced(Err(e)) => {
            tracing::warn!(room_code = %inner.room_code(), error = %e, "re-fetch failed");
            inner.events().report(e.into());
        }
        LoopEvent::Report(error) => inner.events().report(error),
    }
}
