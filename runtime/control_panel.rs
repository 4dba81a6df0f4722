/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Control Panel: async adapter between the transport and the synchronous
//! session reducer.
//!
//! Round-trips and subscriptions run as supervised tokio tasks. They never
//! touch the graph; every result comes back as a [`QueuedEvent`] on one mpsc
//! channel, and the session drains that channel once per tick via
//! [`ControlPanel::drain_pending`]. The reducer therefore stays synchronous
//! and deterministic for a given drained order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::graph::GraphId;
use crate::services::transport::{
    GraphTransport, MutationOutput, MutationRequest, RawGraph, RemoteEvent,
};

/// Capacity of the event channel; limits flooding from a chatty subscription.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session-local correlation id of a mutation round-trip.
pub(crate) type MutationId = u64;

/// Work the session hands to the panel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TransportCommand {
    Fetch { graph_id: GraphId },
    Subscribe { graph_id: GraphId },
    Mutate { id: MutationId, request: MutationRequest },
}

/// Something that happened off the frame loop.
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    SourceLoaded {
        graph_id: GraphId,
        result: Result<RawGraph, TransportError>,
    },
    Remote {
        graph_id: GraphId,
        event: RemoteEvent,
    },
    MutationResolved {
        id: MutationId,
        request: MutationRequest,
        result: Result<MutationOutput, TransportError>,
    },
}

/// Producer of a queued event, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EventSource {
    /// Push stream of a source graph.
    Subscription,
    /// Completion of a fetch or mutation round-trip.
    Transport,
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedEvent {
    pub(crate) event: SessionEvent,
    pub(crate) queued_at: Instant,
    pub(crate) source: EventSource,
}

/// Decrements the in-flight counter however the task ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns:
/// - the event `mpsc` channel (capacity [`EVENT_CHANNEL_CAPACITY`])
/// - a shared [`CancellationToken`] for subscription shutdown
/// - a [`JoinSet`] supervising every spawned task
pub(crate) struct ControlPanel {
    event_tx: mpsc::Sender<QueuedEvent>,
    event_rx: mpsc::Receiver<QueuedEvent>,
    transport: Arc<dyn GraphTransport>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
    /// Runtime captured at construction; `None` outside a tokio context.
    handle: Option<Handle>,
    in_flight: Arc<AtomicUsize>,
}

impl ControlPanel {
    pub(crate) fn new(transport: Arc<dyn GraphTransport>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = Handle::try_current().ok();
        if handle.is_none() {
            log::warn!("control_panel: created outside a tokio runtime; transport calls are disabled");
        }
        Self {
            event_tx,
            event_rx,
            transport,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
            handle,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn submit(&mut self, command: TransportCommand) {
        if self.is_cancelled() {
            log::debug!("control_panel: ignoring {command:?} after shutdown");
            return;
        }
        match command {
            TransportCommand::Fetch { graph_id } => self.spawn_fetch(graph_id),
            TransportCommand::Subscribe { graph_id } => self.spawn_subscription(graph_id),
            TransportCommand::Mutate { id, request } => self.spawn_mutation(id, request),
        }
    }

    /// Drain all pending events (non-blocking) and reap finished tasks.
    pub(crate) fn drain_pending(&mut self) -> Vec<QueuedEvent> {
        while let Some(joined) = self.workers.try_join_next() {
            if let Err(error) = joined
                && error.is_panic()
            {
                log::warn!("control_panel: worker panicked ({error})");
            }
        }
        let mut events = Vec::new();
        while let Ok(queued) = self.event_rx.try_recv() {
            events.push(queued);
        }
        events
    }

    /// Fetches and mutations issued but not yet delivered.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop subscriptions and make further submissions no-ops. In-flight
    /// round-trips still run to completion; their results are discarded.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Supervised tasks not yet reaped, subscriptions included.
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Cancel and await every supervised task.
    pub(crate) async fn shutdown(&mut self) {
        log::debug!(
            "control_panel: shutdown requested, cancelling {} workers",
            self.workers.len()
        );
        self.cancel.cancel();
        while self.workers.join_next().await.is_some() {}
        while self.event_rx.try_recv().is_ok() {}
        log::debug!("control_panel: all workers joined");
    }

    fn spawn_fetch(&mut self, graph_id: GraphId) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        let fetch = self.transport.fetch_graph(&graph_id);
        let tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        let guard = InFlightGuard::enter(&self.in_flight);
        self.workers.spawn_on(
            async move {
                let _guard = guard;
                let result = fetch.await;
                let queued = QueuedEvent {
                    event: SessionEvent::SourceLoaded { graph_id, result },
                    queued_at: Instant::now(),
                    source: EventSource::Transport,
                };
                deliver(&tx, &cancel, queued).await;
            },
            &handle,
        );
    }

    fn spawn_mutation(&mut self, id: MutationId, request: MutationRequest) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        // Issue the call now; only its completion is awaited off-thread.
        let round_trip = request.execute(self.transport.as_ref());
        let tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        let guard = InFlightGuard::enter(&self.in_flight);
        self.workers.spawn_on(
            async move {
                let _guard = guard;
                let result = round_trip.await;
                if let Err(error) = &result {
                    log::debug!(
                        "control_panel: {} #{id} failed ({error})",
                        request.operation()
                    );
                }
                let queued = QueuedEvent {
                    event: SessionEvent::MutationResolved {
                        id,
                        request,
                        result,
                    },
                    queued_at: Instant::now(),
                    source: EventSource::Transport,
                };
                deliver(&tx, &cancel, queued).await;
            },
            &handle,
        );
    }

    fn spawn_subscription(&mut self, graph_id: GraphId) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        let mut events = self.transport.subscribe(&graph_id);
        let tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        self.workers.spawn_on(
            async move {
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => None,
                        next = events.next() => next,
                    };
                    let Some(event) = next else {
                        break;
                    };
                    let queued = QueuedEvent {
                        event: SessionEvent::Remote {
                            graph_id: graph_id.clone(),
                            event,
                        },
                        queued_at: Instant::now(),
                        source: EventSource::Subscription,
                    };
                    if !deliver(&tx, &cancel, queued).await {
                        break;
                    }
                }
                log::debug!("control_panel: subscription to {graph_id} ended");
            },
            &handle,
        );
        log::debug!("control_panel: subscription worker spawned");
    }
}

/// Send unless cancelled first. Returns `false` when the event was not delivered.
async fn deliver(
    tx: &mpsc::Sender<QueuedEvent>,
    cancel: &CancellationToken,
    queued: QueuedEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(queued) => sent.is_ok(),
    }
}
