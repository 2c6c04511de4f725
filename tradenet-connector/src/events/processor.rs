//! # Event-Bus Processor
//!
//! [`BusEventProcessor`] maintains a best-effort continuous read loop over the
//! data node's push-event stream, transparently recovering from transport
//! failure, and hands every received batch to a caller-supplied classifier.
//!
//! ## Loop behaviour
//!
//! Each [`BusEventProcessor::process_events`] call spawns one independent
//! background task. The task obtains a stream (dialling the node first when
//! necessary), sends the subscription filter once, then receives batches until
//! the classifier stops it or the cancellation token fires.
//!
//! Failure handling is typed, not textual:
//!
//! - [`StreamError::ConnectionNotReady`] while obtaining a stream triggers a
//!   full redial of the underlying connection followed by an immediate
//!   resubscribe.
//! - Any other obtain failure is retried forever on a fixed delay, logged
//!   with an incrementing attempt counter. Bounding the wait is the caller's
//!   job, via the token.
//! - A receive failure on an established stream emits a paused
//!   [`PauseSignal`], re-obtains the stream, then emits a resumed signal.
//!   Both emissions are lossy try-sends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::{StreamError, WaitError};
use crate::events::{BusEvent, SubscriptionFilter};
use crate::types::PauseSignal;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Dialer and stream opener for the event bus.
#[async_trait]
pub trait BusStreamer: Send + Sync + 'static {
    type Stream: EventStream;

    /// Blocks until the underlying connection is established. Must be
    /// idempotent: concurrent callers collapse into a single dial attempt and
    /// all return once the connection is ready.
    async fn must_dial_connection(&self);

    /// Opens a fresh event-bus stream. Fails with
    /// [`StreamError::ConnectionNotReady`] while the connection is down.
    async fn observe_event_bus(&self) -> Result<Self::Stream, StreamError>;
}

/// One open stream: a subscription filter is sent exactly once, then batches
/// are received until the stream errors or its owner goes away.
#[async_trait]
pub trait EventStream: Send {
    async fn subscribe(&mut self, filter: &SubscriptionFilter) -> Result<(), StreamError>;

    async fn recv(&mut self) -> Result<Vec<BusEvent>, StreamError>;
}

/// What the classifier wants the processing loop to do after a batch.
#[derive(Debug)]
pub enum BatchVerdict {
    /// Keep consuming events.
    Continue,
    /// Forward an error to the subscription owner but keep the loop alive.
    Report(WaitError),
    /// Stop the loop without an error.
    Done,
    /// Forward an error and stop the loop.
    Fail(WaitError),
}

/// Handle on one spawned processing loop.
///
/// The error channel holds at most one entry and closes when the loop exits;
/// an error is dropped when the buffer is already occupied. A loop that ends
/// without reporting anything (verdict [`BatchVerdict::Done`] or
/// cancellation) just closes the channel.
pub struct Subscription {
    errors: mpsc::Receiver<WaitError>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Waits for the loop's next reported error. `None` means the loop exited
    /// without one.
    pub async fn recv_err(&mut self) -> Option<WaitError> {
        self.errors.recv().await
    }

    /// Waits for the loop task to finish. Cancel the token first, or this
    /// may never return.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns and configures event-bus processing loops over a shared node handle.
pub struct BusEventProcessor<S> {
    node: Arc<S>,
    pause_tx: Option<mpsc::Sender<PauseSignal>>,
    retry_delay: Duration,
}

impl<S: BusStreamer> BusEventProcessor<S> {
    pub fn new(node: Arc<S>) -> Self {
        Self {
            node,
            pause_tx: None,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Registers a channel for [`PauseSignal`]s bracketing every reconnect.
    pub fn with_pause_channel(mut self, pause_tx: mpsc::Sender<PauseSignal>) -> Self {
        self.pause_tx = Some(pause_tx);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Starts a background loop that feeds every received batch to `on_batch`
    /// and returns immediately with a handle on it.
    ///
    /// The loop runs until `on_batch` stops it, the token is cancelled, or a
    /// not-yet-subscribed stream cannot be obtained before cancellation.
    /// There is no retry bound: callers needing a bounded wait must cancel
    /// the token or time out on [`Subscription::recv_err`].
    pub fn process_events(
        &self,
        token: CancellationToken,
        name: impl Into<String>,
        filter: SubscriptionFilter,
        on_batch: impl FnMut(Vec<BusEvent>) -> BatchVerdict + Send + 'static,
    ) -> Subscription {
        let (err_tx, err_rx) = mpsc::channel(1);
        let run = ProcessLoop {
            node: Arc::clone(&self.node),
            pause_tx: self.pause_tx.clone(),
            retry_delay: self.retry_delay,
            token,
            name: name.into(),
            filter,
            errors: err_tx,
        };
        Subscription {
            errors: err_rx,
            task: tokio::spawn(run.consume(on_batch)),
        }
    }
}

struct ProcessLoop<S: BusStreamer> {
    node: Arc<S>,
    pause_tx: Option<mpsc::Sender<PauseSignal>>,
    retry_delay: Duration,
    token: CancellationToken,
    name: String,
    filter: SubscriptionFilter,
    errors: mpsc::Sender<WaitError>,
}

impl<S: BusStreamer> ProcessLoop<S> {
    async fn consume(self, mut on_batch: impl FnMut(Vec<BusEvent>) -> BatchVerdict + Send) {
        let Some(mut stream) = self.obtain_stream().await else {
            return;
        };
        loop {
            let batch = tokio::select! {
                _ = self.token.cancelled() => return,
                batch = stream.recv() => batch,
            };
            match batch {
                Ok(events) => match on_batch(events) {
                    BatchVerdict::Continue => {}
                    BatchVerdict::Report(err) => {
                        tracing::warn!(name = %self.name, %err, "unable to process event batch");
                        self.forward(err);
                    }
                    BatchVerdict::Done => return,
                    BatchVerdict::Fail(err) => {
                        self.forward(err);
                        return;
                    }
                },
                Err(err) => {
                    tracing::warn!(name = %self.name, %err, "stream closed, resubscribing");
                    self.pause(true);
                    let Some(next) = self.obtain_stream().await else {
                        return;
                    };
                    stream = next;
                    self.pause(false);
                }
            }
        }
    }

    /// Obtains a subscribed stream, redialling or retrying as long as it
    /// takes. `None` only on cancellation.
    async fn obtain_stream(&self) -> Option<S::Stream> {
        let mut attempt = 0u32;
        loop {
            if self.token.is_cancelled() {
                return None;
            }
            match self.get_stream().await {
                Ok(stream) => return Some(stream),
                Err(StreamError::ConnectionNotReady) => {
                    tracing::warn!(name = %self.name, attempt, "node is not ready, reconnecting");
                    self.node.must_dial_connection().await;
                    tracing::debug!(
                        name = %self.name,
                        attempt,
                        "node reconnected, reattempting to subscribe to stream"
                    );
                }
                Err(err) => {
                    attempt += 1;
                    tracing::error!(
                        name = %self.name,
                        attempt,
                        sleep_time = ?self.retry_delay,
                        %err,
                        "failed to subscribe to stream, retrying",
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => return None,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    async fn get_stream(&self) -> Result<S::Stream, StreamError> {
        let mut stream = self.node.observe_event_bus().await?;
        stream
            .subscribe(&self.filter)
            .await
            .map_err(|err| StreamError::Subscribe(err.to_string()))?;
        Ok(stream)
    }

    fn forward(&self, err: WaitError) {
        // Lossy on purpose: an unconsumed buffer means nobody is waiting.
        let _ = self.errors.try_send(err);
    }

    fn pause(&self, paused: bool) {
        let Some(pause_tx) = &self.pause_tx else {
            return;
        };
        let _ = pause_tx.try_send(PauseSignal {
            source: self.name.clone(),
            paused,
        });
    }
}
