//! Pipeline run wiring and the outer supervision loop
//!
//! A pipeline run is one upstream connection plus everything downstream of
//! it: keep-alive filtering, decoding, windowing, and concurrent delivery.
//! The supervisor runs pipeline runs back to back - any terminal signal,
//! clean upstream close or fault anywhere in the chain, triggers an
//! immediate reconnect with no backoff. The only way out is the shutdown
//! gate.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::message::{self, Message};
use crate::sink::{self, BatchSink, WebhookSink};
use crate::source;
use crate::window::{self, Window};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;

/// Process-wide liveness gate.
///
/// Cloned into every place that must observe shutdown: the supervisor
/// consults it before each restart, and the pipeline read loop selects on
/// it so an in-progress run winds down cleanly (flush, drain, return)
/// instead of relying on process termination.
#[derive(Clone)]
pub struct ShutdownGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the gate has been triggered (immediately if it
    /// already was).
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for ShutdownGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the relay pipeline over an arbitrary frame stream.
///
/// Wires filter -> decoder -> windower -> dispatcher over bounded channels
/// and drives the read loop. Terminal conditions:
/// - stream end: clean teardown, `Ok` once every window is delivered
/// - stream fault: teardown, but the partial window is still flushed and
///   in-flight deliveries still complete before the fault is returned
/// - dispatcher fault (failed delivery): the run is abandoned
/// - gate trigger: reads stop, everything flushes and drains, `Ok`
pub async fn run_pipeline_on<S>(
    mut frames: S,
    sink: Arc<dyn BatchSink + Send + Sync>,
    gate: ShutdownGate,
    max_items: usize,
    max_duration: Duration,
) -> Result<(), RelayError>
where
    S: Stream<Item = Result<Bytes, RelayError>> + Unpin,
{
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(256);
    let (win_tx, win_rx) = mpsc::channel::<Window>(32);

    let windower = tokio::spawn(window::run_windower(msg_rx, win_tx, max_items, max_duration));
    let mut dispatcher = tokio::spawn(sink::dispatch_deliveries(win_rx, sink));
    let mut dispatcher_done = false;
    let mut fault: Option<RelayError> = None;

    loop {
        tokio::select! {
            result = &mut dispatcher, if !dispatcher_done => {
                dispatcher_done = true;
                if let Err(e) = result.map_err(RelayError::from).and_then(|r| r) {
                    fault = Some(e);
                }
                break;
            }
            _ = gate.triggered() => {
                log::info!("shutdown gate triggered, winding down pipeline run");
                break;
            }
            chunk = frames.next() => match chunk {
                None => break,
                Some(Err(e)) => {
                    fault = Some(e);
                    break;
                }
                Some(Ok(bytes)) => {
                    if !message::has_payload(&bytes) {
                        continue; // keep-alive frame
                    }
                    match message::decode_frame(&bytes) {
                        Ok(msg) => {
                            if msg_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("⚠️  skipping undecodable frame: {}", e),
                    }
                }
            },
        }
    }

    // Closing the message channel flushes the windower's partial window;
    // the dispatcher then drains every in-flight delivery.
    drop(msg_tx);
    if let Err(e) = windower.await {
        fault.get_or_insert(RelayError::from(e));
    }
    if !dispatcher_done {
        if let Err(e) = dispatcher.await.map_err(RelayError::from).and_then(|r| r) {
            fault.get_or_insert(e);
        }
    }

    match fault {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

/// One production pipeline run: connect upstream, deliver to the webhook.
pub async fn run_pipeline(
    client: &reqwest::Client,
    config: &RelayConfig,
    gate: ShutdownGate,
) -> Result<(), RelayError> {
    let frames = source::connect(client, &config.stream_url, &config.gitter_token).await?;
    let sink: Arc<dyn BatchSink + Send + Sync> = Arc::new(WebhookSink::new(
        client.clone(),
        config.webhook_url.clone(),
    ));
    run_pipeline_on(
        frames,
        sink,
        gate,
        config.window_max_items,
        config.window_duration(),
    )
    .await
}

/// Supervision loop: run pipeline runs back to back until the gate trips.
///
/// Restart is unconditional and immediate on both clean upstream close and
/// any fault. No backoff, no circuit breaker, no run cap.
pub async fn supervise<F, Fut>(gate: ShutdownGate, mut run: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RelayError>>,
{
    let mut runs: u64 = 0;

    while !gate.is_shutdown() {
        runs += 1;
        log::info!("🔁 starting relay run #{}", runs);
        match run().await {
            Ok(()) => log::info!("upstream closed (run #{}), reconnecting", runs),
            Err(e) => log::error!("❌ relay run #{} failed: {}", runs, e),
        }
    }

    log::info!("✅ supervisor stopped after {} runs", runs);
}
