//! Delivery sink and the concurrent dispatch stage
//!
//! Each closed window is aggregated and POSTed to the webhook as one
//! request. Dispatch fans out: every window immediately gets its own
//! delivery task, so a slow delivery never holds up the next window.
//! Completion order across deliveries is therefore not guaranteed to match
//! window-close order.
//!
//! A delivery fault is not retried here; it terminates the pipeline run and
//! the supervisor reconnects from scratch.

use crate::aggregate;
use crate::error::RelayError;
use crate::window::Window;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Outbound batch delivery. Trait seam so tests can substitute an
/// in-memory sink for the real webhook.
#[async_trait]
pub trait BatchSink {
    /// Send one batch. Completes only once the remote's acknowledgment has
    /// been received and fully consumed, whatever its content.
    async fn deliver(&self, batch: &str) -> Result<(), RelayError>;
}

/// Production sink: one JSON POST per batch to the webhook URL.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

/// Webhook envelope. Built with serde_json so a quote in the batch cannot
/// corrupt the payload.
fn envelope(batch: &str) -> serde_json::Value {
    serde_json::json!({ "text": batch })
}

#[async_trait]
impl BatchSink for WebhookSink {
    async fn deliver(&self, batch: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(envelope(batch).to_string())
            .send()
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        let status = response.status();
        // Consume the acknowledgment body before judging the status
        let _ack = response
            .bytes()
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::Delivery(format!("webhook returned {}", status)));
        }

        log::debug!("delivered batch ({} bytes)", batch.len());
        Ok(())
    }
}

/// Dispatch stage: aggregate and deliver every window from `rx`.
///
/// Fan-out is unbounded: each window spawns its own delivery task the
/// moment it arrives. Returns `Ok` only after the window channel has closed
/// and every in-flight delivery has finished, so windows in flight at
/// upstream disconnect still complete. The first delivery fault is returned
/// immediately; the run is being abandoned for a full restart anyway.
pub async fn dispatch_deliveries(
    mut rx: mpsc::Receiver<Window>,
    sink: Arc<dyn BatchSink + Send + Sync>,
) -> Result<(), RelayError> {
    let mut inflight: JoinSet<Result<(), RelayError>> = JoinSet::new();

    loop {
        tokio::select! {
            window = rx.recv() => match window {
                Some(window) => {
                    let sink = Arc::clone(&sink);
                    inflight.spawn(async move {
                        // The batch lives only as long as its own delivery
                        let batch = aggregate::aggregate(&window);
                        sink.deliver(&batch).await
                    });
                }
                None => break,
            },
            Some(result) = inflight.join_next() => {
                result??;
            }
        }
    }

    while let Some(result) = inflight.join_next().await {
        result??;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Mutex;
    use tokio::time::{self, Duration, Instant};

    fn make_window(texts: &[&str]) -> Window {
        let mut window = Window::open();
        for (i, text) in texts.iter().enumerate() {
            window.push(Message {
                id: format!("id{}", i),
                author: "tester".to_string(),
                sent_at: "2015-03-05T14:07:03.413Z".to_string(),
                text: text.to_string(),
            });
        }
        window
    }

    /// Records every delivered batch; optionally delays or fails.
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
        delay: Duration,
        fail: bool,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail: false,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                delay,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail: true,
            })
        }

        fn batches(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn deliver(&self, batch: &str) -> Result<(), RelayError> {
            if !self.delay.is_zero() {
                time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(RelayError::Delivery("simulated webhook failure".to_string()));
            }
            self.delivered.lock().unwrap().push(batch.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_envelope_shape() {
        let body = envelope("a\\nb").to_string();
        assert_eq!(body, r#"{"text":"a\\nb"}"#);

        // A quote in the batch must not break the JSON
        let tricky = envelope(r#"he said "hi""#).to_string();
        let parsed: serde_json::Value = serde_json::from_str(&tricky).unwrap();
        assert_eq!(parsed["text"], r#"he said "hi""#);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_all_windows() {
        let (tx, rx) = mpsc::channel(8);
        let sink = RecordingSink::new();

        tx.send(make_window(&["one"])).await.unwrap();
        tx.send(make_window(&["two"])).await.unwrap();
        drop(tx);

        dispatch_deliveries(rx, sink.clone()).await.unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().any(|b| b.contains("one")));
        assert!(batches.iter().any(|b| b.contains("two")));
    }

    #[tokio::test]
    async fn test_empty_window_is_sent_not_suppressed() {
        let (tx, rx) = mpsc::channel(8);
        let sink = RecordingSink::new();

        tx.send(Window::open()).await.unwrap();
        drop(tx);

        dispatch_deliveries(rx, sink.clone()).await.unwrap();
        assert_eq!(sink.batches(), vec![String::new()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliveries_run_concurrently() {
        // Two deliveries that each take 100ms finish together, not serially
        let (tx, rx) = mpsc::channel(8);
        let sink = RecordingSink::slow(Duration::from_millis(100));

        tx.send(make_window(&["one"])).await.unwrap();
        tx.send(make_window(&["two"])).await.unwrap();
        drop(tx);

        let start = Instant::now();
        dispatch_deliveries(rx, sink.clone()).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(150));
        assert_eq!(sink.batches().len(), 2);
    }

    #[tokio::test]
    async fn test_delivery_fault_propagates() {
        let (tx, rx) = mpsc::channel(8);
        let sink = RecordingSink::failing();

        tx.send(make_window(&["one"])).await.unwrap();
        drop(tx);

        let err = dispatch_deliveries(rx, sink).await.unwrap_err();
        assert!(matches!(err, RelayError::Delivery(_)));
    }
}
