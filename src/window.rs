//! Dual-trigger micro-batch windowing
//!
//! Groups the decoded message stream into disjoint windows. A window closes
//! the instant either trigger fires: it reaches `max_items`, or
//! `max_duration` has elapsed since the window opened. Windows partition the
//! stream - every message lands in exactly one window, in arrival order.
//!
//! A window opens lazily on the first message after the previous close, and
//! its clock starts at that moment. An idle upstream therefore emits
//! nothing instead of a train of empty windows.

use crate::message::Message;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};

/// An ordered, finite batch of messages plus its open timestamp.
/// Mutated only by appending; sealed once emitted to the delivery stage.
#[derive(Debug)]
pub struct Window {
    opened_at: Instant,
    items: Vec<Message>,
}

impl Window {
    pub fn open() -> Self {
        Self {
            opened_at: Instant::now(),
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.items.push(message);
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Message] {
        &self.items
    }
}

/// Windower task: consume messages from `rx`, emit closed windows on `tx`.
///
/// Runs until the input channel closes (upstream teardown) or the window
/// channel's receiver goes away (delivery stage teardown). If the input
/// closes mid-window the partial window is flushed, never dropped.
///
/// This stage cannot fail; both knobs come from configuration.
pub async fn run_windower(
    mut rx: mpsc::Receiver<Message>,
    tx: mpsc::Sender<Window>,
    max_items: usize,
    max_duration: Duration,
) {
    loop {
        // A window only opens once there is a first message to put in it.
        let first = match rx.recv().await {
            Some(message) => message,
            None => break,
        };

        let mut window = Window::open();
        window.push(first);
        let deadline = window.opened_at() + max_duration;
        let mut input_closed = false;

        while window.len() < max_items {
            tokio::select! {
                _ = time::sleep_until(deadline) => break,
                message = rx.recv() => match message {
                    Some(message) => window.push(message),
                    None => {
                        input_closed = true;
                        break;
                    }
                },
            }
        }

        if tx.send(window).await.is_err() {
            break;
        }
        if input_closed {
            break;
        }
    }

    log::debug!("windower stopped");
}
