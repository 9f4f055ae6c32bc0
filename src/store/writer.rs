//! Notification writer
//!
//! A single consumer thread that applies queued change events to the store in
//! arrival order. While a rebuild is running the writer can be *held*: live
//! events are buffered instead of applied, then replayed once the rebuild
//! releases them, so a reset never wipes out changes seen during the scan.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use super::StoreInner;
use crate::error::Result;
use crate::schema::{ChangeEvent, ChangeKind};

/// Messages accepted by the notification writer
#[derive(Debug)]
pub enum WriterMessage {
    /// A change to apply
    Event(ChangeEvent),
    /// Start buffering events
    Hold,
    /// Replay buffered events and resume direct application
    Release,
    /// Acknowledge once every earlier message has been handled
    Barrier(Sender<()>),
    /// Apply held events, then exit
    Shutdown,
}

pub(crate) fn spawn(
    store: Arc<StoreInner>,
    rx: Receiver<WriterMessage>,
    hold_limit: usize,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("fsindex-writer".to_string())
        .spawn(move || NotificationWriter::new(store, hold_limit).run(rx))?;
    Ok(handle)
}

struct NotificationWriter {
    store: Arc<StoreInner>,
    hold_limit: usize,
    held: Option<VecDeque<ChangeEvent>>,
}

impl NotificationWriter {
    fn new(store: Arc<StoreInner>, hold_limit: usize) -> Self {
        Self {
            store,
            hold_limit,
            held: None,
        }
    }

    fn run(mut self, rx: Receiver<WriterMessage>) {
        tracing::debug!("notification writer started");

        while let Ok(message) = rx.recv() {
            match message {
                WriterMessage::Event(event) => self.accept(event),
                WriterMessage::Hold => {
                    if self.held.is_none() {
                        self.held = Some(VecDeque::new());
                    }
                }
                WriterMessage::Release => self.release(),
                WriterMessage::Barrier(ack) => {
                    let _ = ack.send(());
                }
                WriterMessage::Shutdown => {
                    self.release();
                    break;
                }
            }
        }

        tracing::debug!("notification writer stopped");
    }

    fn accept(&mut self, event: ChangeEvent) {
        let Some(held) = self.held.as_mut() else {
            self.apply(&event);
            return;
        };

        held.push_back(event);
        if held.len() > self.hold_limit {
            tracing::warn!(
                "held event buffer exceeded {} entries, applying live events early",
                self.hold_limit
            );
            self.release();
        }
    }

    fn release(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };
        if !held.is_empty() {
            tracing::info!("replaying {} held change events", held.len());
        }
        for event in held {
            self.apply(&event);
        }
    }

    fn apply(&self, event: &ChangeEvent) {
        let result = match (event.kind, &event.record) {
            (ChangeKind::Removed | ChangeKind::RenameFrom, _) => self.store.delete(&event.path),
            (_, Some(record)) => self.store.upsert(record),
            (kind, None) => {
                tracing::warn!("{} event without metadata: {}", kind.as_str(), event.path);
                return;
            }
        };

        match result {
            Ok(()) => tracing::trace!("{} {}", event.kind.as_str(), event.path),
            Err(e) => tracing::warn!("{} {} failed, {}", event.kind.as_str(), event.path, e),
        }
    }
}
