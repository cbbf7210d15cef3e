// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live MIDI capture.
//!
//! The inbound callback owns a `CaptureContext`: it stamps each message,
//! hands it to the pipeline over a channel while armed, and forwards it to
//! the passthrough output. The pipeline is the only writer of the
//! `CaptureBuffer`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::midi::{InboundCallback, MidiMessage, Passthrough};

/// A message as received from the input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Raw MIDI bytes
    pub bytes: Vec<u8>,
    /// Arrival time
    pub timestamp: Instant,
}

impl RawEvent {
    pub fn new(bytes: impl Into<Vec<u8>>, timestamp: Instant) -> Self {
        Self {
            bytes: bytes.into(),
            timestamp,
        }
    }

    /// Stamp a message with the current time
    pub fn now(bytes: &[u8]) -> Self {
        Self::new(bytes, Instant::now())
    }
}

/// Captured events in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureBuffer {
    events: Vec<RawEvent>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: RawEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Reference time for delta computation.
    ///
    /// The arrival time of the first note-on, or of the first event when the
    /// buffer holds no note-on. `None` for an empty buffer.
    pub fn base_time(&self) -> Option<Instant> {
        self.events
            .iter()
            .find(|event| {
                MidiMessage::from_bytes(&event.bytes)
                    .map(|msg| msg.is_note_on())
                    .unwrap_or(false)
            })
            .or_else(|| self.events.first())
            .map(|event| event.timestamp)
    }
}

impl FromIterator<RawEvent> for CaptureBuffer {
    fn from_iter<I: IntoIterator<Item = RawEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CaptureBuffer {
    type Item = &'a RawEvent;
    type IntoIter = std::slice::Iter<'a, RawEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Shared arm flag between the pipeline and the inbound callback
#[derive(Debug, Clone, Default)]
pub struct ArmState {
    armed: Arc<AtomicBool>,
}

impl ArmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// State carried by the inbound callback for one connection
pub struct CaptureContext {
    arm: ArmState,
    events: Sender<RawEvent>,
    passthrough: Passthrough,
}

impl CaptureContext {
    pub fn new(arm: ArmState, events: Sender<RawEvent>, passthrough: Passthrough) -> Self {
        Self {
            arm,
            events,
            passthrough,
        }
    }

    /// Handle one inbound message: record while armed, then forward
    pub fn on_message(&mut self, message: &[u8]) {
        if self.arm.is_armed() {
            if self.events.send(RawEvent::now(message)).is_err() {
                debug!("Capture pipeline gone, dropping inbound message");
            }
        }

        if let Err(e) = self.passthrough.send(message) {
            warn!("MIDI passthrough failed: {}", e);
        }
    }

    /// Box this context into a backend callback
    pub fn into_callback(mut self) -> InboundCallback {
        Box::new(move |message: &[u8]| self.on_message(message))
    }
}
