// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Capture pipeline: control commands in, status notifications out.
//!
//! One pipeline instance serves one recording session. A dedicated worker
//! thread owns the ports and the capture buffer, polls the control queue at
//! a fixed interval, and terminates after STOP_RECORD has been handled.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::midi::{DevicePorts, MidiBackend, OutputSelection};

use super::capture::{ArmState, CaptureBuffer, CaptureContext, RawEvent};
use super::export::encode_capture;

/// Commands accepted by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the input port and the output port (or virtual output)
    Connect { input: usize, output: OutputSelection },
    /// Clear the buffer and start capturing with this session config
    StartRecord(SessionConfig),
    /// Stop capturing, write the file and shut the pipeline down
    StopRecord,
}

/// Notifications produced by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Status(String),
    Error(String),
}

impl Notification {
    pub fn is_error(&self) -> bool {
        matches!(self, Notification::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notification::Status(msg) | Notification::Error(msg) => msg,
        }
    }
}

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No ports open
    Idle,
    /// Ports open, passing messages through without recording
    Connected,
    /// Ports open and recording
    Armed,
}

/// What the run loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Terminate,
}

/// Worker-side pipeline
struct CapturePipeline<B: MidiBackend> {
    state: PipelineState,
    ports: DevicePorts<B>,
    arm: ArmState,
    buffer: CaptureBuffer,
    session: Option<SessionConfig>,
    event_tx: Sender<RawEvent>,
    event_rx: Receiver<RawEvent>,
    notifications: Sender<Notification>,
}

impl<B: MidiBackend> CapturePipeline<B> {
    fn new(backend: B, notifications: Sender<Notification>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            state: PipelineState::Idle,
            ports: DevicePorts::new(backend),
            arm: ArmState::new(),
            buffer: CaptureBuffer::new(),
            session: None,
            event_tx,
            event_rx,
            notifications,
        }
    }

    fn run(mut self, commands: Receiver<Command>, poll_interval: Duration) {
        loop {
            match commands.recv_timeout(poll_interval) {
                Ok(command) => {
                    if self.handle(command) == Flow::Terminate {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.arm.disarm();
                    self.collect_pending();
                    warn!(
                        "Control channel closed, discarding {} captured events",
                        self.buffer.len()
                    );
                    break;
                }
            }
            self.collect_pending();
        }

        self.ports.close();
        debug!("Capture pipeline terminated");
    }

    fn handle(&mut self, command: Command) -> Flow {
        debug!("Pipeline command {:?} in state {:?}", command, self.state);
        match command {
            Command::Connect { input, output } => self.connect(input, output),
            Command::StartRecord(config) => self.start_recording(config),
            Command::StopRecord => {
                self.stop_recording();
                return Flow::Terminate;
            }
        }
        Flow::Continue
    }

    fn connect(&mut self, input: usize, output: OutputSelection) {
        if self.state == PipelineState::Armed {
            self.error("Cannot change devices while recording".to_string());
            return;
        }

        let arm = self.arm.clone();
        let events = self.event_tx.clone();
        let result = self.ports.open(input, output, move |passthrough| {
            CaptureContext::new(arm, events, passthrough).into_callback()
        });

        match result {
            Ok(()) => {
                self.state = PipelineState::Connected;
                info!("Connected input {} to output {:?}", input, output);
                self.status("Device connected".to_string());
            }
            Err(e) => {
                self.state = PipelineState::Idle;
                self.error(e.to_string());
            }
        }
    }

    fn start_recording(&mut self, config: SessionConfig) {
        match self.state {
            PipelineState::Idle => {
                self.error("Cannot start recording: no device connected".to_string());
                return;
            }
            PipelineState::Armed => {
                self.error("Recording already in progress".to_string());
                return;
            }
            PipelineState::Connected => {}
        }
        if let Err(e) = config.validate() {
            self.error(e.to_string());
            return;
        }

        // Nothing queued before arming belongs to this session
        while self.event_rx.try_recv().is_ok() {}
        self.buffer.clear();
        self.session = Some(config);
        self.arm.arm();
        self.state = PipelineState::Armed;
        info!("Recording started");
        self.status("Recording started".to_string());
    }

    fn stop_recording(&mut self) {
        if self.state != PipelineState::Armed {
            self.ports.close();
            self.state = PipelineState::Idle;
            self.status("Stopped without recording".to_string());
            return;
        }

        // Disarm, then close the input so no callback is still in flight
        self.arm.disarm();
        self.ports.close();
        self.collect_pending();
        self.state = PipelineState::Idle;

        let buffer = std::mem::take(&mut self.buffer);
        let Some(config) = self.session.take() else {
            return;
        };
        self.save(buffer, &config);
    }

    fn save(&self, buffer: CaptureBuffer, config: &SessionConfig) {
        let Some(encoded) = encode_capture(&buffer, config) else {
            info!("Recording stopped with no events, nothing written");
            return;
        };

        for invalid in &encoded.invalid {
            self.error(invalid.to_string());
        }
        if encoded.dropped_note_offs > 0 {
            warn!("Dropped {} stale note-off events", encoded.dropped_note_offs);
        }
        if encoded.clamped_deltas > 0 {
            self.error(format!(
                "{} delta times exceeded the MIDI file limit and were shortened",
                encoded.clamped_deltas
            ));
        }

        match encoded.smf.save(config.target_path()) {
            Ok(path) => {
                info!("Saved {} events to {:?}", buffer.len(), path);
                self.status(format!("File saved: {}", path.display()));
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    /// Move events delivered by the callback into the buffer
    fn collect_pending(&mut self) {
        for event in self.event_rx.try_iter() {
            self.buffer.push(event);
        }
    }

    fn status(&self, message: String) {
        let _ = self.notifications.send(Notification::Status(message));
    }

    fn error(&self, message: String) {
        warn!("{}", message);
        let _ = self.notifications.send(Notification::Error(message));
    }
}

/// Collaborator-side handle to a running capture pipeline
pub struct RecorderHandle {
    commands: Sender<Command>,
    notifications: Receiver<Notification>,
    worker: JoinHandle<()>,
}

impl RecorderHandle {
    /// Spawn a pipeline worker over `backend`
    pub fn spawn<B: MidiBackend + 'static>(backend: B, poll_interval: Duration) -> Result<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (notification_tx, notifications) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("midi-capture".to_string())
            .spawn(move || {
                CapturePipeline::new(backend, notification_tx).run(command_rx, poll_interval);
            })?;

        Ok(Self {
            commands,
            notifications,
            worker,
        })
    }

    /// Enqueue a command
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::PipelineClosed)
    }

    /// Enqueue CONNECT
    pub fn connect(&self, input: usize, output: OutputSelection) -> Result<()> {
        self.send(Command::Connect { input, output })
    }

    /// Enqueue START_RECORD
    pub fn start_record(&self, config: SessionConfig) -> Result<()> {
        self.send(Command::StartRecord(config))
    }

    /// Enqueue STOP_RECORD
    pub fn stop_record(&self) -> Result<()> {
        self.send(Command::StopRecord)
    }

    /// Next pending notification, if any
    pub fn try_notification(&self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }

    /// Wait up to `timeout` for a notification
    pub fn recv_notification_timeout(&self, timeout: Duration) -> Option<Notification> {
        self.notifications.recv_timeout(timeout).ok()
    }

    /// All pending notifications
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    /// Whether the worker has terminated
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to terminate and return the remaining notifications
    pub fn join(self) -> Vec<Notification> {
        if self.worker.join().is_err() {
            warn!("Capture worker panicked");
        }
        self.notifications.try_iter().collect()
    }
}
