// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI I/O abstraction layer.
//!
//! This module provides a trait-based abstraction over platform MIDI ports,
//! allowing the midir backend and the in-process scripted backend to be
//! used interchangeably by the capture pipeline.

pub mod message;
pub mod midir_backend;
pub mod scripted;

use tracing::debug;

use crate::error::{Error, PortDirection, Result};

pub use message::{MetaEvent, MidiMessage, TimeSignature, TimedMessage, TrackEvent};
pub use midir_backend::MidirBackend;
pub use scripted::{ScriptedBackend, ScriptedInjector};

/// Callback invoked once per inbound message, on a backend-owned thread
pub type InboundCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// An open output port.
pub trait OutputSink: Send {
    /// Send a raw MIDI message immediately.
    fn send(&mut self, message: &[u8]) -> Result<()>;
}

/// An open input port. Dropping or closing it stops the callback.
pub trait InputConnection {
    /// Close the port and wait for the callback to be released.
    fn close(self: Box<Self>);
}

/// Platform MIDI access.
///
/// Port indices are the platform-assigned positions in the current device
/// listing.
pub trait MidiBackend: Send {
    /// Names of the available input ports
    fn input_names(&self) -> Result<Vec<String>>;

    /// Names of the available output ports
    fn output_names(&self) -> Result<Vec<String>>;

    /// Open an output port for sending
    fn open_output(&mut self, index: usize) -> Result<Box<dyn OutputSink>>;

    /// Open an input port; `callback` runs for every inbound message
    fn open_input(&mut self, index: usize, callback: InboundCallback) -> Result<Box<dyn InputConnection>>;
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    // System Real-Time Messages
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;

    // System Common Messages
    pub const SYSEX_START: u8 = 0xF0;
    pub const SYSEX_END: u8 = 0xF7;
}

/// Where inbound messages are forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelection {
    /// Record only, never forward
    Virtual,
    /// Forward to the output port with this index
    Port(usize),
}

impl OutputSelection {
    /// Index used in device listings for the virtual entry
    pub const VIRTUAL_INDEX: i32 = -1;

    /// Interpret a listing index (`-1` = virtual)
    pub fn from_index(index: i32) -> Result<Self> {
        match index {
            Self::VIRTUAL_INDEX => Ok(OutputSelection::Virtual),
            i if i >= 0 => Ok(OutputSelection::Port(i as usize)),
            i => Err(Error::PortUnavailable {
                direction: PortDirection::Output,
                index: i as i64,
                available: 0,
            }),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, OutputSelection::Virtual)
    }
}

/// One entry of a device listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub index: i32,
    pub name: String,
}

/// Available inputs and outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceList {
    pub inputs: Vec<DeviceEntry>,
    /// Always starts with the virtual "No output" entry at index -1
    pub outputs: Vec<DeviceEntry>,
}

/// List the ports a backend exposes
pub fn list_devices(backend: &dyn MidiBackend) -> Result<DeviceList> {
    let inputs = backend
        .input_names()?
        .into_iter()
        .enumerate()
        .map(|(i, name)| DeviceEntry { index: i as i32, name })
        .collect();

    let mut outputs = vec![DeviceEntry {
        index: OutputSelection::VIRTUAL_INDEX,
        name: "No output".to_string(),
    }];
    outputs.extend(
        backend
            .output_names()?
            .into_iter()
            .enumerate()
            .map(|(i, name)| DeviceEntry { index: i as i32, name }),
    );

    Ok(DeviceList { inputs, outputs })
}

/// Print a device listing to stdout
pub fn print_devices(list: &DeviceList) {
    if list.inputs.is_empty() {
        println!("No MIDI inputs found.");
    } else {
        println!("Available MIDI inputs:");
        for entry in &list.inputs {
            println!("  {}: {}", entry.index, entry.name);
        }
    }
    println!("Available MIDI outputs:");
    for entry in &list.outputs {
        println!("  {}: {}", entry.index, entry.name);
    }
}

/// Output side of an inbound callback: forwards unless virtual or closed
pub struct Passthrough {
    sink: Option<Box<dyn OutputSink>>,
}

impl Passthrough {
    /// Forwarding disabled
    pub fn virtual_output() -> Self {
        Self { sink: None }
    }

    pub fn to_sink(sink: Box<dyn OutputSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn is_virtual(&self) -> bool {
        self.sink.is_none()
    }

    /// Forward a message; no-op when virtual
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.send(message),
            None => Ok(()),
        }
    }
}

/// Open input/output pair owned by the capture pipeline.
pub struct DevicePorts<B: MidiBackend> {
    backend: B,
    input: Option<Box<dyn InputConnection>>,
}

impl<B: MidiBackend> DevicePorts<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, input: None }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_open(&self) -> bool {
        self.input.is_some()
    }

    /// Open the output (unless virtual), then the input.
    ///
    /// `make_callback` receives the passthrough and builds the inbound
    /// callback around it. Any previously open ports are closed first; on
    /// failure nothing is left open.
    pub fn open<F>(&mut self, input: usize, output: OutputSelection, make_callback: F) -> Result<()>
    where
        F: FnOnce(Passthrough) -> InboundCallback,
    {
        self.close();

        let input_count = self.backend.input_names()?.len();
        if input >= input_count {
            return Err(Error::PortUnavailable {
                direction: PortDirection::Input,
                index: input as i64,
                available: input_count,
            });
        }

        let passthrough = match output {
            OutputSelection::Virtual => Passthrough::virtual_output(),
            OutputSelection::Port(index) => {
                let output_count = self.backend.output_names()?.len();
                if index >= output_count {
                    return Err(Error::PortUnavailable {
                        direction: PortDirection::Output,
                        index: index as i64,
                        available: output_count,
                    });
                }
                Passthrough::to_sink(self.backend.open_output(index)?)
            }
        };

        // The passthrough moves into the callback, so a failed open drops it
        let connection = self.backend.open_input(input, make_callback(passthrough))?;
        self.input = Some(connection);
        debug!("Opened MIDI input {} with output {:?}", input, output);
        Ok(())
    }

    /// Close whatever is open. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(connection) = self.input.take() {
            connection.close();
            debug!("Closed MIDI ports");
        }
    }
}

impl<B: MidiBackend> Drop for DevicePorts<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ignore_input(_: Passthrough) -> InboundCallback {
        Box::new(|_| {})
    }

    /// Mock MIDI output for testing
    struct MockOutput {
        messages: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl OutputSink for MockOutput {
        fn send(&mut self, message: &[u8]) -> Result<()> {
            self.messages.lock().unwrap().push(message.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_passthrough_forwards() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut passthrough = Passthrough::to_sink(Box::new(MockOutput {
            messages: sent.clone(),
        }));

        passthrough.send(&[messages::NOTE_ON, 60, 127]).unwrap();
        assert!(!passthrough.is_virtual());
        assert_eq!(*sent.lock().unwrap(), vec![vec![0x90, 60, 127]]);
    }

    #[test]
    fn test_virtual_passthrough_is_noop() {
        let mut passthrough = Passthrough::virtual_output();
        assert!(passthrough.is_virtual());
        assert!(passthrough.send(&[messages::NOTE_OFF, 60, 0]).is_ok());
    }

    #[test]
    fn test_output_selection_from_index() {
        assert_eq!(OutputSelection::from_index(-1).unwrap(), OutputSelection::Virtual);
        assert_eq!(OutputSelection::from_index(2).unwrap(), OutputSelection::Port(2));
        assert!(matches!(
            OutputSelection::from_index(-3),
            Err(Error::PortUnavailable { .. })
        ));
    }

    #[test]
    fn test_list_devices_prepends_virtual_output() {
        let backend = ScriptedBackend::new(vec!["Keys".into()], vec!["Synth".into()]);
        let list = list_devices(&backend).unwrap();

        assert_eq!(list.inputs, vec![DeviceEntry { index: 0, name: "Keys".into() }]);
        assert_eq!(list.outputs.len(), 2);
        assert_eq!(list.outputs[0].index, -1);
        assert_eq!(list.outputs[0].name, "No output");
        assert_eq!(list.outputs[1], DeviceEntry { index: 0, name: "Synth".into() });
    }

    #[test]
    fn test_open_out_of_range_input_leaves_ports_closed() {
        let backend = ScriptedBackend::new(vec!["Keys".into()], vec![]);
        let mut ports = DevicePorts::new(backend);

        let err = ports
            .open(3, OutputSelection::Virtual, ignore_input)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PortUnavailable { direction: PortDirection::Input, index: 3, available: 1 }
        ));
        assert!(!ports.is_open());
    }

    #[test]
    fn test_open_out_of_range_output_leaves_ports_closed() {
        let backend = ScriptedBackend::new(vec!["Keys".into()], vec!["Synth".into()]);
        let mut ports = DevicePorts::new(backend);

        let err = ports
            .open(0, OutputSelection::Port(1), ignore_input)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PortUnavailable { direction: PortDirection::Output, .. }
        ));
        assert!(!ports.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = ScriptedBackend::new(vec!["Keys".into()], vec![]);
        let injector = backend.injector();
        let mut ports = DevicePorts::new(backend);

        ports
            .open(0, OutputSelection::Virtual, ignore_input)
            .unwrap();
        assert!(ports.is_open());
        assert!(injector.is_connected());

        ports.close();
        ports.close();
        assert!(!ports.is_open());
        assert!(!injector.is_connected());
    }
}
