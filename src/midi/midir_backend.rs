// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! midir backend for hardware and OS-level MIDI ports.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::{InboundCallback, InputConnection, MidiBackend, OutputSink};
use crate::error::{Error, PortDirection, Result};

const CLIENT_NAME: &str = "midicap";

/// Cross-platform MIDI access through midir.
#[derive(Debug, Default)]
pub struct MidirBackend;

impl MidirBackend {
    pub fn new() -> Self {
        Self
    }
}

struct MidirOutput {
    connection: MidiOutputConnection,
}

impl OutputSink for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.connection
            .send(message)
            .map_err(|e| Error::Connection(format!("Failed to send MIDI message: {}", e)))
    }
}

struct MidirInput {
    connection: MidiInputConnection<InboundCallback>,
}

impl InputConnection for MidirInput {
    fn close(self: Box<Self>) {
        // Returns the client and the callback; both are released here
        let _ = self.connection.close();
    }
}

impl MidiBackend for MidirBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        let midi_input = MidiInput::new(CLIENT_NAME)?;
        Ok(midi_input
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| {
                midi_input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", i))
            })
            .collect())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        let midi_output = MidiOutput::new(CLIENT_NAME)?;
        Ok(midi_output
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| {
                midi_output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", i))
            })
            .collect())
    }

    fn open_output(&mut self, index: usize) -> Result<Box<dyn OutputSink>> {
        let midi_output = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_output.ports();
        let port = ports.get(index).ok_or(Error::PortUnavailable {
            direction: PortDirection::Output,
            index: index as i64,
            available: ports.len(),
        })?;

        let connection = midi_output.connect(port, "midicap-output")?;
        debug!("Connected MIDI output {}", index);
        Ok(Box::new(MidirOutput { connection }))
    }

    fn open_input(&mut self, index: usize, callback: InboundCallback) -> Result<Box<dyn InputConnection>> {
        let mut midi_input = MidiInput::new(CLIENT_NAME)?;
        // Clock and active sensing cannot be stored in a file track
        midi_input.ignore(Ignore::TimeAndActiveSense);

        let ports = midi_input.ports();
        let port = ports.get(index).ok_or(Error::PortUnavailable {
            direction: PortDirection::Input,
            index: index as i64,
            available: ports.len(),
        })?;

        let connection = midi_input.connect(
            port,
            "midicap-input",
            |_stamp, message, callback: &mut InboundCallback| callback(message),
            callback,
        )?;
        debug!("Connected MIDI input {}", index);
        Ok(Box::new(MidirInput { connection }))
    }
}
