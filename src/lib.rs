// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI capture and conversion.
//!
//! Records live MIDI from an input port into a Standard MIDI File while
//! optionally passing it through to an output port, and converts text MIDI
//! logs into Standard MIDI Files.

pub mod config;
pub mod error;
pub mod midi;
pub mod recording;
pub mod textlog;

pub use config::{RecorderSettings, SessionConfig, TickUnit};
pub use error::{Error, LineError, Result};
pub use midi::{list_devices, MidiBackend, MidirBackend, OutputSelection, ScriptedBackend};
pub use recording::{Command, Notification, RecorderHandle, Smf};
pub use textlog::{convert_log, convert_log_file, parse_log, LogMetadata};
