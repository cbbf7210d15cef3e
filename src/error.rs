// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for capture, encoding and log conversion.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which side of the device a port index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI {direction} port {index} unavailable ({available} present)")]
    PortUnavailable {
        direction: PortDirection,
        index: i64,
        available: usize,
    },

    #[error("MIDI connection error: {0}")]
    Connection(String),

    #[error("invalid MIDI message {bytes:02X?}: {reason}")]
    InvalidMessage { bytes: Vec<u8>, reason: String },

    #[error("failed to save {}: {source}", path.display())]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {source}")]
    LogParse {
        line: usize,
        #[source]
        source: LineError,
    },

    #[error("log file is empty: {}", .0.display())]
    EmptyLog(PathBuf),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("capture pipeline is no longer running")]
    PipelineClosed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_message(bytes: &[u8], reason: impl Into<String>) -> Self {
        Error::InvalidMessage {
            bytes: bytes.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Why a single text-log line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("invalid tick {0:?}")]
    InvalidTick(String),

    #[error("tick {tick} is earlier than previous tick {previous}")]
    TickBackwards { tick: u64, previous: u64 },

    #[error("parameter {key} has non-integer value {value:?}")]
    InvalidParameter { key: String, value: String },

    #[error("{event} event requires parameter {key}")]
    MissingParameter { event: &'static str, key: &'static str },

    #[error("{field} value {value} out of range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Connection(e.to_string())
    }
}
