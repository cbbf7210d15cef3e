// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Text MIDI log conversion.
//!
//! Two passes over the same content: a permissive metadata scan (ticks per
//! beat, tempo, time signature; last value wins, malformed values are
//! ignored) and a strict event pass that aborts on the first bad line.

mod parser;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, LineError, Result};
use crate::midi::message::MAX_DELTA;
use crate::midi::{TimeSignature, TimedMessage};
use crate::recording::Smf;

use parser::{EventKind, Params};

/// Defaults used when a log carries no header
pub const DEFAULT_TICKS_PER_BEAT: u16 = 120;
pub const DEFAULT_TEMPO: u32 = 500_000;

/// File-level settings found in a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMetadata {
    pub ticks_per_beat: u16,
    /// Microseconds per beat
    pub tempo: u32,
    pub time_signature: TimeSignature,
}

impl Default for LogMetadata {
    fn default() -> Self {
        Self {
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            tempo: DEFAULT_TEMPO,
            time_signature: TimeSignature::default(),
        }
    }
}

/// A log reduced to metadata and delta-timed channel messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLog {
    pub metadata: LogMetadata,
    pub messages: Vec<TimedMessage>,
}

/// Collect metadata. Never fails.
pub fn scan_metadata(content: &str) -> LogMetadata {
    let mut metadata = LogMetadata::default();

    for parts in content.lines().filter_map(parser::tokens) {
        if parts[0].eq_ignore_ascii_case("MFile") {
            if let Some(tpb) = parser::header_resolution(&parts) {
                metadata.ticks_per_beat = tpb;
            }
        } else if parts[1].eq_ignore_ascii_case("TimeSig") {
            if let Some(sig) = parser::time_signature(&parts) {
                metadata.time_signature = sig;
            }
        } else if parts[1].eq_ignore_ascii_case("Tempo") {
            if let Some(tempo) = parser::tempo(&parts) {
                metadata.tempo = tempo;
            }
        }
    }

    metadata
}

/// Parse a whole log. Errors carry the 1-based line number.
pub fn parse_log(content: &str) -> Result<ParsedLog> {
    let metadata = scan_metadata(content);
    let mut messages = Vec::new();
    let mut prev_tick: u64 = 0;

    for (index, line) in content.lines().enumerate() {
        let Some(parts) = parser::tokens(line) else {
            continue;
        };
        if parser::is_marker(parts[0]) {
            continue;
        }

        let fail = |source: LineError| Error::LogParse {
            line: index + 1,
            source,
        };

        let Some(kind) = EventKind::parse(parts[1]) else {
            // Unknown types still move the cursor when their tick is readable
            if let Ok(tick) = parser::parse_tick(parts[0]) {
                prev_tick = prev_tick.max(tick);
            }
            continue;
        };

        let tick = parser::parse_tick(parts[0]).map_err(fail)?;
        if !kind.is_channel_event() {
            prev_tick = prev_tick.max(tick);
            continue;
        }
        if tick < prev_tick {
            return Err(fail(LineError::TickBackwards {
                tick,
                previous: prev_tick,
            }));
        }

        let delta = tick - prev_tick;
        prev_tick = tick;

        let params = Params::parse(&parts[2..]).map_err(fail)?;
        match parser::build_message(kind, &params).map_err(fail)? {
            Some(message) => {
                if delta > MAX_DELTA as u64 {
                    return Err(fail(LineError::OutOfRange {
                        field: "delta",
                        value: i64::try_from(delta).unwrap_or(i64::MAX),
                        min: 0,
                        max: MAX_DELTA as i64,
                    }));
                }
                messages.push(TimedMessage::midi(message, delta as u32));
            }
            None => debug!("Line {}: {:?} without a message, skipped", index + 1, kind),
        }
    }

    Ok(ParsedLog { metadata, messages })
}

/// Convert log content into a file model
pub fn convert_log(content: &str) -> Result<Smf> {
    let parsed = parse_log(content)?;
    Ok(Smf::from_events(
        parsed.metadata.ticks_per_beat,
        parsed.metadata.tempo,
        Some(parsed.metadata.time_signature),
        parsed.messages,
    ))
}

/// Convert a log file and write the result, returning the absolute output path
pub fn convert_log_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<PathBuf> {
    let input = input.as_ref();
    let content = fs::read_to_string(input)?;
    if content.trim().is_empty() {
        return Err(Error::EmptyLog(input.to_path_buf()));
    }

    let smf = convert_log(&content)?;
    let path = smf.save(output)?;
    info!(
        "Converted {:?} to {:?} ({} events)",
        input,
        path,
        smf.messages().count()
    );
    Ok(path)
}
