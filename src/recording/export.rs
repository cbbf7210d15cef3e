// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file export.
//!
//! Both the live capture path and the text log path build a single-track
//! Type 0 file through `Smf::from_events`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{SessionConfig, TickUnit};
use crate::error::{Error, Result};
use crate::midi::message::{write_vlq, MAX_DELTA};
use crate::midi::{MetaEvent, MidiMessage, TimeSignature, TimedMessage};

use super::capture::CaptureBuffer;

/// Single-track Standard MIDI File
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smf {
    /// Ticks per beat
    resolution: u16,
    /// Track events; End-of-Track is appended when writing
    track: Vec<TimedMessage>,
}

impl Smf {
    /// Build a track: tempo, optional time signature, then `body`.
    ///
    /// Both meta-events sit at delta 0 ahead of every channel message.
    pub fn from_events(
        resolution: u16,
        tempo: u32,
        time_signature: Option<TimeSignature>,
        body: Vec<TimedMessage>,
    ) -> Self {
        let mut track = Vec::with_capacity(body.len() + 2);
        track.push(TimedMessage::meta(MetaEvent::Tempo(tempo), 0));
        if let Some(sig) = time_signature {
            track.push(TimedMessage::meta(MetaEvent::TimeSignature(sig), 0));
        }
        track.extend(body);

        Self {
            resolution: resolution.max(1),
            track,
        }
    }

    /// Get resolution (ticks per beat)
    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    /// Track events, meta-events included
    pub fn track(&self) -> &[TimedMessage] {
        &self.track
    }

    /// Channel and sysex messages only
    pub fn messages(&self) -> impl Iterator<Item = &TimedMessage> {
        self.track.iter().filter(|m| m.message().is_some())
    }

    /// Sum of all deltas in the track
    pub fn total_ticks(&self) -> u64 {
        self.track.iter().map(|m| m.delta as u64).sum()
    }

    /// Write MIDI data to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.write_header(writer)?;
        self.write_track(writer)
    }

    /// Export to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_header_into(&mut buffer);
        self.write_track_into(&mut buffer);
        buffer
    }

    /// Write to `path`, returning the absolute path written.
    ///
    /// A partially written file is removed before the error is returned.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Err(source) = fs::write(path, self.to_bytes()) {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
            return Err(Error::SaveFailed {
                path: path.to_path_buf(),
                source,
            });
        }

        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        debug!("Wrote MIDI file {:?} ({} events)", resolved, self.track.len());
        Ok(resolved)
    }

    /// Write MIDI file header chunk
    fn write_header<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut header = Vec::with_capacity(14);
        self.write_header_into(&mut header);
        writer.write_all(&header)
    }

    fn write_header_into(&self, buffer: &mut Vec<u8>) {
        // MThd
        buffer.extend_from_slice(b"MThd");
        // Chunk length (always 6)
        buffer.extend_from_slice(&[0, 0, 0, 6]);
        // Format 0
        buffer.extend_from_slice(&0u16.to_be_bytes());
        // One track
        buffer.extend_from_slice(&1u16.to_be_bytes());
        // Ticks per beat
        buffer.extend_from_slice(&self.resolution.to_be_bytes());
    }

    /// Write the track chunk
    fn write_track<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut chunk = Vec::new();
        self.write_track_into(&mut chunk);
        writer.write_all(&chunk)
    }

    fn write_track_into(&self, buffer: &mut Vec<u8>) {
        let mut track_data = Vec::new();

        for event in &self.track {
            write_vlq(&mut track_data, event.delta);
            track_data.extend_from_slice(&event.event.to_smf_bytes());
        }

        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&MetaEvent::EndOfTrack.to_smf_bytes());

        // MTrk
        buffer.extend_from_slice(b"MTrk");
        buffer.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&track_data);
    }
}

/// Result of encoding a capture buffer
#[derive(Debug)]
pub struct CaptureEncoding {
    pub smf: Smf,
    /// Events skipped because their bytes could not be decoded
    pub invalid: Vec<Error>,
    /// Note-offs dropped for arriving before the time cursor
    pub dropped_note_offs: usize,
    /// Deltas too long for a variable-length quantity, shortened to `MAX_DELTA`
    pub clamped_deltas: usize,
}

/// Signed difference `to - from` in the session's tick unit, rounded
fn signed_ticks(from: Instant, to: Instant, config: &SessionConfig) -> i64 {
    let (magnitude, sign) = match to.checked_duration_since(from) {
        Some(elapsed) => (elapsed, 1.0),
        None => (from.duration_since(to), -1.0),
    };
    let seconds = magnitude.as_secs_f64();
    let ticks = match config.tick_unit {
        TickUnit::Milliseconds => seconds * 1000.0,
        TickUnit::Beats => seconds * config.bpm / 60.0 * config.resolution as f64,
    };
    (sign * ticks).round() as i64
}

/// Encode a capture buffer into a file model.
///
/// Returns `None` for an empty buffer. Deltas are measured from the first
/// note-on (or first event), walking a cursor over the emitted events.
/// Negative deltas drop note-offs and clamp everything else to 0.
pub fn encode_capture(buffer: &CaptureBuffer, config: &SessionConfig) -> Option<CaptureEncoding> {
    let base_time = buffer.base_time()?;

    let mut prev_time = base_time;
    let mut body = Vec::with_capacity(buffer.len());
    let mut invalid = Vec::new();
    let mut dropped_note_offs = 0;
    let mut clamped_deltas = 0;

    for event in buffer {
        let message = match MidiMessage::from_bytes(&event.bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping captured event: {}", e);
                invalid.push(e);
                continue;
            }
        };

        let delta = signed_ticks(prev_time, event.timestamp, config);
        let delta = if delta < 0 {
            if message.is_note_off() {
                debug!("Dropping note-off {} ticks before cursor", -delta);
                dropped_note_offs += 1;
                continue;
            }
            0
        } else if delta > MAX_DELTA as i64 {
            warn!("Delta of {} ticks exceeds the file limit, clamped to {}", delta, MAX_DELTA);
            clamped_deltas += 1;
            MAX_DELTA
        } else {
            delta as u32
        };

        body.push(TimedMessage::midi(message, delta));
        prev_time = event.timestamp;
    }

    Some(CaptureEncoding {
        smf: Smf::from_events(config.resolution, config.tempo(), None, body),
        invalid,
        dropped_note_offs,
        clamped_deltas,
    })
}
