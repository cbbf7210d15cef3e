// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Line-level parsing of text MIDI logs.
//!
//! Each line is split on whitespace. Event lines read
//! `<tick> <type> [key=value | value]...`, header lines start with `MFile`,
//! `MTrk` or `TrkEnd`.

use std::collections::HashMap;

use crate::config::{MAX_RESOLUTION, MAX_TEMPO};
use crate::error::LineError;
use crate::midi::{MidiMessage, TimeSignature};

/// Tokens of a line worth looking at, or `None` for blank/comment/short lines
pub(crate) fn tokens(line: &str) -> Option<Vec<&str>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    Some(parts)
}

/// Header and footer markers carry no events
pub(crate) fn is_marker(first: &str) -> bool {
    ["MFile", "MTrk", "TrkEnd"]
        .iter()
        .any(|marker| first.eq_ignore_ascii_case(marker))
}

/// Event types understood by the event pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    TimeSig,
    Tempo,
    NoteOn,
    NoteOff,
    Control,
    Program,
    PitchBend,
}

impl EventKind {
    pub(crate) fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "timesig" => Some(EventKind::TimeSig),
            "tempo" => Some(EventKind::Tempo),
            "on" | "note_on" => Some(EventKind::NoteOn),
            "off" | "note_off" => Some(EventKind::NoteOff),
            "par" => Some(EventKind::Control),
            "prch" => Some(EventKind::Program),
            "pb" => Some(EventKind::PitchBend),
            _ => None,
        }
    }

    /// Whether this kind produces a channel message
    pub(crate) fn is_channel_event(&self) -> bool {
        !matches!(self, EventKind::TimeSig | EventKind::Tempo)
    }

    fn name(&self) -> &'static str {
        match self {
            EventKind::TimeSig => "TimeSig",
            EventKind::Tempo => "Tempo",
            EventKind::NoteOn => "On",
            EventKind::NoteOff => "Off",
            EventKind::Control => "Par",
            EventKind::Program => "PrCh",
            EventKind::PitchBend => "Pb",
        }
    }
}

pub(crate) fn parse_tick(token: &str) -> Result<u64, LineError> {
    token
        .parse::<u64>()
        .map_err(|_| LineError::InvalidTick(token.to_string()))
}

/// `key=value` parameters of an event line. A bare number is stored as `value`.
#[derive(Debug, Default)]
pub(crate) struct Params {
    values: HashMap<String, i64>,
}

impl Params {
    pub(crate) fn parse(tokens: &[&str]) -> Result<Self, LineError> {
        let mut values = HashMap::new();
        for token in tokens {
            if let Some((key, value)) = token.split_once('=') {
                let parsed = value.parse::<i64>().map_err(|_| LineError::InvalidParameter {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                values.insert(key.to_ascii_lowercase(), parsed);
            } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(parsed) = token.parse::<i64>() {
                    values.insert("value".to_string(), parsed);
                }
            }
        }
        Ok(Self { values })
    }

    fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn require(&self, kind: EventKind, key: &'static str) -> Result<i64, LineError> {
        self.get(key).ok_or(LineError::MissingParameter {
            event: kind.name(),
            key,
        })
    }

    /// 1-based `ch` (default 1) converted to a 0-based channel
    fn channel(&self) -> Result<u8, LineError> {
        let ch = self.get("ch").unwrap_or(1);
        Ok((in_range("ch", ch, 1, 16)? - 1) as u8)
    }
}

fn in_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, LineError> {
    if value < min || value > max {
        return Err(LineError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn data_byte(field: &'static str, value: i64) -> Result<u8, LineError> {
    Ok(in_range(field, value, 0, 127)? as u8)
}

/// Build the channel message for an event line.
///
/// `Ok(None)` when the line lacks the parameter that selects a message
/// (`c` for Par, `p` for PrCh, `n` for notes, a value for Pb).
pub(crate) fn build_message(kind: EventKind, params: &Params) -> Result<Option<MidiMessage>, LineError> {
    let message = match kind {
        EventKind::TimeSig | EventKind::Tempo => return Ok(None),
        EventKind::Control => {
            let Some(controller) = params.get("c") else {
                return Ok(None);
            };
            MidiMessage::ControlChange {
                channel: params.channel()?,
                controller: data_byte("c", controller)?,
                value: data_byte("v", params.require(kind, "v")?)?,
            }
        }
        EventKind::Program => {
            let Some(program) = params.get("p") else {
                return Ok(None);
            };
            MidiMessage::ProgramChange {
                channel: params.channel()?,
                program: data_byte("p", program)?,
            }
        }
        EventKind::PitchBend => {
            let Some(raw) = params.get("v").or_else(|| params.get("value")) else {
                return Ok(None);
            };
            MidiMessage::PitchBend {
                channel: params.channel()?,
                value: (raw.clamp(0, 16383) - 8192) as i16,
            }
        }
        EventKind::NoteOn | EventKind::NoteOff => {
            let Some(note) = params.get("n") else {
                return Ok(None);
            };
            let channel = params.channel()?;
            let note = data_byte("n", note)?;
            let velocity = data_byte("v", params.get("v").unwrap_or(64))?;
            if kind == EventKind::NoteOn {
                MidiMessage::NoteOn { channel, note, velocity }
            } else {
                MidiMessage::NoteOff { channel, note, velocity }
            }
        }
    };
    Ok(Some(message))
}

/// `MFile <format> <tracks> <ticksPerBeat>`
pub(crate) fn header_resolution(parts: &[&str]) -> Option<u16> {
    let tpb = parts.get(3)?.parse::<u16>().ok()?;
    (1..=MAX_RESOLUTION).contains(&tpb).then_some(tpb)
}

/// `<tick> TimeSig <num>/<den> <clocks> <notated32nd>`
pub(crate) fn time_signature(parts: &[&str]) -> Option<TimeSignature> {
    if parts.len() < 5 {
        return None;
    }
    let (num, den) = parts[2].split_once('/')?;
    let numerator = num.parse::<u8>().ok()?;
    let denominator = den.parse::<u8>().ok()?;
    if numerator == 0 || !denominator.is_power_of_two() {
        return None;
    }
    let clocks = parts[3].parse::<u8>().ok()?;
    let notated = parts[4].parse::<u8>().ok()?;
    Some(TimeSignature::new(numerator, denominator, clocks, notated))
}

/// `<tick> Tempo <microsecondsPerBeat>`
pub(crate) fn tempo(parts: &[&str]) -> Option<u32> {
    let tempo = parts.get(2)?.parse::<u32>().ok()?;
    (1..=MAX_TEMPO).contains(&tempo).then_some(tempo)
}
