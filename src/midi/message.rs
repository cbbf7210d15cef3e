// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI message model shared by the capture encoder and the log parser.
//!
//! Raw bytes from a device are decoded into `MidiMessage`; anything that
//! cannot live inside a Standard MIDI File track is rejected with
//! `Error::InvalidMessage`.

use crate::error::{Error, Result};

use super::messages;

/// Channel message or system exclusive payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Poly Aftertouch: channel (0-15), note (0-127), pressure (0-127)
    PolyAftertouch { channel: u8, note: u8, pressure: u8 },
    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },
    /// Channel Aftertouch: channel (0-15), pressure (0-127)
    ChannelAftertouch { channel: u8, pressure: u8 },
    /// Pitch Bend: channel (0-15), value (-8192 to 8191)
    PitchBend { channel: u8, value: i16 },
    /// System exclusive body, without the leading 0xF0
    SysEx(Vec<u8>),
}

impl MidiMessage {
    /// Decode one complete message as delivered by a MIDI input port
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(&status) = data.first() else {
            return Err(Error::invalid_message(data, "empty message"));
        };

        if status < 0x80 {
            return Err(Error::invalid_message(data, "missing status byte"));
        }

        if status == messages::SYSEX_START {
            return Ok(MidiMessage::SysEx(data[1..].to_vec()));
        }

        if status >= 0xF0 {
            return Err(Error::invalid_message(
                data,
                "system message cannot be stored in a MIDI file track",
            ));
        }

        let channel = status & 0x0F;
        let kind = status & 0xF0;
        let expected = match kind {
            messages::PROGRAM_CHANGE | messages::CHANNEL_AFTERTOUCH => 2,
            _ => 3,
        };

        if data.len() != expected {
            return Err(Error::invalid_message(
                data,
                format!("expected {} bytes, got {}", expected, data.len()),
            ));
        }
        if data[1..].iter().any(|b| b & 0x80 != 0) {
            return Err(Error::invalid_message(data, "data byte has high bit set"));
        }

        let message = match kind {
            messages::NOTE_OFF => MidiMessage::NoteOff {
                channel,
                note: data[1],
                velocity: data[2],
            },
            messages::NOTE_ON => MidiMessage::NoteOn {
                channel,
                note: data[1],
                velocity: data[2],
            },
            messages::POLY_AFTERTOUCH => MidiMessage::PolyAftertouch {
                channel,
                note: data[1],
                pressure: data[2],
            },
            messages::CONTROL_CHANGE => MidiMessage::ControlChange {
                channel,
                controller: data[1],
                value: data[2],
            },
            messages::PROGRAM_CHANGE => MidiMessage::ProgramChange {
                channel,
                program: data[1],
            },
            messages::CHANNEL_AFTERTOUCH => MidiMessage::ChannelAftertouch {
                channel,
                pressure: data[1],
            },
            // PITCH_BEND is the only status nibble left
            _ => {
                let lsb = data[1] as i16;
                let msb = data[2] as i16;
                MidiMessage::PitchBend {
                    channel,
                    value: ((msb << 7) | lsb) - 8192,
                }
            }
        };

        Ok(message)
    }

    /// Bytes of this message as they appear in a track chunk (after the delta)
    pub fn to_smf_bytes(&self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![messages::NOTE_OFF | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![messages::NOTE_ON | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyAftertouch { channel, note, pressure } => vec![
                messages::POLY_AFTERTOUCH | (channel & 0x0F),
                note & 0x7F,
                pressure & 0x7F,
            ],
            MidiMessage::ControlChange { channel, controller, value } => vec![
                messages::CONTROL_CHANGE | (channel & 0x0F),
                controller & 0x7F,
                value & 0x7F,
            ],
            MidiMessage::ProgramChange { channel, program } => {
                vec![messages::PROGRAM_CHANGE | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelAftertouch { channel, pressure } => {
                vec![messages::CHANNEL_AFTERTOUCH | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let unsigned = (*value as i32 + 8192).clamp(0, 16383) as u16;
                vec![
                    messages::PITCH_BEND | (channel & 0x0F),
                    (unsigned & 0x7F) as u8,
                    ((unsigned >> 7) & 0x7F) as u8,
                ]
            }
            MidiMessage::SysEx(body) => {
                // F0 <length> <body>; body keeps its terminating F7
                let mut bytes = vec![messages::SYSEX_START];
                write_vlq(&mut bytes, body.len() as u32);
                bytes.extend_from_slice(body);
                bytes
            }
        }
    }

    /// Any note-on, velocity 0 included
    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { .. })
    }

    /// Note-off status only
    pub fn is_note_off(&self) -> bool {
        matches!(self, MidiMessage::NoteOff { .. })
    }
}

/// Time signature as stored in the 0x58 meta-event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Denominator as a note value (must be a power of two)
    pub denominator: u8,
    /// MIDI clocks per metronome click
    pub clocks_per_click: u8,
    /// Notated 32nd notes per MIDI quarter note
    pub notated_32nd_per_beat: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8, clocks_per_click: u8, notated_32nd_per_beat: u8) -> Self {
        Self {
            numerator,
            denominator,
            clocks_per_click,
            notated_32nd_per_beat,
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4, 24, 8)
    }
}

/// Meta-events written by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaEvent {
    /// Microseconds per beat
    Tempo(u32),
    TimeSignature(TimeSignature),
    EndOfTrack,
}

impl MetaEvent {
    pub fn to_smf_bytes(&self) -> Vec<u8> {
        match self {
            MetaEvent::Tempo(micros) => vec![
                0xFF,
                0x51,
                0x03,
                ((micros >> 16) & 0xFF) as u8,
                ((micros >> 8) & 0xFF) as u8,
                (micros & 0xFF) as u8,
            ],
            MetaEvent::TimeSignature(sig) => vec![
                0xFF,
                0x58,
                0x04,
                sig.numerator,
                sig.denominator.max(1).trailing_zeros() as u8,
                sig.clocks_per_click,
                sig.notated_32nd_per_beat,
            ],
            MetaEvent::EndOfTrack => vec![0xFF, 0x2F, 0x00],
        }
    }
}

/// Anything that can occupy a slot in the track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    Midi(MidiMessage),
    Meta(MetaEvent),
}

impl TrackEvent {
    pub fn to_smf_bytes(&self) -> Vec<u8> {
        match self {
            TrackEvent::Midi(msg) => msg.to_smf_bytes(),
            TrackEvent::Meta(meta) => meta.to_smf_bytes(),
        }
    }
}

/// A track event with its delta-time in ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub event: TrackEvent,
    pub delta: u32,
}

impl TimedMessage {
    pub fn midi(message: MidiMessage, delta: u32) -> Self {
        Self {
            event: TrackEvent::Midi(message),
            delta,
        }
    }

    pub fn meta(meta: MetaEvent, delta: u32) -> Self {
        Self {
            event: TrackEvent::Meta(meta),
            delta,
        }
    }

    /// The channel/sysex message, if this is not a meta-event
    pub fn message(&self) -> Option<&MidiMessage> {
        match &self.event {
            TrackEvent::Midi(msg) => Some(msg),
            TrackEvent::Meta(_) => None,
        }
    }
}

/// Largest delta a variable-length quantity can carry
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Write a variable-length quantity (values above `MAX_DELTA` are clamped)
pub fn write_vlq(buffer: &mut Vec<u8>, value: u32) {
    let mut value = value.min(MAX_DELTA);
    let mut bytes = [0u8; 4];
    let mut len = 0;

    bytes[0] = (value & 0x7F) as u8;
    len += 1;
    value >>= 7;

    while value > 0 {
        bytes[len] = (value & 0x7F) as u8 | 0x80;
        len += 1;
        value >>= 7;
    }

    buffer.extend(bytes[..len].iter().rev());
}
