// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording and export system.
//!
//! This module provides:
//! - Live capture of inbound MIDI while armed
//! - The control/notification pipeline that owns a recording session
//! - Standard MIDI file export

pub mod capture;
pub mod export;
pub mod pipeline;

pub use capture::{ArmState, CaptureBuffer, CaptureContext, RawEvent};
pub use export::{encode_capture, CaptureEncoding, Smf};
pub use pipeline::{Command, Notification, PipelineState, RecorderHandle};
