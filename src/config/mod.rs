// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for recording sessions.
//!
//! `SessionConfig` is captured once per recording and stays fixed for the
//! session. `RecorderSettings` is the persistent settings file the CLI reads
//! its defaults from.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Largest tempo the 24-bit SMF tempo field can hold
pub const MAX_TEMPO: u32 = 0x00FF_FFFF;

/// Largest ticks-per-beat value (top bit of the division word selects SMPTE)
pub const MAX_RESOLUTION: u16 = 0x7FFF;

/// Unit used for delta-times when encoding a live capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TickUnit {
    /// One tick per elapsed millisecond of wall-clock time
    #[default]
    Milliseconds,
    /// Musical ticks: elapsed beats at the session tempo times the resolution
    Beats,
}

impl TickUnit {
    /// Parse a CLI spelling (`ms` / `beats`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Some(TickUnit::Milliseconds),
            "beats" | "ticks" => Some(TickUnit::Beats),
            _ => None,
        }
    }
}

/// Per-session recording configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Directory the recording is written to
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
    /// File name of the recording
    #[serde(default = "default_filename")]
    pub filename: String,
    /// Tempo in BPM
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Ticks per beat written to the file header
    #[serde(default = "default_resolution")]
    pub resolution: u16,
    /// Delta-time unit for captured events
    #[serde(default)]
    pub tick_unit: TickUnit,
}

fn default_save_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Desktop"),
        None => PathBuf::from("."),
    }
}
fn default_filename() -> String {
    format!("recording_{}.mid", Local::now().format("%Y%m%d_%H%M%S"))
}
fn default_bpm() -> f64 {
    120.0
}
fn default_resolution() -> u16 {
    480
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            filename: default_filename(),
            bpm: default_bpm(),
            resolution: default_resolution(),
            tick_unit: TickUnit::default(),
        }
    }
}

impl SessionConfig {
    /// Create a config for the given location and tempo, other fields default
    pub fn new(save_path: impl Into<PathBuf>, filename: impl Into<String>, bpm: f64) -> Self {
        Self {
            save_path: save_path.into(),
            filename: filename.into(),
            bpm,
            ..Default::default()
        }
    }

    /// Set resolution (ticks per beat)
    pub fn with_resolution(mut self, resolution: u16) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the capture tick unit
    pub fn with_tick_unit(mut self, unit: TickUnit) -> Self {
        self.tick_unit = unit;
        self
    }

    /// Full path of the file this session writes
    pub fn target_path(&self) -> PathBuf {
        self.save_path.join(&self.filename)
    }

    /// Microseconds per beat for the session tempo
    pub fn tempo(&self) -> u32 {
        (60_000_000.0 / self.bpm) as u32
    }

    /// Check that the session can produce a valid file
    pub fn validate(&self) -> Result<(), Error> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(Error::Config(format!("bpm must be positive, got {}", self.bpm)));
        }
        let tempo = 60_000_000.0 / self.bpm;
        if tempo < 1.0 || tempo > MAX_TEMPO as f64 {
            return Err(Error::Config(format!(
                "bpm {} gives tempo outside the MIDI file range",
                self.bpm
            )));
        }
        if self.resolution == 0 || self.resolution > MAX_RESOLUTION {
            return Err(Error::Config(format!(
                "resolution must be 1..={}, got {}",
                MAX_RESOLUTION, self.resolution
            )));
        }
        if self.filename.trim().is_empty() {
            return Err(Error::Config("filename is empty".to_string()));
        }
        Ok(())
    }
}

/// Persistent recorder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecorderSettings {
    /// Default input port index
    #[serde(default)]
    pub input_port: usize,
    /// Default output port index (-1 = no output)
    #[serde(default = "default_output_port")]
    pub output_port: i32,
    /// Control queue polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_output_port() -> i32 {
    -1
}
fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            input_port: 0,
            output_port: default_output_port(),
            poll_interval_ms: default_poll_interval_ms(),
            session: SessionConfig::default(),
        }
    }
}

impl RecorderSettings {
    /// Load settings from a YAML file, or TOML when the extension is `.toml`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML settings")
    }

    /// Parse settings from a TOML string
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse TOML settings")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize settings to YAML")
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))
    }

    /// Control polling interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert!(config.filename.starts_with("recording_"));
        assert!(config.filename.ends_with(".mid"));
        // recording_YYYYMMDD_HHMMSS.mid
        assert_eq!(config.filename.len(), "recording_".len() + 15 + ".mid".len());
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.resolution, 480);
        assert_eq!(config.tick_unit, TickUnit::Milliseconds);
        assert_eq!(config.tempo(), 500_000);
    }

    #[test]
    fn test_target_path() {
        let config = SessionConfig::new("/tmp/takes", "take1.mid", 90.0);
        assert_eq!(config.target_path(), PathBuf::from("/tmp/takes/take1.mid"));
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::new(".", "a.mid", 120.0).validate().is_ok());
        assert!(SessionConfig::new(".", "a.mid", 0.0).validate().is_err());
        assert!(SessionConfig::new(".", "a.mid", f64::NAN).validate().is_err());
        assert!(SessionConfig::new(".", "a.mid", 1.0).validate().is_err()); // tempo overflow
        assert!(SessionConfig::new(".", "  ", 120.0).validate().is_err());
        assert!(SessionConfig::new(".", "a.mid", 120.0)
            .with_resolution(0)
            .validate()
            .is_err());
        assert!(SessionConfig::new(".", "a.mid", 120.0)
            .with_resolution(0x8000)
            .validate()
            .is_err());
    }

    #[test]
    fn test_tick_unit_parse() {
        assert_eq!(TickUnit::parse("ms"), Some(TickUnit::Milliseconds));
        assert_eq!(TickUnit::parse("Beats"), Some(TickUnit::Beats));
        assert_eq!(TickUnit::parse("frames"), None);
    }

    #[test]
    fn test_parse_yaml_settings() {
        let yaml = r#"
input_port: 2
output_port: 1
session:
  save_path: "/tmp/midi"
  filename: "jam.mid"
  bpm: 96
  tick_unit: beats
"#;

        let settings = RecorderSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.input_port, 2);
        assert_eq!(settings.output_port, 1);
        assert_eq!(settings.poll_interval_ms, 1);
        assert_eq!(settings.session.filename, "jam.mid");
        assert_eq!(settings.session.bpm, 96.0);
        assert_eq!(settings.session.resolution, 480);
        assert_eq!(settings.session.tick_unit, TickUnit::Beats);
    }

    #[test]
    fn test_parse_toml_settings() {
        let source = r#"
output_port = -1
poll_interval_ms = 5

[session]
filename = "take.mid"
resolution = 960
"#;

        let settings = RecorderSettings::from_toml(source).unwrap();
        assert_eq!(settings.output_port, -1);
        assert_eq!(settings.poll_interval(), Duration::from_millis(5));
        assert_eq!(settings.session.filename, "take.mid");
        assert_eq!(settings.session.resolution, 960);
        assert_eq!(settings.session.bpm, 120.0);
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut settings = RecorderSettings::default();
        settings.input_port = 3;
        settings.session.bpm = 140.0;
        settings.save(&path).unwrap();

        let loaded = RecorderSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }
}
