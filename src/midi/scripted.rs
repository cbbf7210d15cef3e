// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-process MIDI backend.
//!
//! Exposes named fake ports. Inbound messages are pushed through a
//! `ScriptedInjector`, and everything forwarded to an output is kept for
//! inspection. Useful without hardware and in tests.

use std::sync::{Arc, Mutex};

use super::{InboundCallback, InputConnection, MidiBackend, OutputSink};
use crate::error::{Error, Result};

type SharedCallback = Arc<Mutex<Option<InboundCallback>>>;
type SentLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Backend with scripted ports
pub struct ScriptedBackend {
    inputs: Vec<String>,
    outputs: Vec<String>,
    callback: SharedCallback,
    sent: SentLog,
    open_failure: Option<String>,
}

impl ScriptedBackend {
    pub fn new(inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            inputs,
            outputs,
            callback: Arc::new(Mutex::new(None)),
            sent: Arc::new(Mutex::new(Vec::new())),
            open_failure: None,
        }
    }

    /// Make every port open fail with a connection error
    pub fn with_open_failure(mut self, reason: impl Into<String>) -> Self {
        self.open_failure = Some(reason.into());
        self
    }

    /// Handle for pushing inbound messages and reading forwarded ones
    pub fn injector(&self) -> ScriptedInjector {
        ScriptedInjector {
            callback: self.callback.clone(),
            sent: self.sent.clone(),
        }
    }

    fn check_open(&self) -> Result<()> {
        match &self.open_failure {
            Some(reason) => Err(Error::Connection(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Drives a `ScriptedBackend` from another thread
#[derive(Clone)]
pub struct ScriptedInjector {
    callback: SharedCallback,
    sent: SentLog,
}

impl ScriptedInjector {
    /// Deliver a message to the open input. Returns false if none is open.
    pub fn inject(&self, message: &[u8]) -> bool {
        let Ok(mut callback) = self.callback.lock() else {
            return false;
        };
        match callback.as_mut() {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }

    /// Whether an input port is currently open
    pub fn is_connected(&self) -> bool {
        self.callback.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Messages forwarded to the output so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

struct ScriptedOutput {
    sent: SentLog,
}

impl OutputSink for ScriptedOutput {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| Error::Connection("scripted output poisoned".to_string()))?
            .push(message.to_vec());
        Ok(())
    }
}

struct ScriptedInput {
    callback: SharedCallback,
}

impl InputConnection for ScriptedInput {
    fn close(self: Box<Self>) {
        if let Ok(mut callback) = self.callback.lock() {
            callback.take();
        }
    }
}

impl MidiBackend for ScriptedBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        Ok(self.inputs.clone())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        Ok(self.outputs.clone())
    }

    fn open_output(&mut self, _index: usize) -> Result<Box<dyn OutputSink>> {
        self.check_open()?;
        Ok(Box::new(ScriptedOutput {
            sent: self.sent.clone(),
        }))
    }

    fn open_input(&mut self, _index: usize, callback: InboundCallback) -> Result<Box<dyn InputConnection>> {
        self.check_open()?;
        let mut slot = self
            .callback
            .lock()
            .map_err(|_| Error::Connection("scripted input poisoned".to_string()))?;
        *slot = Some(callback);
        Ok(Box::new(ScriptedInput {
            callback: self.callback.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_without_open_input() {
        let backend = ScriptedBackend::new(vec!["In".into()], vec![]);
        let injector = backend.injector();
        assert!(!injector.is_connected());
        assert!(!injector.inject(&[0x90, 60, 100]));
    }

    #[test]
    fn test_inject_reaches_callback() {
        let mut backend = ScriptedBackend::new(vec!["In".into()], vec!["Out".into()]);
        let injector = backend.injector();
        let mut output = backend.open_output(0).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let connection = backend
            .open_input(
                0,
                Box::new(move |message: &[u8]| sink.lock().unwrap().push(message.to_vec())),
            )
            .unwrap();

        assert!(injector.inject(&[0x90, 60, 100]));
        output.send(&[0x80, 60, 0]).unwrap();

        assert_eq!(*received.lock().unwrap(), vec![vec![0x90, 60, 100]]);
        assert_eq!(injector.sent(), vec![vec![0x80, 60, 0]]);

        connection.close();
        assert!(!injector.is_connected());
    }

    #[test]
    fn test_open_failure() {
        let mut backend = ScriptedBackend::new(vec!["In".into()], vec![]).with_open_failure("busy");
        let result = backend.open_input(0, Box::new(|_: &[u8]| {}));
        assert!(matches!(result, Err(Error::Connection(reason)) if reason == "busy"));
    }
}
