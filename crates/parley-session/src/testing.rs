//! Scripted transport for unit tests: canned responses, no process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_wire::ResponseShape;

use crate::error::TransportError;
use crate::transport::{EngineLauncher, Transport};

/// Everything the session wrote, in order. Shared with the test body so
/// no-I/O assertions can be made after the session consumed the launcher.
pub(crate) type SentLog = Arc<Mutex<Vec<String>>>;

/// One scripted `recv` outcome.
pub(crate) enum Step {
    Reply(String),
    Timeout,
    Hangup,
}

pub(crate) struct ScriptedTransport {
    script: VecDeque<Step>,
    sent: SentLog,
}

impl Transport for ScriptedTransport {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn recv(
        &mut self,
        _shape: ResponseShape,
        _deadline: Option<Duration>,
    ) -> Result<String, TransportError> {
        match self.script.pop_front() {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Timeout) => Err(TransportError::Timeout),
            Some(Step::Hangup) => Err(TransportError::Disconnected {
                detail: "scripted hangup".to_string(),
            }),
            None => Err(TransportError::Disconnected {
                detail: "script exhausted: no response staged for this command".to_string(),
            }),
        }
    }

    fn interrupt(&mut self) {}

    fn shutdown(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub(crate) struct ScriptedLauncher {
    transport: Option<ScriptedTransport>,
    sent: SentLog,
}

impl ScriptedLauncher {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        let sent: SentLog = Arc::default();
        Self {
            transport: Some(ScriptedTransport {
                script: steps.into(),
                sent: Arc::clone(&sent),
            }),
            sent,
        }
    }

    pub(crate) fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }
}

impl EngineLauncher for ScriptedLauncher {
    fn launch(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        match self.transport.take() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::Disconnected {
                detail: "scripted launcher already consumed".to_string(),
            }),
        }
    }
}
