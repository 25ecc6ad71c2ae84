//! Scripted in-memory monitor for tests.

use super::mon::{MonRequest, MonTransport};
use crate::error::{CephError, CephResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Replies keyed by `MonRequest::label()`. Unscripted commands fail as transport errors.
#[derive(Default)]
pub struct FakeMon {
    replies:      HashMap<String, Result<String, String>>,
    refuse_connect: bool,
    pub shut_down: Arc<AtomicBool>,
}

impl FakeMon {
    pub fn new() -> Self { Self::default() }

    pub fn reply(mut self, label: &str, json: &str) -> Self {
        self.replies.insert(label.to_string(), Ok(json.to_string()));
        self
    }

    pub fn fail(mut self, label: &str, msg: &str) -> Self {
        self.replies.insert(label.to_string(), Err(msg.to_string()));
        self
    }

    pub fn refuse_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shut_down)
    }
}

impl MonTransport for FakeMon {
    fn connect(&mut self) -> CephResult<()> {
        if self.refuse_connect {
            return Err(CephError::Transport("connection refused".into()));
        }
        Ok(())
    }

    fn mon_command(&self, req: &MonRequest) -> CephResult<Vec<u8>> {
        match self.replies.get(&req.label()) {
            Some(Ok(json)) => Ok(json.clone().into_bytes()),
            Some(Err(msg)) => Err(CephError::Transport(msg.clone())),
            None => Err(CephError::Transport(format!("no reply for `{}`", req.label()))),
        }
    }

    fn shutdown(&mut self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
