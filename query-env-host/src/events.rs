//! Diagnostic events: a record of every error the host reported while
//! diagnostics were enabled. They never influence query results or cost.

use crate::{Address, Error};

/// The most events a host keeps; older ones are dropped first.
pub const MAX_EVENTS: usize = 256;

/// One error reported by the host, optionally attributed to the contract
/// whose frame was running.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticEvent {
    pub contract: Option<Address>,
    pub error: Error,
    pub msg: String,
}

impl core::fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.contract {
            Some(addr) => write!(f, "[Diagnostic Event] contract:{}, ", addr)?,
            None => write!(f, "[Diagnostic Event] ")?,
        }
        write!(f, "error:{:?}, msg:\"{}\"", self.error, self.msg)
    }
}

/// The buffer of [DiagnosticEvent]s held by a host, oldest first. Holds at
/// most [MAX_EVENTS].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Events(pub Vec<DiagnosticEvent>);

impl Events {
    pub(crate) fn record(&mut self, contract: Option<Address>, error: Error, msg: &str) {
        if self.0.len() >= MAX_EVENTS {
            let excess = self.0.len() + 1 - MAX_EVENTS;
            self.0.drain(..excess);
        }
        self.0.push(DiagnosticEvent {
            contract,
            error,
            msg: msg.to_string(),
        })
    }

    /// The newest `n` events.
    pub(crate) fn tail(&self, n: usize) -> Events {
        let start = self.0.len().saturating_sub(n);
        Events(self.0[start..].to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dump_to_debug_log(&self) {
        use log::debug;
        debug!("=======Start of events=======");
        for e in self.0.iter() {
            debug!("{}", e);
        }
        debug!("========End of events========")
    }
}
