use crate::{events::Events, Address, Error, ErrorCode, ErrorType, Host};

#[cfg(any(test, feature = "backtrace"))]
use backtrace::{Backtrace, BacktraceFrame};
use core::fmt::Debug;
use std::cell::{Ref, RefCell, RefMut};

#[derive(Clone)]
pub(crate) struct DebugInfo {
    msg: String,
    events: Events,
    #[cfg(any(test, feature = "backtrace"))]
    backtrace: Backtrace,
}

#[derive(Clone)]
pub struct HostError {
    pub error: Error,
    pub(crate) info: Option<Box<DebugInfo>>,
}

impl std::error::Error for HostError {}

// Events attached to a single error's debug output.
const DEBUG_EVENTS: usize = 25;

impl DebugInfo {
    fn write_events(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut wrote_heading = false;
        for (i, e) in self.events.0.iter().rev().enumerate() {
            if !wrote_heading {
                writeln!(f)?;
                writeln!(f, "Event log (newest first):")?;
                wrote_heading = true;
            }
            writeln!(f, "   {}: {}", i, e)?;
        }
        Ok(())
    }

    #[cfg(not(any(test, feature = "backtrace")))]
    fn write_backtrace(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }

    #[cfg(any(test, feature = "backtrace"))]
    fn write_backtrace(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Skip the error-construction plumbing at the top and everything
        // below the short-backtrace marker.
        fn frame_name_matches(frame: &BacktraceFrame, pat: &str) -> bool {
            frame.symbols().iter().any(|sym| match sym.name() {
                Some(sn) => format!("{:}", sn).contains(pat),
                None => false,
            })
        }

        fn frame_is_initial_error_plumbing(frame: &BacktraceFrame) -> bool {
            frame_name_matches(frame, "::from")
                || frame_name_matches(frame, "::into")
                || frame_name_matches(frame, "Host::err")
                || frame_name_matches(frame, "Host::error")
                || frame_name_matches(frame, "::map_err")
        }

        let mut bt = self.backtrace.clone();
        bt.resolve();
        let frames: Vec<BacktraceFrame> = bt
            .frames()
            .iter()
            .skip_while(|f| frame_is_initial_error_plumbing(f))
            .take_while(|f| !frame_name_matches(f, "__rust_begin_short_backtrace"))
            .cloned()
            .collect();
        let bt: Backtrace = frames.into();
        writeln!(f)?;
        writeln!(f, "Backtrace (newest first):")?;
        writeln!(f, "{:?}", bt)
    }
}

impl Debug for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "HostError: {:?}", self.error)?;
        if let Some(info) = &self.info {
            writeln!(f, "Message: {}", info.msg)?;
            info.write_events(f)?;
            info.write_backtrace(f)
        } else {
            writeln!(f, "DebugInfo not available")
        }
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <HostError as Debug>::fmt(self, f)
    }
}

impl HostError {
    #[cfg(any(test, feature = "testutils"))]
    pub fn result_matches_err<T, C>(res: Result<T, HostError>, code: C) -> bool
    where
        Error: From<C>,
    {
        match res {
            Ok(_) => {
                eprintln!("result is not an error");
                false
            }
            Err(he) => {
                let error: Error = code.into();
                if he.error != error {
                    eprintln!(
                        "expected error != actual error: {:?} != {:?}",
                        error, he.error
                    );
                }
                he.error == error
            }
        }
    }

    /// Identifies whether the error can be meaningfully recovered from.
    ///
    /// Running out of budget and exceeding the query depth ceiling end the
    /// whole call chain: no frame below the top-level entry point may turn
    /// them into data. Host-internal errors are treated the same way, since
    /// they only arise from a bug in the host or its setup.
    pub fn is_recoverable(&self) -> bool {
        if !self.error.is_type(ErrorType::Contract)
            && self.error.is_code(ErrorCode::InternalError)
        {
            return false;
        }
        if self.error.is_code(ErrorCode::ExceededLimit)
            && (self.error.is_type(ErrorType::Budget) || self.error.is_type(ErrorType::Context))
        {
            return false;
        }
        true
    }

    pub fn is_out_of_budget(&self) -> bool {
        self.error.is_type(ErrorType::Budget) && self.error.is_code(ErrorCode::ExceededLimit)
    }

    pub fn is_recursion_limit(&self) -> bool {
        self.error.is_type(ErrorType::Context) && self.error.is_code(ErrorCode::ExceededLimit)
    }

    /// The message this error was created with, if it was created through
    /// [Host::err] or [Host::error].
    pub fn message(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.msg.as_str())
    }

    /// A human-readable reason: the message when there is one, otherwise
    /// the error's type and code.
    pub fn reason(&self) -> String {
        match self.message() {
            Some(msg) => msg.to_string(),
            None => format!("{:?}", self.error),
        }
    }
}

impl<T> From<T> for HostError
where
    Error: From<T>,
{
    fn from(error: T) -> Self {
        let error = error.into();
        Self { error, info: None }
    }
}

impl From<HostError> for std::io::Error {
    fn from(e: HostError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

pub(crate) trait TryBorrowOrErr<T> {
    fn try_borrow_or_err(&self) -> Result<Ref<'_, T>, Error>;
    fn try_borrow_mut_or_err(&self) -> Result<RefMut<'_, T>, Error>;
    fn try_borrow_or_err_with(&self, host: &Host, msg: &str) -> Result<Ref<'_, T>, HostError> {
        self.try_borrow_or_err().map_err(|e| host.error(e, msg))
    }
    fn try_borrow_mut_or_err_with(
        &self,
        host: &Host,
        msg: &str,
    ) -> Result<RefMut<'_, T>, HostError> {
        self.try_borrow_mut_or_err().map_err(|e| host.error(e, msg))
    }
}

impl<T> TryBorrowOrErr<T> for RefCell<T> {
    fn try_borrow_or_err(&self) -> Result<Ref<'_, T>, Error> {
        self.try_borrow()
            .map_err(|_| Error::from_type_and_code(ErrorType::Context, ErrorCode::InternalError))
    }

    fn try_borrow_mut_or_err(&self) -> Result<RefMut<'_, T>, Error> {
        self.try_borrow_mut()
            .map_err(|_| Error::from_type_and_code(ErrorType::Context, ErrorCode::InternalError))
    }
}

impl Host {
    /// Convenience function to construct an [Error] and pass to [Host::error].
    pub fn err(&self, type_: ErrorType, code: ErrorCode, msg: &str) -> HostError {
        self.error(Error::from_type_and_code(type_, code), msg)
    }

    /// Constructs a [HostError] carrying `msg`. When diagnostics are enabled
    /// it also records a diagnostic event and attaches a snapshot of the
    /// event buffer (and, with the `backtrace` feature, a backtrace).
    pub fn error(&self, error: Error, msg: &str) -> HostError {
        self.error_in_contract(None, error, msg)
    }

    /// Like [Host::error], attributing the diagnostic event to `contract`.
    pub(crate) fn error_in_contract(
        &self,
        contract: Option<&Address>,
        error: Error,
        msg: &str,
    ) -> HostError {
        let mut events = Events::default();
        if self.is_diagnostics_enabled() {
            // A failed borrow means we are already reporting an error while
            // recording another one; fall back to a bare message.
            if let Ok(mut buf) = self.0.events.try_borrow_mut() {
                buf.record(contract.copied(), error, msg);
                events = buf.tail(DEBUG_EVENTS);
            }
        }
        HostError {
            error,
            info: Some(Box::new(DebugInfo {
                msg: msg.to_string(),
                events,
                #[cfg(any(test, feature = "backtrace"))]
                backtrace: Backtrace::new_unresolved(),
            })),
        }
    }

    /// Like [Host::error], keeping the original message of `he` when it has
    /// one and `msg` otherwise.
    pub(crate) fn augment_err(
        &self,
        contract: Option<&Address>,
        he: HostError,
        msg: &str,
    ) -> HostError {
        match he.info {
            Some(_) => he,
            None => self.error_in_contract(contract, he.error, msg),
        }
    }
}
