use std::cell::Cell;

use crate::{ErrorCode, ErrorType, HostError};

/// Something that tracks how deeply nested the current operation is and
/// refuses to go deeper than some limit.
pub trait DepthLimiter {
    type DepthError;

    /// Increments the current depth, failing if that exceeds the limit. The
    /// increment happens even when `enter` fails; the paired `leave` is what
    /// restores balance.
    fn enter(&self) -> Result<(), Self::DepthError>;

    /// Decrements the current depth. Must be paired with every `enter`,
    /// successful or not.
    fn leave(&self);
}

/// The depth of the smart-query stack of one externally issued query. Every
/// smart query frame, including the outermost, counts one level.
#[derive(Debug)]
pub struct QueryDepth {
    depth: Cell<u32>,
    limit: u32,
}

impl QueryDepth {
    pub fn new(limit: u32) -> Self {
        Self {
            depth: Cell::new(0),
            limit,
        }
    }

    pub fn current(&self) -> u32 {
        self.depth.get()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl DepthLimiter for QueryDepth {
    type DepthError = HostError;

    fn enter(&self) -> Result<(), HostError> {
        let next = self.depth.get().saturating_add(1);
        self.depth.set(next);
        if next > self.limit {
            return Err((ErrorType::Context, ErrorCode::ExceededLimit).into());
        }
        Ok(())
    }

    fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// `DepthGuard` is a RAII guard for a [DepthLimiter]: it enters on creation
/// and leaves when dropped, so the depth is restored on every exit path of
/// the guarded frame, including error returns.
pub struct DepthGuard<'a, D: DepthLimiter>(&'a D);

impl<'a, D: DepthLimiter> DepthGuard<'a, D> {
    /// Calls `enter` on `d`. If that fails the error is returned and the
    /// already-built guard is dropped, which undoes the increment.
    pub fn new(d: &'a D) -> Result<Self, D::DepthError> {
        let guard = Self(d);
        d.enter()?;
        Ok(guard)
    }
}

impl<'a, D: DepthLimiter> Drop for DepthGuard<'a, D> {
    fn drop(&mut self) {
        self.0.leave()
    }
}
