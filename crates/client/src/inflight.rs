//! Duplicate-submission guard.
//!
//! While an operation is outstanding a second submission of the same
//! operation is rejected with [`ClientError::Busy`]. This is the client-side
//! equivalent of disabling a button until its request completes.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::ClientError;

/// Operations that can be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Restore,
    Login,
    Logout,
    Refresh,
    UpdateProfile,
    SendVerification,
    VerifyEmail,
    SignUp,
    Checkout,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Restore => "session restore",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Refresh => "token refresh",
            Self::UpdateProfile => "profile update",
            Self::SendVerification => "verification email",
            Self::VerifyEmail => "email verification",
            Self::SignUp => "signup",
            Self::Checkout => "checkout",
        };
        f.write_str(name)
    }
}

/// Set of operations currently outstanding.
#[derive(Debug, Default)]
pub struct InFlight {
    active: Mutex<HashSet<Operation>>,
}

impl InFlight {
    /// Mark `op` as outstanding until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Busy` if `op` is already outstanding.
    pub fn begin(&self, op: Operation) -> Result<InFlightGuard<'_>, ClientError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(op) {
            tracing::debug!(operation = %op, "Rejected duplicate submission");
            return Err(ClientError::Busy(op));
        }
        Ok(InFlightGuard { owner: self, op })
    }

    /// Whether `op` is outstanding. Drives "loading" indicators.
    #[must_use]
    pub fn is_active(&self, op: Operation) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&op)
    }

    /// Whether anything is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Clears its operation from the owning [`InFlight`] on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    op: Operation,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.op);
    }
}
