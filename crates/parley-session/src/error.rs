//! Error taxonomy for the session layer.
//!
//! Three families with different consequences: usage errors are caller
//! bugs, caught before any solver I/O; decode and transport failures are
//! fatal and force-close the session; an `Unknown` check result is an
//! ordinary answer and never appears here. Nothing in this layer retries.

use std::time::Duration;

use thiserror::Error;

use parley_wire::DecodeError;

/// A caller violated the protocol's usage rules. Never forwarded to the
/// solver, never fatal to an open session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("an interactive session has already been started; nested sessions are unsupported")]
    NestedSession,
    #[error("`{operation}` requires an interactive session; call `enter_interactive` first")]
    NotInteractive { operation: &'static str },
    #[error("`{operation}` was called on a closed session")]
    SessionClosed { operation: &'static str },
    #[error("pop {requested} exceeds the current assertion stack depth {depth}")]
    PopOutOfRange { requested: u32, depth: u32 },
    #[error("`{query}` requires a preceding check-sat result in the current solver state")]
    NoPriorCheck { query: &'static str },
    #[error("`{query}` requires the last check-sat result to be {expected}, but it was {actual}")]
    ResultMismatch {
        query: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("unsat-core extraction requires the `:produce-unsat-cores` option in the compiled problem")]
    CoreTrackingDisabled,
    #[error("proof extraction requires the `:produce-proofs` option in the compiled problem")]
    ProofProductionDisabled,
}

/// Failure at the engine connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to launch solver process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine exited or closed its stream outside an orderly `exit`.
    #[error("solver connection lost: {detail}")]
    Disconnected { detail: String },
    #[error("timed out waiting for a solver response")]
    Timeout,
}

/// Surface error type for every session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The engine could not be launched; the session is closed.
    #[error("failed to launch solver engine: {0}")]
    Launch(#[source] TransportError),
    /// The response stream no longer matches the expected grammar; the
    /// session has been force-closed and the raw response is attached.
    #[error("protocol desynchronized on `{command}`: {source}")]
    Decode {
        command: &'static str,
        #[source]
        source: DecodeError,
    },
    /// The engine died or closed its stream mid-session.
    #[error("solver lost: {0}")]
    SolverLost(String),
    /// A check-sat-family command exceeded its configured timeout; the
    /// engine was interrupted and the session closed.
    #[error("solver timed out after {0:?}; session closed")]
    Timeout(Duration),
}

impl SessionError {
    /// Whether this error is a caller bug rather than an environment or
    /// protocol failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, SessionError::Usage(_))
    }

    /// Whether this error force-closed the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Decode { .. } | SessionError::SolverLost(_) | SessionError::Timeout(_)
        )
    }
}
