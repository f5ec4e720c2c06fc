#![doc = include_str!("../README.md")]

//! Interactive solver sessions over the parley protocol.
//!
//! The [`Session`] type owns one solving run: constraint building, a
//! single transition into the interactive phase, and the strict
//! request/response dialogue with the engine until exit. The transport
//! and the response dialect are both injected, so the subprocess pipe
//! can be swapped for a remote stream, and the SMT-LIB grammar for a
//! different solver family, without touching the state machine.

pub mod error;
pub mod problem;
pub mod session;
pub mod stack;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SessionError, TransportError, UsageError};
pub use problem::CompiledProblem;
pub use session::{CaseSplitOrder, CaseSplitOutcome, Session, SessionMode};
pub use stack::StackTracker;
pub use transport::{EngineLauncher, PipeTransport, Transport};

// Wire vocabulary that appears in this crate's public signatures.
pub use parley_wire::{
    AssertionList, CheckSatResult, Proof, UnsatCore, Value, ValueAssignment,
};
