#![doc = include_str!("../README.md")]

//! Command encoding, response framing, and response decoding for the
//! parley solver protocol. This crate performs no I/O; the process
//! plumbing and the session state machine live in `parley-session`.

pub mod command;
pub mod dialect;
pub mod frame;
pub mod response;
pub mod sexp;

pub use command::{Command, ResponseShape, Wire};
pub use dialect::{DecodeError, Dialect, Smtlib2};
pub use frame::FrameBuffer;
pub use response::{
    AssertionList, CheckSatResult, Proof, Response, UnsatCore, Value, ValueAssignment,
};
