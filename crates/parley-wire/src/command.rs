//! Protocol operations and their encoded wire form.

use std::fmt;

/// How the solver answers a command under the quiet (no `:print-success`)
/// profile this layer speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Write-only: no response is read back.
    None,
    /// A single-line answer such as `sat` or `unsat`.
    Atom,
    /// One balanced parenthesized form, possibly spanning several lines.
    Sexpr,
}

/// One protocol operation, independent of any solver family's grammar.
///
/// Each variant is turned into outbound text by a [`Dialect`] and paired
/// with the response shape the decoder should expect back.
///
/// [`Dialect`]: crate::dialect::Dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetLogic(String),
    SetOption(String, String),
    GetOption(String),
    GetInfo(String),
    CheckSat,
    CheckSatAssuming(Vec<String>),
    GetValue(Vec<String>),
    GetModel,
    GetUnsatCore,
    GetUnsatAssumptions,
    GetProof,
    GetAssertions,
    Push(u32),
    Pop(u32),
    ResetAssertions,
    Echo(String),
    Exit,
}

impl Command {
    /// The operation's verb, used as context in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetLogic(_) => "set-logic",
            Command::SetOption(_, _) => "set-option",
            Command::GetOption(_) => "get-option",
            Command::GetInfo(_) => "get-info",
            Command::CheckSat => "check-sat",
            Command::CheckSatAssuming(_) => "check-sat-assuming",
            Command::GetValue(_) => "get-value",
            Command::GetModel => "get-model",
            Command::GetUnsatCore => "get-unsat-core",
            Command::GetUnsatAssumptions => "get-unsat-assumptions",
            Command::GetProof => "get-proof",
            Command::GetAssertions => "get-assertions",
            Command::Push(_) => "push",
            Command::Pop(_) => "pop",
            Command::ResetAssertions => "reset-assertions",
            Command::Echo(_) => "echo",
            Command::Exit => "exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The exact outbound text for one command plus the expected answer shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub text: String,
    pub shape: ResponseShape,
}
