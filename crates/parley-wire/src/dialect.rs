//! Pluggable solver dialect: encoding commands, decoding responses.
//!
//! A [`Dialect`] is the strategy for one solver family's textual grammar.
//! It is injected into the session layer so that response parsing can be
//! swapped per family (or mocked) without touching the state machine.
//! The shipped [`Smtlib2`] dialect speaks the SMT-LIB 2 concrete syntax
//! emitted by Z3 and cvc5 in incremental mode.

use std::fmt;

use thiserror::Error;

use crate::command::{Command, ResponseShape, Wire};
use crate::response::{
    AssertionList, CheckSatResult, Proof, Response, UnsatCore, Value, ValueAssignment,
};
use crate::sexp::{self, Sexp};

/// Decode-side failure: the response does not fit the grammar the
/// command calls for. Always carries the raw text for diagnosis.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} in response to `{command}`, got: {raw}")]
    Grammar {
        command: &'static str,
        expected: &'static str,
        raw: String,
    },
    /// The solver answered `(error "…")` instead of the expected result.
    #[error("solver reported an error: {0}")]
    SolverReported(String),
    #[error("echo mismatch: sent {sent:?}, received {received:?}")]
    EchoMismatch { sent: String, received: String },
}

/// Strategy for one solver family's command/response grammar.
pub trait Dialect: fmt::Debug + Send {
    /// Render the outbound text and the response shape to expect back.
    fn encode(&self, command: &Command) -> Wire;

    /// Decode one framed response for the command that elicited it.
    fn decode(&self, command: &Command, raw: &str) -> Result<Response, DecodeError>;
}

/// The SMT-LIB 2 dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct Smtlib2;

impl Dialect for Smtlib2 {
    fn encode(&self, command: &Command) -> Wire {
        use ResponseShape::{Atom, None, Sexpr};

        let (text, shape) = match command {
            Command::SetLogic(logic) => (format!("(set-logic {logic})"), None),
            Command::SetOption(name, value) => {
                (format!("(set-option {} {value})", keyword(name)), None)
            }
            Command::GetOption(name) => (format!("(get-option {})", keyword(name)), Sexpr),
            Command::GetInfo(flag) => (format!("(get-info {})", keyword(flag)), Sexpr),
            Command::CheckSat => ("(check-sat)".to_string(), Atom),
            Command::CheckSatAssuming(labels) => (
                format!("(check-sat-assuming ({}))", labels.join(" ")),
                Atom,
            ),
            Command::GetValue(names) => (format!("(get-value ({}))", names.join(" ")), Sexpr),
            Command::GetModel => ("(get-model)".to_string(), Sexpr),
            Command::GetUnsatCore => ("(get-unsat-core)".to_string(), Sexpr),
            Command::GetUnsatAssumptions => ("(get-unsat-assumptions)".to_string(), Sexpr),
            Command::GetProof => ("(get-proof)".to_string(), Sexpr),
            Command::GetAssertions => ("(get-assertions)".to_string(), Sexpr),
            Command::Push(n) => (format!("(push {n})"), None),
            Command::Pop(n) => (format!("(pop {n})"), None),
            Command::ResetAssertions => ("(reset-assertions)".to_string(), None),
            Command::Echo(text) => (format!("(echo \"{}\")", text.replace('"', "\"\"")), Atom),
            Command::Exit => ("(exit)".to_string(), None),
        };
        Wire { text, shape }
    }

    fn decode(&self, command: &Command, raw: &str) -> Result<Response, DecodeError> {
        let trimmed = raw.trim();

        if let Some(message) = decode_error_response(trimmed) {
            return Err(DecodeError::SolverReported(message));
        }

        match command {
            Command::CheckSat | Command::CheckSatAssuming(_) => {
                decode_check_sat(command.name(), trimmed).map(Response::CheckSat)
            }
            Command::GetValue(_) => decode_value_pairs(trimmed).map(Response::Values),
            Command::GetModel => decode_model(trimmed).map(Response::Model),
            Command::GetUnsatCore => {
                decode_label_list("get-unsat-core", trimmed).map(Response::UnsatCore)
            }
            Command::GetUnsatAssumptions => {
                decode_label_list("get-unsat-assumptions", trimmed).map(Response::UnsatAssumptions)
            }
            Command::GetProof => Ok(Response::Proof(Proof::new(trimmed))),
            Command::GetAssertions => decode_assertions(trimmed).map(Response::Assertions),
            Command::GetInfo(flag) => decode_info(flag, trimmed).map(Response::Info),
            Command::GetOption(_) => {
                let parsed = parse_response("get-option", "an option value", trimmed)?;
                Ok(Response::OptionValue(value_from_sexp(&parsed)))
            }
            Command::Echo(sent) => decode_echo(sent, trimmed).map(Response::Echo),
            // Write-only commands have no response to decode.
            _ => Ok(Response::Ack),
        }
    }
}

/// Normalize an option/info name to its keyword form (leading `:`).
fn keyword(name: &str) -> String {
    if name.starts_with(':') {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

fn parse_response(
    command: &'static str,
    expected: &'static str,
    raw: &str,
) -> Result<Sexp, DecodeError> {
    sexp::parse(raw).map_err(|_| DecodeError::Grammar {
        command,
        expected,
        raw: raw.to_string(),
    })
}

/// `(error "message")` — a well-formed response in every SMT-LIB dialect.
fn decode_error_response(raw: &str) -> Option<String> {
    if !raw.starts_with("(error") {
        return None;
    }
    let parsed = sexp::parse(raw).ok()?;
    let items = parsed.list()?;
    match items {
        [head, message] if head.atom() == Some("error") => Some(
            message
                .string_content()
                .unwrap_or_else(|| message.to_string()),
        ),
        _ => None,
    }
}

fn decode_check_sat(command: &'static str, raw: &str) -> Result<CheckSatResult, DecodeError> {
    match raw {
        "sat" => Ok(CheckSatResult::Satisfiable),
        "unsat" => Ok(CheckSatResult::Unsatisfiable),
        // Bare `unknown`: the session may follow up with
        // `(get-info :reason-unknown)` to fill in the reason.
        "unknown" => Ok(CheckSatResult::Unknown(String::new())),
        "timeout" => Ok(CheckSatResult::Unknown("timeout".to_string())),
        other => Err(DecodeError::Grammar {
            command,
            expected: "`sat`, `unsat` or `unknown`",
            raw: other.to_string(),
        }),
    }
}

/// `((name value) …)` from `get-value`.
fn decode_value_pairs(raw: &str) -> Result<ValueAssignment, DecodeError> {
    let parsed = parse_response("get-value", "a list of (name value) pairs", raw)?;
    let pairs = parsed.list().ok_or_else(|| DecodeError::Grammar {
        command: "get-value",
        expected: "a list of (name value) pairs",
        raw: raw.to_string(),
    })?;

    let mut values = ValueAssignment::new();
    for pair in pairs {
        match pair.list() {
            Some([name, value]) => {
                let key = name
                    .symbol_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| name.to_string());
                values.insert(key, value_from_sexp(value));
            }
            _ => {
                return Err(DecodeError::Grammar {
                    command: "get-value",
                    expected: "a (name value) pair",
                    raw: pair.to_string(),
                })
            }
        }
    }
    Ok(values)
}

/// `get-model` output: either `(model (define-fun …) …)` (older Z3) or a
/// bare `((define-fun …) …)` (Z3 4.15+, cvc5). Only nullary
/// `define-fun` entries — constants — are read; anything else in the
/// model body is skipped.
fn decode_model(raw: &str) -> Result<ValueAssignment, DecodeError> {
    let parsed = parse_response("get-model", "a model form", raw)?;
    let items = parsed.list().ok_or_else(|| DecodeError::Grammar {
        command: "get-model",
        expected: "a model form",
        raw: raw.to_string(),
    })?;

    let entries = match items.first() {
        Some(head) if head.atom() == Some("model") => &items[1..],
        _ => items,
    };

    let mut values = ValueAssignment::new();
    for entry in entries {
        let Some(parts) = entry.list() else { continue };
        let [head, name, args, _sort, value] = parts else {
            continue;
        };
        if head.atom() != Some("define-fun") {
            continue;
        }
        if !matches!(args.list(), Some([])) {
            continue;
        }
        let key = name
            .symbol_name()
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());
        values.insert(key, value_from_sexp(value));
    }
    Ok(values)
}

/// `(label …)` from `get-unsat-core` / `get-unsat-assumptions`.
fn decode_label_list(command: &'static str, raw: &str) -> Result<UnsatCore, DecodeError> {
    let parsed = parse_response(command, "a list of labels", raw)?;
    let items = parsed.list().ok_or_else(|| DecodeError::Grammar {
        command,
        expected: "a list of labels",
        raw: raw.to_string(),
    })?;

    let mut labels = Vec::with_capacity(items.len());
    for item in items {
        match item.symbol_name() {
            Some(name) => labels.push(name.to_string()),
            None => labels.push(item.to_string()),
        }
    }
    Ok(UnsatCore::new(labels))
}

fn decode_assertions(raw: &str) -> Result<AssertionList, DecodeError> {
    let parsed = parse_response("get-assertions", "a list of assertions", raw)?;
    let items = parsed.list().ok_or_else(|| DecodeError::Grammar {
        command: "get-assertions",
        expected: "a list of assertions",
        raw: raw.to_string(),
    })?;
    Ok(AssertionList::new(
        items.iter().map(Sexp::to_string).collect(),
    ))
}

/// `(:flag value…)` from `get-info`.
fn decode_info(flag: &str, raw: &str) -> Result<Value, DecodeError> {
    let parsed = parse_response("get-info", "a (:flag value) form", raw)?;
    let items = parsed.list().ok_or_else(|| DecodeError::Grammar {
        command: "get-info",
        expected: "a (:flag value) form",
        raw: raw.to_string(),
    })?;

    match items {
        [head, rest @ ..] if head.atom() == Some(keyword(flag).as_str()) && !rest.is_empty() => {
            if let [single] = rest {
                Ok(value_from_sexp(single))
            } else {
                let joined: Vec<String> = rest.iter().map(Sexp::to_string).collect();
                Ok(Value::Other(joined.join(" ")))
            }
        }
        _ => Err(DecodeError::Grammar {
            command: "get-info",
            expected: "a (:flag value) form",
            raw: raw.to_string(),
        }),
    }
}

/// The echoed line, unquoted when the solver kept the quotes, compared
/// verbatim against what was sent. A mismatch means the command and
/// response streams are no longer paired up.
fn decode_echo(sent: &str, raw: &str) -> Result<String, DecodeError> {
    let received = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].replace("\"\"", "\"")
    } else {
        raw.to_string()
    };
    if received == sent {
        Ok(received)
    } else {
        Err(DecodeError::EchoMismatch {
            sent: sent.to_string(),
            received,
        })
    }
}

fn value_from_sexp(sexp: &Sexp) -> Value {
    match sexp {
        Sexp::Atom(text) => {
            if let Some(content) = sexp.string_content() {
                return Value::Text(content);
            }
            match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => text
                    .parse::<i64>()
                    .map(Value::Int)
                    .unwrap_or_else(|_| Value::Other(text.clone())),
            }
        }
        Sexp::List(items) => {
            // `(- n)` is the SMT-LIB spelling of a negative numeral.
            if let [op, n] = items.as_slice() {
                if op.atom() == Some("-") {
                    if let Some(Ok(n)) = n.atom().map(str::parse::<i64>) {
                        return Value::Int(-n);
                    }
                }
            }
            Value::Other(sexp.to_string())
        }
    }
}
