//! The interactive session state machine.
//!
//! A [`Session`] goes through three modes: `Building` while the
//! front-end is still assembling constraints, `Interactive` after the
//! compiled problem has been delivered to a launched engine, and
//! `Closed`. The building → interactive transition happens exactly once
//! per run; the response stream of a running engine cannot be safely
//! demultiplexed between two command sequences, so nested or repeated
//! sessions are rejected outright.
//!
//! Every operation is a strict round trip: encode, send, read one frame,
//! decode. Usage errors are caught before any I/O. Decode mismatches,
//! echo mismatches, transport loss and timeouts force-close the session
//! — after an interrupt the engine's state is not trusted to resume.

use std::time::Duration;

use serde::Serialize;

use parley_wire::{
    AssertionList, CheckSatResult, Command, DecodeError, Dialect, Proof, Response, ResponseShape,
    Smtlib2, UnsatCore, Value, ValueAssignment,
};

use crate::error::{SessionError, TransportError, UsageError};
use crate::problem::CompiledProblem;
use crate::stack::StackTracker;
use crate::transport::{EngineLauncher, Transport};

/// Observable session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    Building,
    Interactive,
    Closed,
}

/// Branch-selection order for [`Session::case_split`]. The exploration
/// is depth-first either way; only the tie-break between alternatives
/// differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseSplitOrder {
    /// Try alternatives in the order they were supplied.
    #[default]
    Declared,
    /// Try alternatives last-to-first.
    Reversed,
}

/// Outcome of a [`Session::case_split`] exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CaseSplitOutcome {
    /// The first alternative (in exploration order) that checked
    /// satisfiable. Its index refers to the supplied slice.
    Satisfying {
        index: usize,
        assumptions: Vec<String>,
    },
    /// No alternative was satisfiable. Branches the solver could not
    /// decide are listed with their reasons.
    Exhausted { unknowns: Vec<(usize, String)> },
}

struct InteractiveState {
    transport: Box<dyn Transport>,
    stack: StackTracker,
    last_check: Option<CheckSatResult>,
    check_timeout: Option<Duration>,
    core_tracking: bool,
    proof_production: bool,
}

enum State {
    Building { launcher: Box<dyn EngineLauncher> },
    Interactive(Box<InteractiveState>),
    Closed,
}

/// Handle for one solving run.
///
/// Constructed in building mode with an engine launcher and a dialect;
/// turned interactive at most once via [`enter_interactive`]; closed by
/// [`exit`], a timeout, or a fatal protocol failure. All operations are
/// methods on this value — there is no ambient global state.
///
/// [`enter_interactive`]: Session::enter_interactive
/// [`exit`]: Session::exit
pub struct Session {
    dialect: Box<dyn Dialect>,
    state: State,
}

impl Session {
    /// Start a run in building mode, speaking SMT-LIB 2.
    pub fn new(launcher: impl EngineLauncher + 'static) -> Self {
        Self::with_dialect(launcher, Smtlib2)
    }

    /// Start a run with a custom response dialect.
    pub fn with_dialect(
        launcher: impl EngineLauncher + 'static,
        dialect: impl Dialect + 'static,
    ) -> Self {
        Self {
            dialect: Box::new(dialect),
            state: State::Building {
                launcher: Box::new(launcher),
            },
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self.state {
            State::Building { .. } => SessionMode::Building,
            State::Interactive(_) => SessionMode::Interactive,
            State::Closed => SessionMode::Closed,
        }
    }

    /// Transition from building into the interactive phase: launch the
    /// engine, deliver the options, logic and program text, and reset
    /// the assertion stack.
    ///
    /// May be called at most once per run. Calling it while already
    /// interactive (or after close) fails with
    /// [`UsageError::NestedSession`] and leaves the existing state
    /// untouched.
    pub fn enter_interactive(&mut self, problem: CompiledProblem) -> Result<(), SessionError> {
        if !matches!(self.state, State::Building { .. }) {
            return Err(UsageError::NestedSession.into());
        }
        let State::Building { mut launcher } = std::mem::replace(&mut self.state, State::Closed)
        else {
            return Err(UsageError::NestedSession.into());
        };

        let mut transport = launcher.launch().map_err(SessionError::Launch)?;

        // Preamble order matters to real solvers: options first, then the
        // logic, then the accumulated program text.
        for (name, value) in problem.options() {
            let wire = self
                .dialect
                .encode(&Command::SetOption(name.clone(), value.clone()));
            transport.send(&wire.text).map_err(launch_lost)?;
        }
        if let Some(logic) = problem.logic() {
            let wire = self.dialect.encode(&Command::SetLogic(logic.to_string()));
            transport.send(&wire.text).map_err(launch_lost)?;
        }
        transport.send(problem.program()).map_err(launch_lost)?;

        tracing::debug!(
            program_bytes = problem.program().len(),
            options = problem.options().len(),
            "compiled problem delivered; session is interactive"
        );

        self.state = State::Interactive(Box::new(InteractiveState {
            transport,
            stack: StackTracker::new(),
            last_check: None,
            check_timeout: problem.check_timeout(),
            core_tracking: problem.core_tracking(),
            proof_production: problem.proof_production(),
        }));
        Ok(())
    }

    // ---- check-sat family ----

    pub fn check_sat(&mut self) -> Result<CheckSatResult, SessionError> {
        self.run_check(Command::CheckSat)
    }

    /// Check satisfiability under a set of named Boolean assumptions.
    pub fn check_sat_assuming(
        &mut self,
        assumptions: &[String],
    ) -> Result<CheckSatResult, SessionError> {
        self.run_check(Command::CheckSatAssuming(assumptions.to_vec()))
    }

    /// Like [`check_sat_assuming`], but on an unsatisfiable answer also
    /// fetches the subset of the supplied assumptions the solver used,
    /// via `get-unsat-assumptions`. The engine must have been started
    /// with `:produce-unsat-assumptions true` for the follow-up to
    /// succeed.
    ///
    /// [`check_sat_assuming`]: Session::check_sat_assuming
    pub fn check_sat_assuming_with_unsat_set(
        &mut self,
        assumptions: &[String],
    ) -> Result<(CheckSatResult, Option<UnsatCore>), SessionError> {
        let result = self.run_check(Command::CheckSatAssuming(assumptions.to_vec()))?;
        if !result.is_unsatisfiable() {
            return Ok((result, None));
        }
        let response = self.write_op(Command::GetUnsatAssumptions, None)?;
        let core = match response {
            Response::UnsatAssumptions(core) => core,
            other => return Err(self.dialect_shape_bug("get-unsat-assumptions", &other)),
        };
        // Solvers may answer with internal labels too; report only the
        // assumptions the caller actually passed.
        let filtered: Vec<String> = core
            .labels()
            .iter()
            .filter(|label| assumptions.contains(label))
            .cloned()
            .collect();
        Ok((result, Some(UnsatCore::new(filtered))))
    }

    // ---- derived information ----

    /// Concrete values for the given names. Valid only while the
    /// immediately preceding check result is `Satisfiable`.
    pub fn get_value(&mut self, names: &[&str]) -> Result<ValueAssignment, SessionError> {
        self.require_result("get-value", ResultKind::Satisfiable)?;
        let command = Command::GetValue(names.iter().map(|n| n.to_string()).collect());
        let response = self.write_op(command, None)?;
        match response {
            Response::Values(values) => Ok(values),
            other => Err(self.dialect_shape_bug("get-value", &other)),
        }
    }

    /// The full model over all declared symbols. Valid only while the
    /// immediately preceding check result is `Satisfiable`.
    pub fn get_model(&mut self) -> Result<ValueAssignment, SessionError> {
        self.require_result("get-model", ResultKind::Satisfiable)?;
        let response = self.write_op(Command::GetModel, None)?;
        match response {
            Response::Model(model) => Ok(model),
            other => Err(self.dialect_shape_bug("get-model", &other)),
        }
    }

    /// The unsat core of the last `Unsatisfiable` answer. Requires core
    /// tracking to have been enabled in the compiled problem.
    pub fn get_unsat_core(&mut self) -> Result<UnsatCore, SessionError> {
        self.require_result("get-unsat-core", ResultKind::Unsatisfiable)?;
        if !self.interactive("get-unsat-core")?.core_tracking {
            return Err(UsageError::CoreTrackingDisabled.into());
        }
        let response = self.write_op(Command::GetUnsatCore, None)?;
        match response {
            Response::UnsatCore(core) => Ok(core),
            other => Err(self.dialect_shape_bug("get-unsat-core", &other)),
        }
    }

    /// The proof of the last `Unsatisfiable` answer. Requires proof
    /// production to have been enabled in the compiled problem.
    pub fn get_proof(&mut self) -> Result<Proof, SessionError> {
        self.require_result("get-proof", ResultKind::Unsatisfiable)?;
        if !self.interactive("get-proof")?.proof_production {
            return Err(UsageError::ProofProductionDisabled.into());
        }
        let response = self.write_op(Command::GetProof, None)?;
        match response {
            Response::Proof(proof) => Ok(proof),
            other => Err(self.dialect_shape_bug("get-proof", &other)),
        }
    }

    pub fn get_assertions(&mut self) -> Result<AssertionList, SessionError> {
        let response = self.write_op(Command::GetAssertions, None)?;
        match response {
            Response::Assertions(assertions) => Ok(assertions),
            other => Err(self.dialect_shape_bug("get-assertions", &other)),
        }
    }

    pub fn get_info(&mut self, flag: &str) -> Result<Value, SessionError> {
        let response = self.write_op(Command::GetInfo(flag.to_string()), None)?;
        match response {
            Response::Info(value) => Ok(value),
            other => Err(self.dialect_shape_bug("get-info", &other)),
        }
    }

    pub fn get_option(&mut self, name: &str) -> Result<Value, SessionError> {
        let response = self.write_op(Command::GetOption(name.to_string()), None)?;
        match response {
            Response::OptionValue(value) => Ok(value),
            other => Err(self.dialect_shape_bug("get-option", &other)),
        }
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.write_op(Command::SetOption(name.to_string(), value.to_string()), None)?;
        Ok(())
    }

    // ---- assertion stack ----

    /// The locally tracked assertion stack depth. No solver round trip.
    pub fn stack_depth(&self) -> Result<u32, SessionError> {
        Ok(self.interactive("stack-depth")?.stack.depth())
    }

    pub fn push(&mut self, n: u32) -> Result<(), SessionError> {
        self.interactive("push")?;
        self.write_op(Command::Push(n), None)?;
        if let State::Interactive(ia) = &mut self.state {
            ia.stack.push(n);
            ia.last_check = None;
        }
        Ok(())
    }

    /// Pop `n` levels. An `n` beyond the current depth is a usage error
    /// rejected before any solver communication.
    pub fn pop(&mut self, n: u32) -> Result<(), SessionError> {
        let depth = self.interactive("pop")?.stack.depth();
        if n > depth {
            return Err(UsageError::PopOutOfRange {
                requested: n,
                depth,
            }
            .into());
        }
        self.write_op(Command::Pop(n), None)?;
        if let State::Interactive(ia) = &mut self.state {
            // Validated above; the tracker cannot refuse now.
            let _ = ia.stack.try_pop(n);
            ia.last_check = None;
        }
        Ok(())
    }

    /// Push one level, run `body`, and pop it again on every exit path,
    /// so temporary assertions cannot leak past an early return or a
    /// failure inside the block.
    pub fn scoped<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        self.push(1)?;
        let result = body(self);
        let balance = if matches!(self.state, State::Interactive(_)) {
            self.pop(1)
        } else {
            // A fatal failure inside the block already closed the
            // session; there is no stack left to balance.
            Ok(())
        };
        match (result, balance) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    /// Clear all assertions and scopes; depth returns to zero and any
    /// remembered check result is invalidated.
    pub fn reset_assertions(&mut self) -> Result<(), SessionError> {
        self.interactive("reset-assertions")?;
        self.write_op(Command::ResetAssertions, None)?;
        if let State::Interactive(ia) = &mut self.state {
            ia.stack.reset();
            ia.last_check = None;
        }
        Ok(())
    }

    // ---- tactics ----

    /// Depth-first exploration of alternative assumption sets: each
    /// alternative is checked under `check-sat-assuming`, and the first
    /// satisfying one wins. Unsatisfiable branches are discarded;
    /// undecided branches are collected into the exhaustion result.
    pub fn case_split(
        &mut self,
        cases: &[Vec<String>],
        order: CaseSplitOrder,
    ) -> Result<CaseSplitOutcome, SessionError> {
        self.interactive("case-split")?;
        let indices: Vec<usize> = match order {
            CaseSplitOrder::Declared => (0..cases.len()).collect(),
            CaseSplitOrder::Reversed => (0..cases.len()).rev().collect(),
        };
        let mut unknowns = Vec::new();
        for index in indices {
            let result = self.run_check(Command::CheckSatAssuming(cases[index].clone()))?;
            match result {
                CheckSatResult::Satisfiable => {
                    return Ok(CaseSplitOutcome::Satisfying {
                        index,
                        assumptions: cases[index].clone(),
                    })
                }
                CheckSatResult::Unsatisfiable => {}
                CheckSatResult::Unknown(reason) => unknowns.push((index, reason)),
            }
        }
        Ok(CaseSplitOutcome::Exhausted { unknowns })
    }

    /// Ask the solver to echo `text` back verbatim. Any discrepancy
    /// means command and response streams are no longer paired, which is
    /// fatal to the session.
    pub fn echo(&mut self, text: &str) -> Result<String, SessionError> {
        let response = self.write_op(Command::Echo(text.to_string()), None)?;
        match response {
            Response::Echo(received) => Ok(received),
            other => Err(self.dialect_shape_bug("echo", &other)),
        }
    }

    /// End the session. Sends the termination command when an engine is
    /// still running, then closes. Idempotent: a second call is a no-op.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Interactive(mut ia) => {
                let wire = self.dialect.encode(&Command::Exit);
                // Best-effort: the engine may already be gone.
                let _ = ia.transport.send(&wire.text);
                let _ = ia.transport.shutdown();
                tracing::debug!("session exited");
                Ok(())
            }
            State::Building { .. } | State::Closed => Ok(()),
        }
    }

    // ---- internals ----

    fn interactive(&self, operation: &'static str) -> Result<&InteractiveState, UsageError> {
        match &self.state {
            State::Interactive(ia) => Ok(ia),
            State::Building { .. } => Err(UsageError::NotInteractive { operation }),
            State::Closed => Err(UsageError::SessionClosed { operation }),
        }
    }

    /// Gate a derived-information query on the remembered check result.
    fn require_result(&self, query: &'static str, kind: ResultKind) -> Result<(), UsageError> {
        let ia = self.interactive(query)?;
        match (&ia.last_check, kind) {
            (None, _) => Err(UsageError::NoPriorCheck { query }),
            (Some(CheckSatResult::Satisfiable), ResultKind::Satisfiable) => Ok(()),
            (Some(CheckSatResult::Unsatisfiable), ResultKind::Unsatisfiable) => Ok(()),
            (Some(actual), _) => Err(UsageError::ResultMismatch {
                query,
                expected: kind.describe(),
                actual: actual.describe(),
            }),
        }
    }

    /// One full round trip. Fatal failures close the session before the
    /// error is returned; usage errors pass through untouched.
    fn write_op(
        &mut self,
        command: Command,
        deadline: Option<Duration>,
    ) -> Result<Response, SessionError> {
        let outcome = {
            let Self { dialect, state } = self;
            let ia = match state {
                State::Interactive(ia) => ia,
                State::Building { .. } => {
                    return Err(UsageError::NotInteractive {
                        operation: command.name(),
                    }
                    .into())
                }
                State::Closed => {
                    return Err(UsageError::SessionClosed {
                        operation: command.name(),
                    }
                    .into())
                }
            };
            exchange(dialect.as_ref(), ia.as_mut(), &command, deadline)
        };
        match outcome {
            Err(err) if err.is_fatal() => {
                self.force_close();
                Err(err)
            }
            other => other,
        }
    }

    fn run_check(&mut self, command: Command) -> Result<CheckSatResult, SessionError> {
        let deadline = self.interactive(command.name())?.check_timeout;
        let response = self.write_op(command, deadline)?;
        let result = match response {
            Response::CheckSat(CheckSatResult::Unknown(reason)) if reason.is_empty() => {
                CheckSatResult::Unknown(self.recover_unknown_reason()?)
            }
            Response::CheckSat(result) => result,
            other => return Err(self.dialect_shape_bug("check-sat", &other)),
        };
        if let State::Interactive(ia) = &mut self.state {
            ia.last_check = Some(result.clone());
        }
        Ok(result)
    }

    /// Bare `unknown` answers carry no reason; `get-info
    /// :reason-unknown` recovers it. A solver that answers the follow-up
    /// with `(error …)` is still well-framed, so that case degrades to a
    /// plain `"unknown"` instead of closing the session.
    fn recover_unknown_reason(&mut self) -> Result<String, SessionError> {
        let command = Command::GetInfo(":reason-unknown".to_string());
        let outcome = {
            let Self { dialect, state } = self;
            match state {
                State::Interactive(ia) => exchange(dialect.as_ref(), ia.as_mut(), &command, None),
                State::Building { .. } | State::Closed => {
                    return Err(UsageError::NotInteractive {
                        operation: "get-info",
                    }
                    .into())
                }
            }
        };
        match outcome {
            Ok(Response::Info(value)) => Ok(value.as_text()),
            Ok(other) => Err(self.dialect_shape_bug("get-info", &other)),
            Err(SessionError::Decode {
                source: DecodeError::SolverReported(_),
                ..
            }) => Ok("unknown".to_string()),
            Err(err) => {
                if err.is_fatal() {
                    self.force_close();
                }
                Err(err)
            }
        }
    }

    /// A dialect returned a response variant that does not belong to the
    /// operation. That is as much a desynchronization as a grammar
    /// mismatch, so it closes the session.
    fn dialect_shape_bug(&mut self, command: &'static str, response: &Response) -> SessionError {
        self.force_close();
        SessionError::Decode {
            command,
            source: DecodeError::Grammar {
                command,
                expected: "the operation's response variant",
                raw: format!("{response:?}"),
            },
        }
    }

    fn force_close(&mut self) {
        if let State::Interactive(ia) = &mut self.state {
            ia.transport.interrupt();
            tracing::warn!("session force-closed; solver state is no longer trusted");
        }
        self.state = State::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

#[derive(Debug, Clone, Copy)]
enum ResultKind {
    Satisfiable,
    Unsatisfiable,
}

impl ResultKind {
    fn describe(self) -> &'static str {
        match self {
            ResultKind::Satisfiable => "satisfiable",
            ResultKind::Unsatisfiable => "unsatisfiable",
        }
    }
}

/// Send one command and, when the dialect expects an answer, read and
/// decode exactly one frame.
fn exchange(
    dialect: &dyn Dialect,
    ia: &mut InteractiveState,
    command: &Command,
    deadline: Option<Duration>,
) -> Result<Response, SessionError> {
    let wire = dialect.encode(command);
    tracing::debug!(command = %wire.text, "-> solver");
    ia.transport.send(&wire.text).map_err(transport_lost)?;

    if wire.shape == ResponseShape::None {
        return Ok(Response::Ack);
    }

    let raw = ia
        .transport
        .recv(wire.shape, deadline)
        .map_err(|err| match err {
            TransportError::Timeout => {
                SessionError::Timeout(deadline.unwrap_or(Duration::ZERO))
            }
            other => transport_lost(other),
        })?;
    tracing::debug!(response = %raw, "<- solver");

    dialect
        .decode(command, &raw)
        .map_err(|source| SessionError::Decode {
            command: command.name(),
            source,
        })
}

fn transport_lost(err: TransportError) -> SessionError {
    SessionError::SolverLost(err.to_string())
}

fn launch_lost(err: TransportError) -> SessionError {
    SessionError::SolverLost(format!("engine died during problem delivery: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLauncher, Step};

    fn problem() -> CompiledProblem {
        CompiledProblem::new("(declare-const x Int)\n(assert (> x 0))\n")
            .with_logic("QF_LIA")
            .with_option("produce-models", "true")
            .with_option("produce-unsat-cores", "true")
    }

    fn interactive_session(steps: Vec<Step>) -> (Session, crate::testing::SentLog) {
        let launcher = ScriptedLauncher::new(steps);
        let log = launcher.sent_log();
        let mut session = Session::new(launcher);
        session.enter_interactive(problem()).unwrap();
        (session, log)
    }

    // ---- mode transitions ----

    #[test]
    fn building_mode_rejects_interactive_operations_without_io() {
        let launcher = ScriptedLauncher::new(vec![]);
        let log = launcher.sent_log();
        let mut session = Session::new(launcher);

        assert_eq!(session.mode(), SessionMode::Building);
        let err = session.check_sat().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::NotInteractive {
                operation: "check-sat"
            })
        ));
        assert!(log.lock().unwrap().is_empty(), "no solver I/O expected");
    }

    #[test]
    fn enter_interactive_delivers_options_logic_and_program() {
        let (session, log) = interactive_session(vec![]);
        assert_eq!(session.mode(), SessionMode::Interactive);

        let sent = log.lock().unwrap();
        assert_eq!(sent[0], "(set-option :produce-models true)");
        assert_eq!(sent[1], "(set-option :produce-unsat-cores true)");
        assert_eq!(sent[2], "(set-logic QF_LIA)");
        assert!(sent[3].contains("(declare-const x Int)"));
    }

    #[test]
    fn second_enter_interactive_is_a_nested_session_error() {
        let (mut session, _log) = interactive_session(vec![Step::Reply("sat".into())]);
        let err = session.enter_interactive(problem()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::NestedSession)
        ));
        // Existing state is unmodified: the session still works.
        assert_eq!(session.mode(), SessionMode::Interactive);
        assert_eq!(session.check_sat().unwrap(), CheckSatResult::Satisfiable);
    }

    #[test]
    fn exit_is_idempotent_and_closes_operations() {
        let (mut session, _log) = interactive_session(vec![]);
        session.exit().unwrap();
        assert_eq!(session.mode(), SessionMode::Closed);
        session.exit().unwrap();

        let err = session.push(1).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::SessionClosed { operation: "push" })
        ));
    }

    #[test]
    fn exit_sends_the_termination_command() {
        let (mut session, log) = interactive_session(vec![]);
        session.exit().unwrap();
        assert_eq!(log.lock().unwrap().last().unwrap(), "(exit)");
    }

    // ---- check-sat and derived queries ----

    #[test]
    fn check_sat_round_trip() {
        let (mut session, log) = interactive_session(vec![Step::Reply("sat".into())]);
        assert_eq!(session.check_sat().unwrap(), CheckSatResult::Satisfiable);
        assert_eq!(log.lock().unwrap().last().unwrap(), "(check-sat)");
    }

    #[test]
    fn unknown_answer_recovers_reason_via_get_info() {
        let (mut session, log) = interactive_session(vec![
            Step::Reply("unknown".into()),
            Step::Reply("(:reason-unknown \"incomplete quantifiers\")".into()),
        ]);
        let result = session.check_sat().unwrap();
        assert_eq!(
            result,
            CheckSatResult::Unknown("incomplete quantifiers".into())
        );
        assert_eq!(
            log.lock().unwrap().last().unwrap(),
            "(get-info :reason-unknown)"
        );
    }

    #[test]
    fn get_value_after_sat() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("sat".into()),
            Step::Reply("((x 41))".into()),
        ]);
        session.check_sat().unwrap();
        let values = session.get_value(&["x"]).unwrap();
        assert_eq!(values.get_int("x"), Some(41));
    }

    #[test]
    fn get_value_without_prior_check_is_a_usage_error() {
        let (mut session, log) = interactive_session(vec![]);
        let before = log.lock().unwrap().len();
        let err = session.get_value(&["x"]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::NoPriorCheck { query: "get-value" })
        ));
        assert_eq!(log.lock().unwrap().len(), before, "no solver I/O expected");
    }

    #[test]
    fn get_value_after_unsat_is_a_usage_error() {
        let (mut session, _log) = interactive_session(vec![Step::Reply("unsat".into())]);
        session.check_sat().unwrap();
        let err = session.get_value(&["x"]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::ResultMismatch {
                query: "get-value",
                expected: "satisfiable",
                actual: "unsatisfiable",
            })
        ));
        // The session survives a usage error.
        assert_eq!(session.mode(), SessionMode::Interactive);
    }

    #[test]
    fn unsat_core_end_to_end() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("unsat".into()),
            Step::Reply("(positive negative)".into()),
        ]);
        assert_eq!(session.check_sat().unwrap(), CheckSatResult::Unsatisfiable);
        let core = session.get_unsat_core().unwrap();
        assert!(!core.is_empty());
        assert!(core.contains("positive"));
    }

    #[test]
    fn unsat_core_requires_core_tracking() {
        let launcher = ScriptedLauncher::new(vec![Step::Reply("unsat".into())]);
        let mut session = Session::new(launcher);
        session
            .enter_interactive(CompiledProblem::new("(assert false)"))
            .unwrap();
        session.check_sat().unwrap();
        let err = session.get_unsat_core().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::CoreTrackingDisabled)
        ));
    }

    #[test]
    fn get_model_after_sat() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("sat".into()),
            Step::Reply("(model (define-fun x () Int 7))".into()),
        ]);
        session.check_sat().unwrap();
        let model = session.get_model().unwrap();
        assert_eq!(model.get_int("x"), Some(7));
    }

    #[test]
    fn check_sat_assuming_with_unsat_set_filters_to_passed_assumptions() {
        let (mut session, log) = interactive_session(vec![
            Step::Reply("unsat".into()),
            Step::Reply("(a0 internal!3 a1)".into()),
        ]);
        let assumptions = vec!["a0".to_string(), "a1".to_string()];
        let (result, core) = session
            .check_sat_assuming_with_unsat_set(&assumptions)
            .unwrap();
        assert_eq!(result, CheckSatResult::Unsatisfiable);
        let core = core.unwrap();
        assert_eq!(core.labels(), &["a0", "a1"]);
        let sent = log.lock().unwrap();
        assert!(sent.contains(&"(check-sat-assuming (a0 a1))".to_string()));
        assert!(sent.contains(&"(get-unsat-assumptions)".to_string()));
    }

    // ---- assertion stack ----

    #[test]
    fn push_pop_round_trip_to_depth_zero() {
        let (mut session, log) = interactive_session(vec![]);
        session.push(3).unwrap();
        assert_eq!(session.stack_depth().unwrap(), 3);
        for _ in 0..3 {
            session.pop(1).unwrap();
        }
        assert_eq!(session.stack_depth().unwrap(), 0);

        let sent = log.lock().unwrap();
        assert!(sent.contains(&"(push 3)".to_string()));
        assert_eq!(sent.iter().filter(|c| c.as_str() == "(pop 1)").count(), 3);
    }

    #[test]
    fn oversized_pop_is_rejected_before_any_io() {
        let (mut session, log) = interactive_session(vec![]);
        session.push(1).unwrap();
        let before = log.lock().unwrap().len();
        let err = session.pop(2).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::PopOutOfRange {
                requested: 2,
                depth: 1,
            })
        ));
        assert_eq!(log.lock().unwrap().len(), before);
        assert_eq!(session.stack_depth().unwrap(), 1);
    }

    #[test]
    fn push_invalidates_the_remembered_check_result() {
        let (mut session, _log) = interactive_session(vec![Step::Reply("sat".into())]);
        session.check_sat().unwrap();
        session.push(1).unwrap();
        let err = session.get_value(&["x"]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::NoPriorCheck { .. })
        ));
    }

    #[test]
    fn scoped_pops_on_success_and_on_failure() {
        let (mut session, _log) = interactive_session(vec![Step::Reply("sat".into())]);
        let result = session
            .scoped(|s| {
                assert_eq!(s.stack_depth()?, 1);
                s.check_sat()
            })
            .unwrap();
        assert_eq!(result, CheckSatResult::Satisfiable);
        assert_eq!(session.stack_depth().unwrap(), 0);

        let err = session
            .scoped(|s| -> Result<(), SessionError> {
                assert_eq!(s.stack_depth()?, 1);
                Err(UsageError::NoPriorCheck { query: "get-value" }.into())
            })
            .unwrap_err();
        assert!(err.is_usage());
        assert_eq!(session.stack_depth().unwrap(), 0);
    }

    #[test]
    fn reset_assertions_clears_stack_and_result() {
        let (mut session, _log) = interactive_session(vec![Step::Reply("sat".into())]);
        session.push(2).unwrap();
        session.check_sat().unwrap();
        session.reset_assertions().unwrap();
        assert_eq!(session.stack_depth().unwrap(), 0);
        assert!(matches!(
            session.get_value(&["x"]).unwrap_err(),
            SessionError::Usage(UsageError::NoPriorCheck { .. })
        ));
    }

    // ---- failure handling ----

    #[test]
    fn timeout_closes_the_session() {
        let launcher = ScriptedLauncher::new(vec![Step::Timeout]);
        let mut session = Session::new(launcher);
        session
            .enter_interactive(problem().with_check_timeout(Duration::from_millis(10)))
            .unwrap();

        let err = session.check_sat().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert_eq!(session.mode(), SessionMode::Closed);

        let err = session.check_sat().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Usage(UsageError::SessionClosed { .. })
        ));
    }

    #[test]
    fn malformed_response_closes_the_session_with_raw_text() {
        let (mut session, _log) =
            interactive_session(vec![Step::Reply("segmentation fault".into())]);
        let err = session.check_sat().unwrap_err();
        let (command, source) = match err {
            SessionError::Decode { command, source } => (command, source),
            other => panic!("expected decode error, got {other:?}"),
        };
        assert_eq!(command, "check-sat");
        assert!(matches!(
            source,
            DecodeError::Grammar { raw, .. } if raw == "segmentation fault"
        ));
        assert_eq!(session.mode(), SessionMode::Closed);
    }

    #[test]
    fn hangup_is_solver_lost() {
        let (mut session, _log) = interactive_session(vec![Step::Hangup]);
        let err = session.check_sat().unwrap_err();
        assert!(matches!(err, SessionError::SolverLost(_)));
        assert_eq!(session.mode(), SessionMode::Closed);
    }

    #[test]
    fn echo_round_trip_and_mismatch() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("marker".into()),
            Step::Reply("stale-frame".into()),
        ]);
        assert_eq!(session.echo("marker").unwrap(), "marker");

        let err = session.echo("fresh").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Decode {
                source: DecodeError::EchoMismatch { .. },
                ..
            }
        ));
        assert_eq!(session.mode(), SessionMode::Closed);
    }

    #[test]
    fn solver_reported_error_is_fatal_decode() {
        let (mut session, _log) =
            interactive_session(vec![Step::Reply("(error \"not supported\")".into())]);
        let err = session.check_sat().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Decode {
                source: DecodeError::SolverReported(_),
                ..
            }
        ));
        assert_eq!(session.mode(), SessionMode::Closed);
    }

    // ---- case split ----

    #[test]
    fn case_split_returns_first_satisfying_branch() {
        let (mut session, log) = interactive_session(vec![
            Step::Reply("unsat".into()),
            Step::Reply("sat".into()),
        ]);
        let cases = vec![
            vec!["left".to_string()],
            vec!["right".to_string()],
            vec!["never-tried".to_string()],
        ];
        let outcome = session.case_split(&cases, CaseSplitOrder::Declared).unwrap();
        assert_eq!(
            outcome,
            CaseSplitOutcome::Satisfying {
                index: 1,
                assumptions: vec!["right".to_string()],
            }
        );
        let sent = log.lock().unwrap();
        assert!(!sent.iter().any(|c| c.contains("never-tried")));
    }

    #[test]
    fn case_split_reversed_order() {
        let (mut session, log) = interactive_session(vec![Step::Reply("sat".into())]);
        let cases = vec![vec!["a".to_string()], vec!["b".to_string()]];
        let outcome = session.case_split(&cases, CaseSplitOrder::Reversed).unwrap();
        assert_eq!(
            outcome,
            CaseSplitOutcome::Satisfying {
                index: 1,
                assumptions: vec!["b".to_string()],
            }
        );
        assert!(log
            .lock()
            .unwrap()
            .contains(&"(check-sat-assuming (b))".to_string()));
    }

    #[test]
    fn case_split_exhaustion_collects_unknowns() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("unsat".into()),
            Step::Reply("unknown".into()),
            Step::Reply("(:reason-unknown \"timeout\")".into()),
        ]);
        let cases = vec![vec!["a".to_string()], vec!["b".to_string()]];
        let outcome = session.case_split(&cases, CaseSplitOrder::Declared).unwrap();
        assert_eq!(
            outcome,
            CaseSplitOutcome::Exhausted {
                unknowns: vec![(1, "timeout".to_string())],
            }
        );
    }

    #[test]
    fn outcomes_serialize_for_reporting() {
        let outcome = CaseSplitOutcome::Satisfying {
            index: 1,
            assumptions: vec!["b".to_string()],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("Satisfying"));
        assert_eq!(
            serde_json::to_string(&SessionMode::Closed).unwrap(),
            "\"Closed\""
        );
    }

    #[test]
    fn case_split_leaves_last_check_usable() {
        let (mut session, _log) = interactive_session(vec![
            Step::Reply("sat".into()),
            Step::Reply("((x 2))".into()),
        ]);
        let cases = vec![vec!["a".to_string()]];
        session.case_split(&cases, CaseSplitOrder::Declared).unwrap();
        // The satisfying branch's result is the current solver state.
        let values = session.get_value(&["x"]).unwrap();
        assert_eq!(values.get_int("x"), Some(2));
    }
}
