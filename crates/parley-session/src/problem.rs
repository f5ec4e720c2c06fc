//! The compiled problem handed over when a session turns interactive.

use std::time::Duration;

/// Immutable output of the (external) constraint compiler: the full
/// program text for the solver plus the configuration it must run under.
///
/// Built once, then owned by the session for the duration of one run.
/// The option names mirror SMT-LIB (`produce-models`,
/// `produce-unsat-cores`, …); the leading `:` may be omitted.
#[derive(Debug, Clone)]
pub struct CompiledProblem {
    logic: Option<String>,
    options: Vec<(String, String)>,
    program: String,
    check_timeout: Option<Duration>,
}

impl CompiledProblem {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            logic: None,
            options: Vec::new(),
            program: program.into(),
            check_timeout: None,
        }
    }

    /// Logic to select before the program text is delivered.
    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = Some(logic.into());
        self
    }

    /// Append a solver option set during the session preamble.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((normalize(name.into()), value.into()));
        self
    }

    /// Timeout applied to each check-sat-family command. On expiry the
    /// engine is interrupted and the session closes; post-interrupt
    /// solver state is not trusted.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }

    pub fn logic(&self) -> Option<&str> {
        self.logic.as_deref()
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout
    }

    /// Whether `get-unsat-core` is meaningful under these options.
    pub fn core_tracking(&self) -> bool {
        self.option_enabled(":produce-unsat-cores")
    }

    /// Whether `get-proof` is meaningful under these options.
    pub fn proof_production(&self) -> bool {
        self.option_enabled(":produce-proofs")
    }

    fn option_enabled(&self, name: &str) -> bool {
        self.options
            .iter()
            .any(|(n, v)| n == name && v.trim() == "true")
    }
}

fn normalize(name: String) -> String {
    if name.starts_with(':') {
        name
    } else {
        format!(":{name}")
    }
}
