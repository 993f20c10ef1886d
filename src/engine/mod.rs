//! Boundary between the harness and the JavaScript engine under test
//!
//! The harness never interprets JavaScript. An engine implements
//! [`ScriptEngine`] and, while running scripts, talks back to the harness
//! through the [`Context`] it is handed: it reports diagnostics to the
//! context's [`CollectingReporter`] and dispatches the shell functions
//! (`print`, `load`, `options`, `reportFailure`, ...) bound on the
//! [`ShellGlobal`].

mod context;
mod features;

pub use context::{Binding, Context, ShellFunction, ShellGlobal, UnknownFeature};
pub use features::{EngineFeature, FeatureFlag, FeatureSet};

use std::fmt;
use thiserror::Error;
use tracing::trace;

/// A message tied to a position in a script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    pub message: String,
    pub source_name: Option<String>,
    /// 1-based line, 0 if unknown
    pub line: u32,
    pub line_source: Option<String>,
    /// 1-based column, 0 if unknown
    pub column: u32,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach the script name and line
    pub fn at(mut self, source_name: impl Into<String>, line: u32) -> Self {
        self.source_name = Some(source_name.into());
        self.line = line;
        self
    }

    /// Attach the offending source line and column
    pub fn with_line_source(mut self, line_source: impl Into<String>, column: u32) -> Self {
        self.line_source = Some(line_source.into());
        self.column = column;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref name) = self.source_name {
            write!(f, " ({}#{})", name, self.line)?;
        }
        Ok(())
    }
}

/// Proof that a fatal diagnostic has already been recorded.
///
/// Only [`CollectingReporter::runtime_error`] creates one. An engine that
/// receives it must unwind the current script and return
/// [`ScriptError::Halt`]; the harness then swallows it without reporting
/// the error a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Halt {
    _recorded: (),
}

/// Ways a compile or evaluation call can end early
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The source does not compile
    #[error("SyntaxError: {0}")]
    Compile(Diagnostic),
    /// A language-level error object escaped the script
    #[error("{0}")]
    Eval(Diagnostic),
    /// A thrown non-error value escaped the script
    #[error("uncaught exception: {0}")]
    Exception(Diagnostic),
    /// The reporter already recorded a fatal diagnostic
    #[error("evaluation halted")]
    Halt(Halt),
}

/// One entry in a run's combined failure list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Explicit `reportFailure(msg)` from the test
    Reported(String),
    /// An error or exception that escaped a script
    Uncaught(Diagnostic),
    /// A diagnostic collected by the reporter
    Collected(Diagnostic),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Reported(message) => write!(f, "{}", message),
            Failure::Uncaught(d) | Failure::Collected(d) => write!(f, "{}", d),
        }
    }
}

/// Error reporter installed on every execution environment.
///
/// Warnings are dropped. Errors are collected instead of raised.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    errors: Vec<Diagnostic>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, diagnostic: Diagnostic) {
        trace!("ignoring warning: {}", diagnostic);
    }

    /// Record a compile-time error
    pub fn error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    /// Record a fatal runtime error. The returned [`Halt`] must be raised
    /// by the engine so the running script unwinds.
    pub fn runtime_error(&mut self, diagnostic: Diagnostic) -> Halt {
        self.errors.push(diagnostic);
        Halt { _recorded: () }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

/// The engine under test.
///
/// One engine value is shared by every run, possibly from several threads.
/// Per-run state lives in the `Realm` and in the harness [`Context`].
pub trait ScriptEngine: Send + Sync {
    /// A compiled, not yet evaluated script. Units are shared between runs
    /// through the compiled-unit cache and must not change once compiled.
    type Unit: Send + Sync;

    /// The engine's global scope for one run
    type Realm;

    /// Create a fresh global scope with the standard objects installed
    fn new_realm(&self, cx: &mut Context) -> Self::Realm;

    /// Compile `source` under the context's optimization level
    fn compile(
        &self,
        cx: &mut Context,
        source: &str,
        name: &str,
        start_line: u32,
    ) -> Result<Self::Unit, ScriptError>;

    /// Run a compiled unit in `realm`
    fn exec(&self, realm: &mut Self::Realm, cx: &mut Context, unit: &Self::Unit) -> Result<(), ScriptError>;

    /// Compile and run `source` in `realm`
    fn evaluate(
        &self,
        realm: &mut Self::Realm,
        cx: &mut Context,
        source: &str,
        name: &str,
        start_line: u32,
    ) -> Result<(), ScriptError> {
        let unit = self.compile(cx, source, name, start_line)?;
        self.exec(realm, cx, &unit)
    }
}
