//! Execution controller
//!
//! Runs one [`TestEntity`] under one [`OptLevel`]:
//!
//! ```text
//! Gating -> Preparing -> LoadingPrerequisites -> Executing -> Classifying
//! ```
//!
//! Every run owns a fresh [`Context`] and engine realm. The only state
//! shared between runs is the compiled-unit cache holding the bootstrap
//! scripts (`shell.js`) found along the test's directory path.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span};

use crate::cache::{CacheKey, CompiledUnitCache};
use crate::config::SuiteConfig;
use crate::corpus::{OptLevel, TestEntity};
use crate::engine::{Context, Diagnostic, Failure, ScriptEngine, ScriptError, ShellFunction};
use crate::error::{Error, Result};

/// Bootstrap script looked up at every directory level
pub const BOOTSTRAP_SCRIPT: &str = "shell.js";

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a run did not execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The test's opt levels exclude this one
    OptLevelExcluded(OptLevel),
    /// The test is disabled
    Disabled,
    /// The test is slow and slow tests are off
    Slow,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OptLevelExcluded(opt) => write!(f, "not run under {}", opt),
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::Slow => write!(f, "slow test, slow tests are off"),
        }
    }
}

/// Why a run failed
#[derive(Debug)]
pub enum RunFailure {
    /// The test was expected to succeed; every collected failure
    Failures(Vec<Failure>),
    /// The test was expected to fail but nothing was reported
    ExpectedFailureMissing,
    /// The run could not get as far as judging the test
    Aborted(Error),
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailure::Failures(failures) => {
                write!(f, "{} failure(s)", failures.len())?;
                for (i, failure) in failures.iter().enumerate() {
                    write!(f, "\n  {}) {}", i + 1, failure)?;
                }
                Ok(())
            }
            RunFailure::ExpectedFailureMissing => write!(f, "expected failure did not occur"),
            RunFailure::Aborted(err) => write!(f, "{}", err),
        }
    }
}

/// Result of one run
#[derive(Debug)]
pub enum RunOutcome {
    Passed,
    Failed(RunFailure),
    Skipped(SkipReason),
}

impl RunOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "PASSED"),
            RunOutcome::Failed(failure) => write!(f, "FAILED: {}", failure),
            RunOutcome::Skipped(reason) => write!(f, "SKIPPED: {}", reason),
        }
    }
}

/// Result of one pipeline stage
#[derive(Debug)]
pub enum Stage {
    /// The script ran to completion
    Continue,
    /// The script stopped early; the cause is already in the context
    Halted,
    /// The run cannot continue
    Fatal(Error),
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs tests against one engine.
///
/// Shareable between threads; each [`Executor::run`] call is independent.
pub struct Executor<E: ScriptEngine> {
    engine: E,
    tests_root: PathBuf,
    run_slow: bool,
    locale: String,
    timezone: String,
    cache: CompiledUnitCache<E::Unit>,
}

impl<E: ScriptEngine> Executor<E> {
    /// Create an executor for the corpus at `tests_root`
    pub fn new(engine: E, tests_root: impl Into<PathBuf>) -> Self {
        let defaults = SuiteConfig::default();
        Self {
            engine,
            tests_root: tests_root.into(),
            run_slow: defaults.run_slow,
            locale: defaults.locale,
            timezone: defaults.timezone,
            cache: CompiledUnitCache::new(),
        }
    }

    /// Create an executor from a validated configuration
    pub fn from_config(engine: E, config: &SuiteConfig) -> Result<Self> {
        let root = config.validate()?;
        Ok(Self::new(engine, root)
            .run_slow(config.run_slow)
            .locale(config.locale.clone(), config.timezone.clone()))
    }

    /// Whether tests marked `slow` run
    pub fn run_slow(mut self, run_slow: bool) -> Self {
        self.run_slow = run_slow;
        self
    }

    /// Locale and time zone every run is pinned to
    pub fn locale(mut self, locale: impl Into<String>, timezone: impl Into<String>) -> Self {
        self.locale = locale.into();
        self.timezone = timezone.into();
        self
    }

    /// Use `cache` for bootstrap scripts
    pub fn with_cache(mut self, cache: CompiledUnitCache<E::Unit>) -> Self {
        self.cache = cache;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn tests_root(&self) -> &Path {
        &self.tests_root
    }

    pub fn cache(&self) -> &CompiledUnitCache<E::Unit> {
        &self.cache
    }

    /// Check whether `test` may run under `opt`
    pub fn gate(&self, test: &TestEntity, opt: OptLevel) -> Option<SkipReason> {
        gate(test, opt, self.run_slow)
    }

    /// Bootstrap scripts for `test`, root first.
    ///
    /// Checks the corpus root and every directory on the test's path.
    pub fn bootstrap_scripts(&self, test: &TestEntity) -> Vec<PathBuf> {
        let mut dir = self.tests_root.clone();
        let mut scripts = Vec::new();
        for component in test.path().split('/') {
            let shell = dir.join(BOOTSTRAP_SCRIPT);
            if shell.is_file() {
                scripts.push(shell);
            }
            dir.push(component);
        }
        scripts
    }

    /// Run `test` under `opt`
    pub fn run(&self, test: &TestEntity, opt: OptLevel) -> RunOutcome {
        let _span = debug_span!("run", test = %test, opt = %opt).entered();

        if let Some(reason) = self.gate(test, opt) {
            debug!("skipped: {}", reason);
            return RunOutcome::Skipped(reason);
        }

        debug!("preparing");
        let mut cx = Context::new(opt, self.tests_root.clone())
            .with_locale(self.locale.clone(), self.timezone.clone());
        let mut realm = self.engine.new_realm(&mut cx);
        cx.global_mut().define_functions(&ShellFunction::SHELL);

        debug!("loading prerequisites");
        for script in self.bootstrap_scripts(test) {
            if let Err(err) = self.run_prerequisite(&mut realm, &mut cx, &script) {
                debug!("prerequisite failed: {}", err);
                return RunOutcome::Failed(RunFailure::Aborted(err));
            }
        }
        cx.global_mut().define_functions(&ShellFunction::SUITE);

        debug!("executing");
        let file = self.tests_root.join(test.path());
        if let Stage::Fatal(err) = eval_or_fail(&self.engine, &mut realm, &mut cx, &file) {
            return RunOutcome::Failed(RunFailure::Aborted(err));
        }

        debug!("classifying");
        let outcome = verdict(test, cx.into_failures());
        debug!("{}", outcome);
        outcome
    }

    /// Execute one bootstrap script, compiling it through the cache.
    /// Any compile or run failure is fatal to the run.
    fn run_prerequisite(&self, realm: &mut E::Realm, cx: &mut Context, script: &Path) -> Result<()> {
        let path = std::path::absolute(script).unwrap_or_else(|_| script.to_path_buf());
        let key = CacheKey::new(path, cx.opt_level());
        let unit = self.cache.get_or_compile(key, || {
            let source = read_script(script)?;
            match self.engine.compile(cx, &source, &script_name(script), 1) {
                Ok(unit) => Ok(unit),
                Err(err) => Err(prerequisite_error(script, err, cx)),
            }
        })?;
        match self.engine.exec(realm, cx, &unit) {
            Ok(()) => Ok(()),
            Err(err) => Err(prerequisite_error(script, err, cx)),
        }
    }
}

/// Read a script as text; bytes that are not UTF-8 are replaced
fn read_script(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::script_read(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn script_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn prerequisite_error(path: &Path, err: ScriptError, cx: &Context) -> Error {
    let diagnostic = match err {
        ScriptError::Compile(d) | ScriptError::Eval(d) | ScriptError::Exception(d) => d,
        ScriptError::Halt(_) => cx
            .reporter()
            .errors()
            .last()
            .cloned()
            .unwrap_or_else(|| Diagnostic::new("evaluation halted")),
    };
    Error::Prerequisite {
        path: path.to_path_buf(),
        diagnostic,
    }
}

// ---------------------------------------------------------------------------
// Script evaluation
// ---------------------------------------------------------------------------

/// Compile and run `file`, recording anything that escapes it in `cx`.
///
/// Errors and exceptions become [`Failure::Uncaught`]; a halt is dropped
/// since the reporter already holds its diagnostic. Only an unreadable
/// file is fatal.
pub fn eval_or_fail<E: ScriptEngine>(
    engine: &E,
    realm: &mut E::Realm,
    cx: &mut Context,
    file: &Path,
) -> Stage {
    let source = match read_script(file) {
        Ok(source) => source,
        Err(err) => return Stage::Fatal(err),
    };
    match engine.evaluate(realm, cx, &source, &script_name(file), 1) {
        Ok(()) => Stage::Continue,
        Err(ScriptError::Halt(_)) => Stage::Halted,
        Err(ScriptError::Compile(d)) | Err(ScriptError::Eval(d)) | Err(ScriptError::Exception(d)) => {
            cx.record_uncaught(d);
            Stage::Halted
        }
    }
}

/// The `load(path)` shell function, for engines to call.
///
/// A missing file is a logged no-op. Failures inside the loaded script are
/// recorded like the test's own; an unreadable file halts the caller.
pub fn load<E: ScriptEngine>(
    engine: &E,
    realm: &mut E::Realm,
    cx: &mut Context,
    path: &str,
) -> std::result::Result<(), ScriptError> {
    let Some(file) = cx.resolve_load(path) else {
        return Ok(());
    };
    match eval_or_fail(engine, realm, cx, &file) {
        Stage::Continue | Stage::Halted => Ok(()),
        Stage::Fatal(err) => {
            let halt = cx.reporter_mut().runtime_error(Diagnostic::new(err.to_string()).at(path, 0));
            Err(ScriptError::Halt(halt))
        }
    }
}

/// Check whether `test` may run under `opt`, `None` meaning it runs
pub fn gate(test: &TestEntity, opt: OptLevel, run_slow: bool) -> Option<SkipReason> {
    if !test.allows(opt) {
        Some(SkipReason::OptLevelExcluded(opt))
    } else if !test.enabled {
        Some(SkipReason::Disabled)
    } else if test.slow && !run_slow {
        Some(SkipReason::Slow)
    } else {
        None
    }
}

/// Judge a finished run from its failure list
pub fn verdict(test: &TestEntity, failures: Vec<Failure>) -> RunOutcome {
    if test.random {
        RunOutcome::Passed
    } else if test.expect_success {
        if failures.is_empty() {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed(RunFailure::Failures(failures))
        }
    } else if failures.is_empty() {
        RunOutcome::Failed(RunFailure::ExpectedFailureMissing)
    } else {
        RunOutcome::Passed
    }
}
