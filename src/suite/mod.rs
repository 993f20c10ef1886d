//! The Mozilla jstests suite
//!
//! Wires discovery, the override manifest and the executor into a
//! [`LabelledSuite`]: one child per test file, one scenario per opt level.

use std::fmt;
use std::sync::Arc;

use crate::config::SuiteConfig;
use crate::corpus::{OptLevel, TestEntity};
use crate::discovery::Source;
use crate::engine::ScriptEngine;
use crate::error::Result;
use crate::executor::{Executor, RunOutcome};
use crate::labelled::{Description, LabelledSuite, Outcome, ParameterSource, RunListener, Scenario};
use crate::merge;

pub const SUITE_NAME: &str = "MozillaSuiteTest";

/// Name of the parameter source listing the corpus
pub const PARAMETER_SOURCE: &str = "mozillaJsTests";

/// Scenario name for runs under `opt`
pub fn scenario_name(opt: OptLevel) -> String {
    format!("runMozillaTest_{}", opt)
}

/// Discover the corpus below the configured root and apply the override
/// manifest
pub fn load_corpus(config: &SuiteConfig) -> Result<Vec<TestEntity>> {
    let root = config.validate()?;
    let tests = Source::Directory(root.to_path_buf()).discover()?;
    merge::filter_tests(tests, &config.manifest)
}

/// Map an executor outcome onto the suite's outcome model; skips become
/// assumption failures
pub fn to_outcome(outcome: RunOutcome) -> Outcome {
    match outcome {
        RunOutcome::Passed => Outcome::Passed,
        RunOutcome::Failed(failure) => Outcome::Failed(failure.to_string()),
        RunOutcome::Skipped(reason) => Outcome::AssumptionFailed(reason.to_string()),
    }
}

/// Build the suite for `executor`, reading the corpus from `config` when
/// the suite runs
pub fn mozilla_suite<E>(executor: Arc<Executor<E>>, config: SuiteConfig) -> LabelledSuite<TestEntity>
where
    E: ScriptEngine + 'static,
{
    let mut suite = LabelledSuite::new(SUITE_NAME)
        .parameters(ParameterSource::new(PARAMETER_SOURCE, move || load_corpus(&config)));
    for opt in OptLevel::ALL {
        let executor = Arc::clone(&executor);
        suite = suite.scenario(Scenario::new(scenario_name(opt), move |test: &TestEntity| {
            to_outcome(executor.run(test, opt))
        }));
    }
    suite
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    Failed,
    Ignored,
}

/// Listener tallying the results of a suite run
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub ignored: usize,
    /// Failing tests with their messages, in run order
    pub failures: Vec<(String, String)>,
    current: Option<Status>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.ignored
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl RunListener for RunSummary {
    fn test_started(&mut self, _test: &Description) {
        self.current = Some(Status::Running);
    }

    fn test_finished(&mut self, _test: &Description) {
        match self.current.take() {
            Some(Status::Running) | None => self.passed += 1,
            Some(Status::Failed) => self.failed += 1,
            Some(Status::Ignored) => self.ignored += 1,
        }
    }

    fn test_failure(&mut self, test: &Description, message: &str) {
        self.current = Some(Status::Failed);
        self.failures.push((test.method.clone(), message.to_string()));
    }

    fn test_assumption_failed(&mut self, _test: &Description, _reason: &str) {
        self.current = Some(Status::Ignored);
    }

    fn test_ignored(&mut self, _test: &Description) {
        self.current = Some(Status::Ignored);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tests: {} passed, {} failed, {} ignored, {} total",
            self.passed,
            self.failed,
            self.ignored,
            self.total()
        )?;
        for (name, message) in &self.failures {
            writeln!(f, "  FAILED {}: {}", name, message)?;
        }
        Ok(())
    }
}
