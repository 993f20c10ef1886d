//! Test entities and the optimization levels they run under
//!
//! A [`TestEntity`] is created once per test file at corpus-load time, then
//! adjusted by the override manifest (see [`crate::merge`]). After that it is
//! only ever read.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// File name suffix marking a negative test (expected to produce an error)
pub const NEGATIVE_SUFFIX: &str = "-n.js";

/// Extension of test files picked up by filesystem discovery
pub const TEST_EXTENSION: &str = ".js";

/// Engine optimization level a test is executed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OptLevel {
    Interpreted,
    Compiled,
    OptCompiled,
}

impl OptLevel {
    /// Every level, in execution order
    pub const ALL: [OptLevel; 3] = [OptLevel::Interpreted, OptLevel::Compiled, OptLevel::OptCompiled];

    /// Numeric level handed to the engine
    pub fn level(self) -> i32 {
        match self {
            OptLevel::Interpreted => -1,
            OptLevel::Compiled => 0,
            OptLevel::OptCompiled => 9,
        }
    }

    /// Look up the level with the given numeric value
    pub fn for_level(level: i32) -> Option<OptLevel> {
        Self::ALL.into_iter().find(|o| o.level() == level)
    }

    /// The full set of levels
    pub fn all() -> BTreeSet<OptLevel> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptLevel::Interpreted => write!(f, "Interpreted"),
            OptLevel::Compiled => write!(f, "Compiled"),
            OptLevel::OptCompiled => write!(f, "OptCompiled"),
        }
    }
}

/// One conformance test and its execution policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestEntity {
    /// Disabled tests are reported as ignored
    pub enabled: bool,
    /// False for negative tests and `fails` entries
    pub expect_success: bool,
    /// Outcome of random tests is never judged
    pub random: bool,
    /// Slow tests only run when explicitly requested
    pub slow: bool,
    /// Directory relative to the corpus root, `/`-separated, empty at the root
    pub dir: String,
    /// File name of the script
    pub script: String,
    /// Optimization levels the test may run under
    pub opts: BTreeSet<OptLevel>,
}

impl TestEntity {
    /// Create an entity with default policy for `dir/script`.
    ///
    /// The negative-test suffix is applied here, so every creation path
    /// honours it.
    pub fn new(dir: impl Into<String>, script: impl Into<String>) -> Self {
        let script = script.into();
        let expect_success = !script.ends_with(NEGATIVE_SUFFIX);
        Self {
            enabled: true,
            expect_success,
            random: false,
            slow: false,
            dir: dir.into(),
            script,
            opts: OptLevel::all(),
        }
    }

    /// Path relative to the corpus root; unique within one corpus load
    pub fn path(&self) -> String {
        join(&self.dir, &self.script)
    }

    /// Whether the test is allowed to run under `opt`
    pub fn allows(&self, opt: OptLevel) -> bool {
        self.opts.contains(&opt)
    }
}

impl fmt::Display for TestEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Returns `a/b`, or just `b` when `a` is empty
pub fn join(a: &str, b: &str) -> String {
    if a.is_empty() {
        b.to_string()
    } else {
        format!("{}/{}", a, b)
    }
}
