//! Prelude module for convenient imports
//!
//! ```no_run
//! use mozsuite::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = SuiteConfig::from_env()?;
//!     for test in load_corpus(&config)? {
//!         println!("{}", test);
//!     }
//!     Ok(())
//! }
//! ```

// Corpus
pub use crate::corpus::{OptLevel, TestEntity};
pub use crate::discovery::Source;
pub use crate::merge::{apply_overrides, filter_tests};

// Engine boundary
pub use crate::engine::{
    CollectingReporter, Context, Diagnostic, EngineFeature, Failure, FeatureFlag, FeatureSet, Halt,
    ScriptEngine, ScriptError, ShellFunction,
};

// Execution
pub use crate::cache::{CacheKey, CacheStats, CompiledUnitCache};
pub use crate::executor::{Executor, RunFailure, RunOutcome, SkipReason, Stage};

// Suites
pub use crate::labelled::{AssumptionsAsIgnored, LabelledSuite, Outcome, ParameterSource, RunListener, Scenario};
pub use crate::suite::{load_corpus, mozilla_suite, RunSummary};

// Configuration and errors
pub use crate::config::SuiteConfig;
pub use crate::error::{Error, Result};
