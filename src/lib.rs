//! mozsuite: a conformance harness for the Mozilla jstests corpus
//!
//! The harness discovers tests, applies the expectations recorded in
//! manifests and drives a JavaScript engine through each test under every
//! optimization level. It never interprets JavaScript itself; engines plug
//! in through [`ScriptEngine`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mozsuite::prelude::*;
//!
//! fn run<E: ScriptEngine + 'static>(engine: E) -> Result<()> {
//!     let config = SuiteConfig::from_env()?;
//!     let executor = Arc::new(Executor::from_config(engine, &config)?);
//!     let mut summary = RunSummary::new();
//!     mozilla_suite(executor, config).run(&mut summary)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! Corpus loading flows: [`discovery`] → [`manifest`] → [`merge`] → [`suite`],
//! and each run: [`executor`] → [`engine`] (+ [`cache`]).
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Corpus** | [`corpus`], [`manifest`], [`discovery`], [`merge`] |
//! | **Execution** | [`engine`], [`executor`], [`cache`] |
//! | **Suite** | [`labelled`], [`suite`], [`config`], [`error`](Error) |

pub mod cache;
pub mod config;
pub mod corpus;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod executor;
pub mod labelled;
pub mod manifest;
pub mod merge;
pub mod prelude;
pub mod suite;

pub use cache::{CacheKey, CacheStats, CompiledUnitCache};
pub use config::SuiteConfig;
pub use corpus::{OptLevel, TestEntity};
pub use engine::{Context, Diagnostic, ScriptEngine, ScriptError};
pub use error::{Error, Result};
pub use executor::{Executor, RunOutcome};

/// Version of mozsuite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
