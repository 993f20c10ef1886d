//! Per-run execution environment handed to the engine

use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::{CollectingReporter, Diagnostic, EngineFeature, Failure, FeatureFlag, FeatureSet};
use crate::corpus::OptLevel;

/// Language versions an engine accepts through `version(n)`
const VALID_VERSIONS: &[i32] = &[0, 100, 110, 120, 130, 140, 150, 160, 170, 180, 200];

/// `options(name)` was called with a name no feature answers to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Feature '{0}' is not supported!")]
pub struct UnknownFeature(pub String);

/// Functions the harness provides to test scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellFunction {
    Print,
    Load,
    Gc,
    Options,
    Version,
    ReportFailure,
}

impl ShellFunction {
    /// Installed before bootstrap scripts run
    pub const SHELL: [ShellFunction; 5] = [
        ShellFunction::Print,
        ShellFunction::Load,
        ShellFunction::Gc,
        ShellFunction::Options,
        ShellFunction::Version,
    ];

    /// Installed after bootstrap scripts, overriding their definitions
    pub const SUITE: [ShellFunction; 1] = [ShellFunction::ReportFailure];

    pub fn name(self) -> &'static str {
        match self {
            ShellFunction::Print => "print",
            ShellFunction::Load => "load",
            ShellFunction::Gc => "gc",
            ShellFunction::Options => "options",
            ShellFunction::Version => "version",
            ShellFunction::ReportFailure => "reportFailure",
        }
    }
}

/// What a global function name currently refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The harness implementation
    Native(ShellFunction),
    /// A function defined by script code
    Script,
}

/// Global function bindings of one run
#[derive(Debug, Clone, Default)]
pub struct ShellGlobal {
    bindings: HashMap<String, Binding>,
}

impl ShellGlobal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind each function's name to the harness implementation, replacing
    /// whatever a script defined under that name
    pub fn define_functions(&mut self, functions: &[ShellFunction]) {
        for f in functions {
            self.bindings.insert(f.name().to_string(), Binding::Native(*f));
        }
    }

    /// Record that script code defined a global function `name`
    pub fn define_script_function(&mut self, name: &str) {
        self.bindings.insert(name.to_string(), Binding::Script);
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).copied()
    }
}

/// Harness side of one execution environment.
///
/// Owns everything a run accumulates: the reporter, the explicit failure
/// list and the feature toggles. Nothing in here is shared between runs.
#[derive(Debug)]
pub struct Context {
    opt_level: OptLevel,
    features: FeatureSet,
    language_version: i32,
    corpus_root: PathBuf,
    locale: String,
    timezone: String,
    reporter: CollectingReporter,
    global: ShellGlobal,
    failures: Vec<Failure>,
}

impl Context {
    pub fn new(opt_level: OptLevel, corpus_root: impl Into<PathBuf>) -> Self {
        Self {
            opt_level,
            features: FeatureSet::initial(),
            language_version: 0,
            corpus_root: corpus_root.into(),
            locale: String::new(),
            timezone: String::new(),
            reporter: CollectingReporter::new(),
            global: ShellGlobal::new(),
            failures: Vec::new(),
        }
    }

    /// Pin locale and time zone for deterministic formatting
    pub fn with_locale(mut self, locale: impl Into<String>, timezone: impl Into<String>) -> Self {
        self.locale = locale.into();
        self.timezone = timezone.into();
        self
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    /// Numeric optimization level for the engine
    pub fn optimization_level(&self) -> i32 {
        self.opt_level.level()
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Answer an engine feature query, `None` meaning "engine default"
    pub fn has_feature(&self, feature: EngineFeature) -> Option<bool> {
        self.features.query(feature)
    }

    pub fn language_version(&self) -> i32 {
        self.language_version
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn corpus_root(&self) -> &Path {
        &self.corpus_root
    }

    pub fn reporter(&self) -> &CollectingReporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut CollectingReporter {
        &mut self.reporter
    }

    pub fn global(&self) -> &ShellGlobal {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut ShellGlobal {
        &mut self.global
    }

    /// Add a failure to this run's accumulator
    pub fn record(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    /// Failures recorded so far, not counting reporter diagnostics
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Every failure of the run: recorded ones first, then the reporter's
    /// collected diagnostics
    pub fn into_failures(self) -> Vec<Failure> {
        let mut all = self.failures;
        all.extend(self.reporter.errors().iter().cloned().map(Failure::Collected));
        all
    }

    /// `reportFailure(msg)`
    pub fn report_failure(&mut self, message: impl Into<String>) {
        self.failures.push(Failure::Reported(message.into()));
    }

    /// `print(args...)`
    pub fn print(&self, args: &[&str]) {
        info!(target: "mozsuite::print", "{}", args.join(" "));
    }

    /// `gc()`; memory management belongs to the engine, nothing to do here
    pub fn gc(&self) {}

    /// `options([name])`: returns the enabled feature names from before the
    /// call and toggles `name` if given
    pub fn options(&mut self, name: Option<&str>) -> Result<String, UnknownFeature> {
        let previous = self.features.names();
        if let Some(name) = name {
            let flag = FeatureFlag::for_name(name).ok_or_else(|| UnknownFeature(name.to_string()))?;
            self.features = self.features.toggled(flag);
        }
        Ok(previous)
    }

    /// `version([n])`: returns the previous language version
    pub fn version(&mut self, version: Option<i32>) -> String {
        let previous = self.language_version;
        match version {
            Some(v) if VALID_VERSIONS.contains(&v) => self.language_version = v,
            Some(181) | Some(185) => self.language_version = 180,
            _ => {}
        }
        previous.to_string()
    }

    /// `load(path)`: file to evaluate, relative to the corpus root.
    /// Missing files are logged and yield `None`.
    pub fn resolve_load(&self, path: &str) -> Option<PathBuf> {
        let file = self.corpus_root.join(path);
        if file.is_file() {
            Some(file)
        } else {
            warn!("file '{}' not found!", path);
            None
        }
    }

    /// Record a diagnostic from a caught evaluation error
    pub(crate) fn record_uncaught(&mut self, diagnostic: Diagnostic) {
        self.failures.push(Failure::Uncaught(diagnostic));
    }
}
