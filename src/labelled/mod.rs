//! Labelled parameterized suites
//!
//! A suite is a cross product of parameter values and scenarios. Each
//! parameter value becomes a child named by its label, and each scenario in
//! it becomes one test named `scenario[params]`.
//!
//! The pieces are independent:
//!
//! - [`ParameterSource`] produces the ordered parameter values
//! - [`Labeller`] turns a value into a display label
//! - [`AssumptionsAsIgnored`] sits in front of a [`RunListener`] and reports
//!   assumption failures as ignored tests
//!
//! [`LabelledSuite::run`] composes them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Parameters and labels
// ---------------------------------------------------------------------------

type Producer<P> = Box<dyn Fn() -> Result<Vec<P>> + Send + Sync>;

/// A named function producing a suite's parameter values
pub struct ParameterSource<P> {
    name: String,
    produce: Producer<P>,
}

impl<P> ParameterSource<P> {
    pub fn new(name: impl Into<String>, produce: impl Fn() -> Result<Vec<P>> + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            produce: Box::new(produce),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the parameter values
    pub fn retrieve(&self) -> Result<Vec<P>> {
        (self.produce)()
    }
}

impl<P> fmt::Debug for ParameterSource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSource").field("name", &self.name).finish()
    }
}

/// Naming strategy for parameter values
pub trait Labeller<P>: Send + Sync {
    /// Display name of the child built from `params`
    fn label(&self, params: &P) -> String;

    /// Textual form of `params` used in test names
    fn describe(&self, params: &P) -> String {
        self.label(params)
    }
}

/// Labels a value by its `Display` form
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayLabeller;

impl<P: fmt::Display> Labeller<P> for DisplayLabeller {
    fn label(&self, params: &P) -> String {
        params.to_string()
    }
}

impl<P, F> Labeller<P> for F
where
    F: Fn(&P) -> String + Send + Sync,
{
    fn label(&self, params: &P) -> String {
        self(params)
    }
}

// ---------------------------------------------------------------------------
// Outcomes and listeners
// ---------------------------------------------------------------------------

/// Raw result of one scenario body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    /// A precondition did not hold; the test did not really run
    AssumptionFailed(String),
}

/// Identifies one test within a suite
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Description {
    /// Label of the child the test belongs to
    pub child: String,
    /// `scenario[params]`
    pub method: String,
}

impl Description {
    pub fn new(child: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, self.child)
    }
}

/// Receives test lifecycle events
pub trait RunListener {
    fn child_started(&mut self, _label: &str) {}

    fn test_started(&mut self, _test: &Description) {}

    fn test_finished(&mut self, _test: &Description) {}

    fn test_failure(&mut self, test: &Description, message: &str);

    fn test_assumption_failed(&mut self, test: &Description, reason: &str);

    fn test_ignored(&mut self, test: &Description);
}

impl<L: RunListener + ?Sized> RunListener for &mut L {
    fn child_started(&mut self, label: &str) {
        (**self).child_started(label)
    }

    fn test_started(&mut self, test: &Description) {
        (**self).test_started(test)
    }

    fn test_finished(&mut self, test: &Description) {
        (**self).test_finished(test)
    }

    fn test_failure(&mut self, test: &Description, message: &str) {
        (**self).test_failure(test, message)
    }

    fn test_assumption_failed(&mut self, test: &Description, reason: &str) {
        (**self).test_assumption_failed(test, reason)
    }

    fn test_ignored(&mut self, test: &Description) {
        (**self).test_ignored(test)
    }
}

/// Forwards every event, turning assumption failures into ignored tests
#[derive(Debug)]
pub struct AssumptionsAsIgnored<L> {
    inner: L,
}

impl<L: RunListener> AssumptionsAsIgnored<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: RunListener> RunListener for AssumptionsAsIgnored<L> {
    fn child_started(&mut self, label: &str) {
        self.inner.child_started(label)
    }

    fn test_started(&mut self, test: &Description) {
        self.inner.test_started(test)
    }

    fn test_finished(&mut self, test: &Description) {
        self.inner.test_finished(test)
    }

    fn test_failure(&mut self, test: &Description, message: &str) {
        self.inner.test_failure(test, message)
    }

    fn test_assumption_failed(&mut self, test: &Description, _reason: &str) {
        self.inner.test_ignored(test)
    }

    fn test_ignored(&mut self, test: &Description) {
        self.inner.test_ignored(test)
    }
}

// ---------------------------------------------------------------------------
// Suite
// ---------------------------------------------------------------------------

type Body<P> = Box<dyn Fn(&P) -> Outcome + Send + Sync>;

/// A named test body run once per parameter value
pub struct Scenario<P> {
    name: String,
    body: Body<P>,
}

impl<P> Scenario<P> {
    pub fn new(name: impl Into<String>, body: impl Fn(&P) -> Outcome + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the body; a panic counts as a failure
    pub fn run(&self, params: &P) -> Outcome {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(params))) {
            Ok(outcome) => outcome,
            Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// One parameter value with its label
#[derive(Debug, Clone)]
pub struct Child<P> {
    pub label: String,
    pub params: P,
}

/// Parameterized suite with labelled children
pub struct LabelledSuite<P> {
    name: String,
    sources: Vec<ParameterSource<P>>,
    labeller: Box<dyn Labeller<P>>,
    scenarios: Vec<Scenario<P>>,
}

impl<P: fmt::Display + 'static> LabelledSuite<P> {
    /// Create a suite labelling values by their `Display` form
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_labeller(name, DisplayLabeller)
    }
}

impl<P> LabelledSuite<P> {
    pub fn with_labeller(name: impl Into<String>, labeller: impl Labeller<P> + 'static) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            labeller: Box::new(labeller),
            scenarios: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a parameter source. Exactly one must be registered by the
    /// time the suite runs.
    pub fn parameters(mut self, source: ParameterSource<P>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn scenario(mut self, scenario: Scenario<P>) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn scenarios(&self) -> &[Scenario<P>] {
        &self.scenarios
    }

    /// Check the suite's shape, reporting every problem at once
    pub fn validate(&self) -> Result<&ParameterSource<P>> {
        let mut errors = Vec::new();
        if self.sources.len() != 1 {
            errors.push(format!(
                "{}: found {} parameter sources, but expected 1",
                self.name,
                self.sources.len()
            ));
        }
        if self.scenarios.is_empty() {
            errors.push(format!("{}: no scenarios", self.name));
        }
        match (errors.is_empty(), self.sources.first()) {
            (true, Some(source)) => Ok(source),
            _ => Err(Error::Setup(errors)),
        }
    }

    /// Produce the labelled children
    pub fn children(&self) -> Result<Vec<Child<P>>> {
        let source = self.validate()?;
        let params = source.retrieve().map_err(|err| {
            Error::Setup(vec![format!("{}: parameter source '{}' failed: {}", self.name, source.name(), err)])
        })?;
        Ok(params
            .into_iter()
            .map(|params| Child {
                label: self.labeller.label(&params),
                params,
            })
            .collect())
    }

    /// Name of `scenario` when run with `params`
    pub fn test_name(&self, scenario: &Scenario<P>, params: &P) -> String {
        format!("{}[{}]", scenario.name, self.labeller.describe(params))
    }

    /// Run every scenario for every child.
    ///
    /// Setup errors are returned before any test runs. Assumption failures
    /// reach `listener` as ignored tests.
    pub fn run(&self, listener: impl RunListener) -> Result<()> {
        let children = self.children()?;
        let mut listener = AssumptionsAsIgnored::new(listener);
        for child in &children {
            listener.child_started(&child.label);
            for scenario in &self.scenarios {
                let test = Description::new(child.label.clone(), self.test_name(scenario, &child.params));
                listener.test_started(&test);
                match scenario.run(&child.params) {
                    Outcome::Passed => {}
                    Outcome::Failed(message) => listener.test_failure(&test, &message),
                    Outcome::AssumptionFailed(reason) => listener.test_assumption_failed(&test, &reason),
                }
                listener.test_finished(&test);
            }
        }
        Ok(())
    }
}
