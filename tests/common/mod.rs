//! Shared test helpers for integration tests
//!
//! [`FakeEngine`] runs a tiny line-oriented language instead of JavaScript.
//! Each line of a script is one command:
//!
//! | Line                   | Effect                                         |
//! |------------------------|------------------------------------------------|
//! | `syntax MSG`           | the script does not compile                    |
//! | `throw MSG`            | an uncaught exception                          |
//! | `eval-error MSG`       | an uncaught language error                     |
//! | `fatal MSG`            | fatal runtime error through the reporter       |
//! | `error MSG`            | non-fatal error through the reporter           |
//! | `warn MSG`             | warning through the reporter                   |
//! | `fail MSG`             | calls `reportFailure(MSG)`                     |
//! | `define reportFailure` | script-level definition of `reportFailure`     |
//! | `options NAME`         | calls `options(NAME)`                          |
//! | `load PATH`            | calls `load(PATH)`                             |
//! | `print ARGS`           | calls `print(ARGS)`                            |
//!
//! Anything else is a no-op.
#![allow(dead_code)]

use mozsuite::engine::{Binding, Context, Diagnostic, ScriptEngine, ScriptError};
use mozsuite::executor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A compiled fake script
#[derive(Debug, Clone)]
pub struct FakeUnit {
    name: String,
    lines: Vec<String>,
}

/// Engine for the fake language; clones share their logs
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    executed: Arc<Mutex<Vec<String>>>,
    compiled: Arc<Mutex<Vec<String>>>,
    compiles: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts executed so far, relative to the corpus root
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Scripts compiled so far, relative to the corpus root
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().unwrap().clone()
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.executed.lock().unwrap().clear();
        self.compiled.lock().unwrap().clear();
    }
}

fn relative(cx: &Context, name: &str) -> String {
    let path = Path::new(name);
    let rel = path.strip_prefix(cx.corpus_root()).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    }
}

impl ScriptEngine for FakeEngine {
    type Unit = FakeUnit;
    type Realm = ();

    fn new_realm(&self, _cx: &mut Context) -> Self::Realm {}

    fn compile(&self, cx: &mut Context, source: &str, name: &str, start_line: u32) -> Result<FakeUnit, ScriptError> {
        let name = relative(cx, name);
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.compiled.lock().unwrap().push(name.clone());
        for (i, line) in source.lines().enumerate() {
            if let ("syntax", msg) = command(line) {
                let diagnostic = Diagnostic::new(msg)
                    .at(name.clone(), start_line + i as u32)
                    .with_line_source(line, 1);
                return Err(ScriptError::Compile(diagnostic));
            }
        }
        Ok(FakeUnit {
            name,
            lines: source.lines().map(str::to_string).collect(),
        })
    }

    fn exec(&self, realm: &mut Self::Realm, cx: &mut Context, unit: &FakeUnit) -> Result<(), ScriptError> {
        self.executed.lock().unwrap().push(unit.name.clone());
        for (i, line) in unit.lines.iter().enumerate() {
            let at = |msg: &str| Diagnostic::new(msg).at(unit.name.clone(), i as u32 + 1);
            match command(line) {
                ("throw", msg) => return Err(ScriptError::Exception(at(msg))),
                ("eval-error", msg) => return Err(ScriptError::Eval(at(msg))),
                ("fatal", msg) => {
                    let halt = cx.reporter_mut().runtime_error(at(msg));
                    return Err(ScriptError::Halt(halt));
                }
                ("error", msg) => cx.reporter_mut().error(at(msg)),
                ("warn", msg) => cx.reporter_mut().warning(at(msg)),
                ("fail", msg) => match cx.global().binding("reportFailure") {
                    Some(Binding::Native(_)) => cx.report_failure(msg),
                    Some(Binding::Script) => {}
                    None => return Err(ScriptError::Eval(at("reportFailure is not defined"))),
                },
                ("define", name) => cx.global_mut().define_script_function(name),
                ("options", name) => {
                    cx.options(Some(name))
                        .map_err(|e| ScriptError::Exception(at(&e.to_string())))?;
                }
                ("load", path) => executor::load(self, realm, cx, path)?,
                ("print", args) => cx.print(&[args]),
                _ => {}
            }
        }
        Ok(())
    }
}

/// A corpus in a temporary directory
pub struct Corpus {
    dir: TempDir,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write `content` to `rel`, creating parent directories
    pub fn file(&self, rel: &str, content: impl AsRef<[u8]>) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }
}
