//! Test discovery
//!
//! Two independent strategies build the corpus:
//!
//! * [`parse_manifest`] follows a root `jstests.list` and every manifest it
//!   includes.
//! * [`load_directory`] walks the corpus tree and picks up every non-empty
//!   `.js` file that is not a shared support script, reading the optional
//!   directive on its first line.
//!
//! Both apply the negative-test naming rule through [`TestEntity::new`].
//! Any I/O failure aborts discovery.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::corpus::{join, TestEntity, TEST_EXTENSION};
use crate::error::{Error, Result};
use crate::manifest::{self, Directive};

/// Support scripts that are loaded by tests, never run as tests themselves
pub const EXCLUDED_SCRIPTS: &[&str] = &[
    "browser.js",
    "shell.js",
    "jsref.js",
    "template.js",
    "user.js",
    "js-test-driver-begin.js",
    "js-test-driver-end.js",
];

/// Where a corpus comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Root manifest file, resolved with its includes
    Manifest(PathBuf),
    /// Corpus directory, scanned recursively
    Directory(PathBuf),
}

impl Source {
    /// Run the selected discovery strategy
    pub fn discover(&self) -> Result<Vec<TestEntity>> {
        match self {
            Source::Manifest(path) => parse_manifest(path),
            Source::Directory(dir) => load_directory(dir),
        }
    }
}

/// Recursively read a manifest file and return its script entries
pub fn parse_manifest(manifest: &Path) -> Result<Vec<TestEntity>> {
    let mut tests = Vec::new();
    parse_manifest_file(&mut tests, manifest, "")?;
    Ok(tests)
}

/// Recursively collect test files below `dir`
pub fn load_directory(dir: &Path) -> Result<Vec<TestEntity>> {
    let mut tests = Vec::new();
    load_files(&mut tests, dir, "")?;
    Ok(tests)
}

fn parse_manifest_file(tests: &mut Vec<TestEntity>, manifest: &Path, reldir: &str) -> Result<()> {
    let text = fs::read_to_string(manifest).map_err(|e| Error::io(manifest, e))?;
    for line in text.lines() {
        match Directive::parse(line) {
            Directive::Empty | Directive::UrlPrefix(_) => {}
            Directive::Include(include) => {
                let base = manifest.parent().unwrap_or_else(|| Path::new(""));
                let file = base.join(&include);
                if !file.is_file() {
                    return Err(Error::MissingInclude {
                        manifest: manifest.to_path_buf(),
                        include: file,
                    });
                }
                let subdir = extend(reldir, &include_dir(&include));
                debug!("including {} as '{}'", file.display(), subdir);
                parse_manifest_file(tests, &file, &subdir)?;
            }
            Directive::Script { name, modifiers } => {
                let mut test = TestEntity::new(reldir, name);
                for modifier in &modifiers {
                    modifier.apply(&mut test);
                }
                tests.push(test);
            }
        }
    }
    Ok(())
}

fn load_files(tests: &mut Vec<TestEntity>, dir: &Path, reldir: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!("skipping non UTF-8 entry {}", path.display());
            continue;
        };
        let meta = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        if meta.is_dir() {
            dirs.push((path, name));
        } else if meta.is_file() && meta.len() != 0 {
            if EXCLUDED_SCRIPTS.contains(&name.as_str()) || !name.ends_with(TEST_EXTENSION) {
                continue;
            }
            let mut test = TestEntity::new(reldir, name);
            let first = first_line(&path)?;
            match manifest::directive_modifiers(&first) {
                Some(tokens) => manifest::apply_modifiers(&mut test, &tokens),
                None if manifest::looks_like_directive(&first) => {
                    warn!("invalid test directive in {}: {}", test.path(), first);
                }
                None => {}
            }
            tests.push(test);
        }
    }
    for (path, name) in dirs {
        load_files(tests, &path, &extend(reldir, &name))?;
    }
    Ok(())
}

fn first_line(path: &Path) -> Result<String> {
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut line = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut line)
        .map_err(|e| Error::io(path, e))?;
    // Legacy tests carry Latin-1 bytes
    let line = String::from_utf8_lossy(&line);
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Directory part of an include path, `/`-separated
fn include_dir(include: &str) -> String {
    Path::new(include)
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn extend(reldir: &str, segment: &str) -> String {
    if segment.is_empty() {
        reldir.to_string()
    } else {
        join(reldir, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_dir() {
        assert_eq!(include_dir("ecma_5/jstests.list"), "ecma_5");
        assert_eq!(include_dir("a/b/jstests.list"), "a/b");
        assert_eq!(include_dir("jstests.list"), "");
    }

    #[test]
    fn test_extend() {
        assert_eq!(extend("", "a"), "a");
        assert_eq!(extend("a", "b"), "a/b");
        assert_eq!(extend("a", ""), "a");
        assert_eq!(extend("", ""), "");
    }

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_manifest(&dir.path().join("jstests.list")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_first_line_decodes_latin1_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caf.js");
        fs::write(&path, b"// caf\xe9 \xa9 Netscape\r\nvar x;\n").unwrap();
        assert_eq!(first_line(&path).unwrap(), "// caf\u{fffd} \u{fffd} Netscape");
    }

    #[test]
    fn test_excluded_scripts_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for name in EXCLUDED_SCRIPTS {
            fs::write(dir.path().join(name), "var x;\n").unwrap();
        }
        fs::write(dir.path().join("real.js"), "var y;\n").unwrap();
        let tests = load_directory(dir.path()).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].path(), "real.js");
    }

    #[test]
    fn test_empty_and_foreign_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.js"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
        fs::write(dir.path().join("jstests.list"), "script a.js\n").unwrap();
        assert!(load_directory(dir.path()).unwrap().is_empty());
    }
}
