//! Reconciles the discovered corpus with the harness' own override manifest
//!
//! The override manifest can only make a test stricter (disable it, expect
//! it to fail, mark it slow); the one exception is the set of optimization
//! levels, which the manifest replaces outright.

use rustc_hash::FxHashMap as HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::corpus::TestEntity;
use crate::discovery;
use crate::error::Result;

/// Apply `overrides` to `tests` in place, matching entries by path.
///
/// Override entries without a discovered counterpart are stale: they are
/// logged and dropped. Returns the number of stale entries.
pub fn apply_overrides(tests: &mut [TestEntity], overrides: &[TestEntity]) -> usize {
    let index: HashMap<String, usize> = tests
        .iter()
        .enumerate()
        .map(|(i, t)| (t.path(), i))
        .collect();

    let mut stale = 0;
    for o in overrides {
        let path = o.path();
        let Some(&i) = index.get(&path) else {
            warn!("detected stale entry '{}'", path);
            stale += 1;
            continue;
        };
        let t = &mut tests[i];
        t.enabled &= o.enabled;
        t.expect_success &= o.expect_success;
        t.slow |= o.slow;
        t.opts = o.opts.clone();
    }
    stale
}

/// Customize `tests` with the override manifest at `manifest`, if it exists
pub fn filter_tests(mut tests: Vec<TestEntity>, manifest: &Path) -> Result<Vec<TestEntity>> {
    if !manifest.is_file() {
        debug!("no override manifest at {}", manifest.display());
        return Ok(tests);
    }
    let overrides = discovery::parse_manifest(manifest)?;
    let stale = apply_overrides(&mut tests, &overrides);
    debug!(
        "applied {} overrides from {} ({} stale)",
        overrides.len() - stale,
        manifest.display(),
        stale
    );
    Ok(tests)
}
