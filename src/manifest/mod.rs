//! Grammar for `jstests.list` manifest lines and in-file test directives
//!
//! Manifest lines follow the reftest list format:
//!
//! ```text
//! include ecma_5/jstests.list
//! url-prefix ../../jsreftest.html?test=ecma_5/
//! skip-if(xulRuntime.OS=="WINNT") script regress-1.js   # comment
//! script regress-2.js fails skip-opt(0,9)
//! ```
//!
//! Test files may carry a single directive on their first line:
//!
//! ```text
//! // |reftest| random skip-opt(-1) -- flaky under the interpreter
//! ```
//!
//! Matching is done before tokenizing so malformed lines can be reported,
//! but a malformed line never aborts a corpus load.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::corpus::{OptLevel, TestEntity};

/// Comment token of manifest files
pub const MANIFEST_COMMENT: &str = "#";

/// Comment token of in-file directives
pub const DIRECTIVE_COMMENT: &str = "--";

const MODIFIER: &str = concat!(
    r"(?:fails|skip|random|slow|silentfail",
    r"|(?:fails-if|asserts-if|skip-if|random-if|require-or)\(\S+\)",
    r"|skip-opt\(-?[0-9](?:,-?[0-9])*\))",
);

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let include_or_url = r"(?:include\s+\S+)|(?:url-prefix\s+\S+)";
    let script = format!(
        r"(?:{m}\s+)*script\s+\S+(?:\s+(?:{m}\s+)*{m})?",
        m = MODIFIER
    );
    let pattern = format!(
        r"^\s*(?:{}|{})?\s*(?:#.*)?$",
        include_or_url, script
    );
    Regex::new(&pattern).expect("manifest line grammar is a valid regex")
});

static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"^//\s*(?P<tag>\|.*?\|)\s*(?:(?:{m}\s+)*{m}?)?\s*(?:--.*)?$",
        m = MODIFIER
    );
    Regex::new(&pattern).expect("test directive grammar is a valid regex")
});

static DIRECTIVE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*\|.*?\|").expect("directive prefix is a valid regex"));

static OPT_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]").expect("opt level pattern is a valid regex"));

/// Splits `line` at whitespace after cutting everything from the first
/// `comment` token on. Empty parts are dropped.
pub fn split_line<'a>(line: &'a str, comment: &str) -> Vec<&'a str> {
    let line = match line.find(comment) {
        Some(k) => &line[..k],
        None => line,
    };
    line.split(|c: char| c.is_ascii_whitespace() || c == '\u{b}')
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether `line` is a well-formed manifest line (including blank and
/// comment-only lines)
pub fn is_valid_line(line: &str) -> bool {
    LINE_PATTERN.is_match(line)
}

/// Whether `line` looks like an in-file directive, well-formed or not
pub fn looks_like_directive(line: &str) -> bool {
    DIRECTIVE_PREFIX.is_match(line)
}

/// Returns the modifier tokens of a well-formed in-file directive, or
/// `None` if `line` is not one.
pub fn directive_modifiers(line: &str) -> Option<Vec<&str>> {
    let captures = DIRECTIVE_PATTERN.captures(line)?;
    let tag = captures.name("tag")?;
    Some(split_line(&line[tag.end()..], DIRECTIVE_COMMENT))
}

/// Condition-guarded modifiers. Their conditions describe browser
/// environments and are never evaluated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    FailsIf,
    AssertsIf,
    SkipIf,
    RandomIf,
    RequireOr,
}

impl ConditionKind {
    const PREFIXES: [(&'static str, ConditionKind); 5] = [
        ("fails-if", ConditionKind::FailsIf),
        ("asserts-if", ConditionKind::AssertsIf),
        ("skip-if", ConditionKind::SkipIf),
        ("random-if", ConditionKind::RandomIf),
        ("require-or", ConditionKind::RequireOr),
    ];
}

/// A single test modifier token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// Test is expected to report an error
    Fails,
    /// Test is disabled
    Skip,
    /// Outcome is not judged
    Random,
    /// Only runs when slow tests are requested
    Slow,
    /// Consumed without effect
    SilentFail,
    /// `fails-if(..)` and friends; parsed but inert
    Conditional { kind: ConditionKind, condition: String },
    /// Removes the listed optimization levels
    SkipOpt(Vec<i32>),
    /// Token outside the grammar. Discovery validates lines before
    /// tokenizing them, so only direct callers of [`Modifier::parse`] and
    /// [`apply_modifiers`] see this; applying it logs and does nothing.
    Unknown(String),
}

impl Modifier {
    /// Classify one token
    pub fn parse(token: &str) -> Modifier {
        match token {
            "fails" => return Modifier::Fails,
            "skip" => return Modifier::Skip,
            "random" => return Modifier::Random,
            "slow" => return Modifier::Slow,
            "silentfail" => return Modifier::SilentFail,
            _ => {}
        }
        if token.starts_with("skip-opt") {
            let levels = OPT_LEVEL
                .find_iter(token)
                .filter_map(|m| m.as_str().parse::<i32>().ok())
                .collect();
            return Modifier::SkipOpt(levels);
        }
        for (prefix, kind) in ConditionKind::PREFIXES {
            if let Some(rest) = token.strip_prefix(prefix) {
                let condition = rest
                    .strip_prefix('(')
                    .and_then(|r| r.strip_suffix(')'))
                    .unwrap_or(rest);
                return Modifier::Conditional {
                    kind,
                    condition: condition.to_string(),
                };
            }
        }
        Modifier::Unknown(token.to_string())
    }

    /// Apply this modifier to `test`
    pub fn apply(&self, test: &mut TestEntity) {
        match self {
            Modifier::Fails => test.expect_success = false,
            Modifier::Skip => {
                test.expect_success = false;
                test.enabled = false;
            }
            Modifier::Random => test.random = true,
            Modifier::Slow => test.slow = true,
            Modifier::SkipOpt(levels) => {
                for opt in levels.iter().filter_map(|l| OptLevel::for_level(*l)) {
                    test.opts.remove(&opt);
                }
            }
            Modifier::SilentFail | Modifier::Conditional { .. } => {}
            Modifier::Unknown(token) => warn!("invalid manifest token: {}", token),
        }
    }
}

/// Apply every modifier token in `tokens` to `test`
pub fn apply_modifiers(test: &mut TestEntity, tokens: &[&str]) {
    for token in tokens {
        Modifier::parse(token).apply(test);
    }
}

/// One interpreted manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Blank or comment-only line
    Empty,
    /// `include <path>`
    Include(String),
    /// `url-prefix <url>`; irrelevant for shell tests
    UrlPrefix(String),
    /// `[modifier...] script <name> [modifier...]`
    Script { name: String, modifiers: Vec<Modifier> },
}

impl Directive {
    /// Parse one manifest line.
    ///
    /// Lines failing the grammar are logged. If such a line still names a
    /// script, the script is kept with no modifiers; otherwise the line is
    /// dropped.
    pub fn parse(line: &str) -> Directive {
        let parts = split_line(line, MANIFEST_COMMENT);
        if !is_valid_line(line) {
            warn!("invalid manifest line: {}", line);
            return match script_name(&parts) {
                Some(name) => Directive::Script {
                    name: name.to_string(),
                    modifiers: Vec::new(),
                },
                None => Directive::Empty,
            };
        }
        match parts.as_slice() {
            [] => Directive::Empty,
            ["include", path, ..] => Directive::Include(path.to_string()),
            ["url-prefix", url, ..] => Directive::UrlPrefix(url.to_string()),
            _ => {
                let mut name = None;
                let mut modifiers = Vec::new();
                let mut iter = parts.iter();
                while let Some(part) = iter.next() {
                    if *part == "script" {
                        name = iter.next().map(|n| n.to_string());
                    } else {
                        modifiers.push(Modifier::parse(part));
                    }
                }
                match name {
                    Some(name) => Directive::Script { name, modifiers },
                    None => Directive::Empty,
                }
            }
        }
    }
}

/// Lines of a manifest text failing the grammar, with 1-based line numbers
pub fn malformed_lines(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !is_valid_line(line))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

fn script_name<'a>(parts: &[&'a str]) -> Option<&'a str> {
    let k = parts.iter().position(|p| *p == "script")?;
    parts.get(k + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_strips_comment() {
        assert_eq!(
            split_line("  script  a.js\tfails # trailing # more", "#"),
            vec!["script", "a.js", "fails"]
        );
        assert!(split_line("# only a comment", "#").is_empty());
        assert!(split_line("", "#").is_empty());
    }

    #[test]
    fn test_valid_lines() {
        for line in [
            "",
            "   ",
            "# comment",
            "include ecma/jstests.list",
            "url-prefix ../../jsreftest.html?test=ecma/",
            "script a.js",
            "fails script a.js",
            "skip-if(xulRuntime.OS==\"WINNT\") script a.js",
            "script a.js fails random",
            "slow script a.js skip-opt(-1,0,9) # why",
            "random-if(!xulRuntime.shell) silentfail script a.js",
        ] {
            assert!(is_valid_line(line), "expected valid: {:?}", line);
        }
    }

    #[test]
    fn test_invalid_lines() {
        for line in [
            "include",
            "scripts a.js",
            "script",
            "bogus script a.js",
            "script a.js skip-opt(10)",
            "include a b",
        ] {
            assert!(!is_valid_line(line), "expected invalid: {:?}", line);
        }
    }

    #[test]
    fn test_malformed_lines_numbers() {
        let text = "script a.js\nscript\n# ok\nfoo bar\n";
        assert_eq!(malformed_lines(text), vec![(2, "script"), (4, "foo bar")]);
    }

    #[test]
    fn test_parse_include_and_url_prefix() {
        assert_eq!(
            Directive::parse("include sub/jstests.list # x"),
            Directive::Include("sub/jstests.list".into())
        );
        assert_eq!(
            Directive::parse("url-prefix ../x.html?test="),
            Directive::UrlPrefix("../x.html?test=".into())
        );
        assert_eq!(Directive::parse("  # nothing"), Directive::Empty);
    }

    #[test]
    fn test_parse_script_modifiers_both_sides() {
        let d = Directive::parse("fails script a.js skip-opt(0,9) slow");
        assert_eq!(
            d,
            Directive::Script {
                name: "a.js".into(),
                modifiers: vec![Modifier::Fails, Modifier::SkipOpt(vec![0, 9]), Modifier::Slow],
            }
        );
    }

    #[test]
    fn test_invalid_script_line_keeps_defaults() {
        let d = Directive::parse("frobnicate script a.js fails");
        assert_eq!(
            d,
            Directive::Script {
                name: "a.js".into(),
                modifiers: vec![],
            }
        );
        assert_eq!(Directive::parse("include a b"), Directive::Empty);
    }

    #[test]
    fn test_conditional_is_inert() {
        let m = Modifier::parse("skip-if(xulRuntime.OS==\"WINNT\")");
        assert_eq!(
            m,
            Modifier::Conditional {
                kind: ConditionKind::SkipIf,
                condition: "xulRuntime.OS==\"WINNT\"".into(),
            }
        );
        let mut t = TestEntity::new("", "foo.js");
        m.apply(&mut t);
        assert_eq!(t, TestEntity::new("", "foo.js"));
    }

    #[test]
    fn test_skip_disables_and_expects_failure() {
        let mut t = TestEntity::new("", "a.js");
        Modifier::Skip.apply(&mut t);
        assert!(!t.enabled);
        assert!(!t.expect_success);
    }

    #[test]
    fn test_skip_opt_removes_levels() {
        let mut t = TestEntity::new("", "a.js");
        apply_modifiers(&mut t, &["skip-opt(0,9)"]);
        assert_eq!(t.opts, [OptLevel::Interpreted].into_iter().collect());
    }

    #[test]
    fn test_skip_opt_unknown_level_ignored() {
        let mut t = TestEntity::new("", "a.js");
        apply_modifiers(&mut t, &["skip-opt(5)", "skip-opt(-1)"]);
        assert_eq!(
            t.opts,
            [OptLevel::Compiled, OptLevel::OptCompiled].into_iter().collect()
        );
    }

    #[test]
    fn test_unknown_tokens_leave_entity_unchanged() {
        assert_eq!(Modifier::parse("|reftest|"), Modifier::Unknown("|reftest|".into()));
        let mut t = TestEntity::new("", "a.js");
        apply_modifiers(&mut t, &["|reftest|", "frobnicate", "slow"]);
        let mut expected = TestEntity::new("", "a.js");
        expected.slow = true;
        assert_eq!(t, expected);
    }

    #[test]
    fn test_directive_modifiers() {
        assert_eq!(
            directive_modifiers("// |reftest| random skip-opt(-1) -- flaky"),
            Some(vec!["random", "skip-opt(-1)"])
        );
        assert_eq!(
            directive_modifiers("// |js1_8| fails"),
            Some(vec!["fails"])
        );
        assert_eq!(directive_modifiers("//|reftest|"), Some(vec![]));
        assert_eq!(directive_modifiers("/* -*- Mode: C++ -*- */"), None);
        assert_eq!(directive_modifiers("// |reftest| nonsense"), None);
        assert!(looks_like_directive("// |reftest| nonsense"));
    }
}
