//! mozsuite CLI
//!
//! Inspects a jstests corpus without running an engine: lists the
//! discovered tests, validates manifests and shows which runs would execute.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use mozsuite::corpus::{OptLevel, TestEntity};
use mozsuite::discovery::Source;
use mozsuite::executor::gate;
use mozsuite::{manifest, merge, SuiteConfig, VERSION};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mozsuite")]
#[command(author, version, about = "Conformance harness for the Mozilla jstests corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered tests with their expectations
    List {
        /// Corpus root (defaults to $MOZSUITE_TESTS)
        #[arg(long, value_name = "DIR")]
        tests: Option<PathBuf>,

        /// Override manifest (defaults to $MOZSUITE_MANIFEST)
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,

        /// Discover from a root manifest instead of scanning the corpus
        #[arg(long, value_name = "FILE")]
        from_manifest: Option<PathBuf>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a manifest, or a test file's directive line, for malformed lines
    Check {
        /// The file to check
        file: PathBuf,

        /// Treat FILE as a test file and check its first line
        #[arg(long)]
        js: bool,
    },

    /// Show which runs would execute and why others are skipped
    Plan {
        /// Corpus root (defaults to $MOZSUITE_TESTS)
        #[arg(long, value_name = "DIR")]
        tests: Option<PathBuf>,

        /// Run tests marked slow
        #[arg(long)]
        run_slow: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::List {
            tests,
            manifest,
            from_manifest,
            json,
        } => {
            let mut config = SuiteConfig::from_env()?;
            if tests.is_some() {
                config.tests_root = tests;
            }
            if let Some(manifest) = manifest {
                config.manifest = manifest;
            }
            let corpus = discover(&config, from_manifest)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&corpus)?);
            } else {
                for test in &corpus {
                    println!("{}", describe(test));
                }
                println!("{} tests (mozsuite {})", corpus.len(), VERSION);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { file, js } => {
            let bad = if js { check_test_file(&file)? } else { check_manifest(&file)? };
            if bad == 0 {
                println!("{}: ok", file.display());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{}: {} malformed line(s)", file.display(), bad);
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Plan { tests, run_slow } => {
            let mut config = SuiteConfig::from_env()?;
            if tests.is_some() {
                config.tests_root = tests;
            }
            config.run_slow |= run_slow;
            let corpus = discover(&config, None)?;
            let mut runs = 0;
            for test in &corpus {
                for opt in OptLevel::ALL {
                    match gate(test, opt, config.run_slow) {
                        None => {
                            runs += 1;
                            println!("{} [{}]: run", test, opt);
                        }
                        Some(reason) => println!("{} [{}]: skip ({})", test, opt, reason),
                    }
                }
            }
            println!("{} of {} runs execute", runs, corpus.len() * OptLevel::ALL.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn discover(config: &SuiteConfig, from_manifest: Option<PathBuf>) -> anyhow::Result<Vec<TestEntity>> {
    let source = match from_manifest {
        Some(manifest) => Source::Manifest(manifest),
        None => Source::Directory(config.validate()?.to_path_buf()),
    };
    let tests = source.discover().context("test discovery failed")?;
    Ok(merge::filter_tests(tests, &config.manifest)?)
}

fn describe(test: &TestEntity) -> String {
    let mut flags = Vec::new();
    if !test.enabled {
        flags.push("disabled".to_string());
    }
    if !test.expect_success {
        flags.push("fails".to_string());
    }
    if test.random {
        flags.push("random".to_string());
    }
    if test.slow {
        flags.push("slow".to_string());
    }
    if test.opts.len() != OptLevel::ALL.len() {
        let opts: Vec<_> = test.opts.iter().map(|o| o.to_string()).collect();
        flags.push(format!("opts={}", opts.join(",")));
    }
    if flags.is_empty() {
        test.path()
    } else {
        format!("{} ({})", test.path(), flags.join(" "))
    }
}

fn check_manifest(file: &Path) -> anyhow::Result<usize> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let bad = manifest::malformed_lines(&text);
    for (number, line) in &bad {
        println!("{}:{}: {}", file.display(), number, line);
    }
    Ok(bad.len())
}

fn check_test_file(file: &Path) -> anyhow::Result<usize> {
    let handle = fs::File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let mut line = Vec::new();
    BufReader::new(handle)
        .read_until(b'\n', &mut line)
        .with_context(|| format!("reading {}", file.display()))?;
    let line = String::from_utf8_lossy(&line);
    let line = line.trim_end_matches(['\n', '\r']);
    if !manifest::looks_like_directive(line) {
        return Ok(0);
    }
    if manifest::directive_modifiers(line).is_none() {
        println!("{}:1: {}", file.display(), line);
        return Ok(1);
    }
    Ok(0)
}
