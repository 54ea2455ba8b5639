use crate::config::supervision::SupervisionConfig;
use crate::config::types::{BlockStyle, Paragraphs};
use crate::process::Program;
use crate::report::{compare::compare, join_paragraphs, render_block_with};
use crate::verdict::failure::Failure;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Supervision settings as JSON (every field optional)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Also append audit events to this file as JSON lines
    #[arg(long, global = true, value_name = "FILE")]
    audit_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a student program and print its output, or the failure report
    Run {
        /// Wall clock time limit in seconds
        #[arg(long)]
        timeout: Option<f64>,
        /// Address-space limit in MB
        #[arg(long)]
        memory_mb: Option<u64>,
        /// Paragraph prepended to the failure report (repeatable)
        #[arg(long)]
        prefix: Vec<String>,
        /// Program and arguments to execute
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Compare an expected output file with an actual one, line by line
    Compare {
        expected: PathBuf,
        actual: PathBuf,
        /// Paragraph shown before the differences (repeatable)
        #[arg(long)]
        preamble: Vec<String>,
    },
    /// Render a file (or stdin) as a Markdown code block
    Block {
        /// Language hint of the block
        #[arg(long, default_value = "text")]
        lang: String,
        /// Use the indented `:::lang` style instead of a fence
        #[arg(long)]
        indented: bool,
        file: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(path) = &cli.audit_log {
        crate::observability::audit::init_audit_log(path)
            .with_context(|| format!("Failed to initialize audit log {}", path.display()))?;
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            timeout,
            memory_mb,
            prefix,
            command,
        } => {
            let timeout = match timeout {
                Some(seconds) => config.clone().with_timeout_secs(seconds).validated()?.timeout(),
                None => config.timeout(),
            };
            let outcome = run_program(&command, timeout, memory_mb, &config);
            match outcome {
                Ok(stdout) => {
                    if !stdout.is_empty() {
                        println!("{}", stdout);
                    }
                    Ok(())
                }
                Err(failure) => {
                    let prefix = if prefix.is_empty() {
                        config.prefix.clone()
                    } else {
                        Paragraphs::from(prefix)
                    };
                    with_prefix(&prefix, failure).exit()
                }
            }
        }
        Commands::Compare {
            expected,
            actual,
            preamble,
        } => {
            let expected = read_text(&expected)?;
            let actual = read_text(&actual)?;
            match compare(&expected, &actual, preamble) {
                Ok(()) => {
                    log::info!("outputs match");
                    Ok(())
                }
                Err(failure) => failure.exit(),
            }
        }
        Commands::Block {
            lang,
            indented,
            file,
        } => {
            let content = match file {
                Some(path) => read_text(&path)?,
                None => {
                    let mut content = String::new();
                    std::io::stdin()
                        .read_to_string(&mut content)
                        .context("Failed to read standard input")?;
                    content
                }
            };
            let style = if indented {
                BlockStyle::Indented
            } else {
                config.block_style
            };
            println!("{}", render_block_with(content, &lang, style));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SupervisionConfig> {
    let config = match path {
        Some(path) => SupervisionConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SupervisionConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn run_program(
    command: &[String],
    timeout: Duration,
    memory_mb: Option<u64>,
    config: &SupervisionConfig,
) -> std::result::Result<String, Failure> {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => return Ok(String::new()),
    };
    let mut program = Program::new(program)
        .args(args.iter().cloned())
        .timeout(timeout)
        .output_limits(config.output_limits.clone());
    if let Some(mb) = memory_mb {
        program = program.memory_limit(mb.saturating_mul(1024 * 1024));
    }
    program.run()
}

fn with_prefix(prefix: &Paragraphs, failure: Failure) -> Failure {
    if prefix.is_empty() {
        return failure;
    }
    let kind = failure.kind();
    let message = join_paragraphs(prefix, &[&Paragraphs::from(failure.into_message())]);
    Failure::new(kind, message)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::failure::FailureKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "studentbox",
            "run",
            "--timeout",
            "2.5",
            "--prefix",
            "When running fib:",
            "./fib",
            "--flag",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                timeout,
                prefix,
                command,
                ..
            } => {
                assert_eq!(timeout, Some(2.5));
                assert_eq!(prefix, vec!["When running fib:"]);
                assert_eq!(command, vec!["./fib", "--flag", "10"]);
            }
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_with_prefix_keeps_kind() {
        let failure = with_prefix(
            &Paragraphs::from("When running fib:"),
            Failure::new(FailureKind::Timeout, "Too slow."),
        );
        assert_eq!(failure.kind(), FailureKind::Timeout);
        assert_eq!(failure.message(), "When running fib:\n\nToo slow.");
    }
}
