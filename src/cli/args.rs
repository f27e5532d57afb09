//! Clap argument types and input validation.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use reviewloom::config::PolicyKind;
use reviewloom::service::ReviewReport;

/// Multi-stage AI pull request review.
#[derive(Parser, Debug)]
#[command(
    name = "reviewloom",
    version = reviewloom::constants::VERSION,
    about = "Multi-stage AI pull request review"
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review a diff through the stage pipeline.
    Review(Box<ReviewArgs>),

    /// List the stage graph.
    Stages(StagesArgs),

    /// Validate a stage definition file.
    Validate(ValidateArgs),

    /// Resolve a code snippet to its file and line in a diff.
    Locate(LocateArgs),

    /// Show the diff lines around a file/line coordinate.
    Context(ContextArgs),

    /// Compute the reputation delta for a set of severity counts.
    Delta(DeltaArgs),
}

/// Arguments for the `stages` subcommand.
#[derive(Parser, Debug)]
pub struct StagesArgs {
    /// Directory of `<stage-id>.md` instruction overrides.
    #[arg(long)]
    pub instructions_dir: Option<PathBuf>,
}

/// Arguments for the `validate` subcommand.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the stage definition markdown file.
    pub file: PathBuf,
}

/// Arguments for the `locate` subcommand.
#[derive(Parser, Debug)]
pub struct LocateArgs {
    #[arg(long)]
    pub diff_file: PathBuf,

    /// Code snippet to find.
    pub snippet: String,

    /// Minimum similarity for a fuzzy match (defaults to the configured value).
    #[arg(long)]
    pub threshold: Option<f64>,
}

/// Arguments for the `context` subcommand.
#[derive(Parser, Debug)]
pub struct ContextArgs {
    #[arg(long)]
    pub diff_file: PathBuf,

    /// File path as it appears in the diff header.
    #[arg(long)]
    pub file: String,

    /// New-side line number.
    #[arg(long)]
    pub line: u32,

    /// Lines on each side (defaults to the configured value).
    #[arg(long)]
    pub window: Option<usize>,
}

/// Arguments for the `delta` subcommand.
#[derive(Parser, Debug)]
pub struct DeltaArgs {
    #[arg(long, default_value_t = 0)]
    pub critical: usize,

    #[arg(long, default_value_t = 0)]
    pub medium: usize,

    #[arg(long, default_value_t = 0)]
    pub minor: usize,

    #[arg(long, default_value_t = 0)]
    pub praise: usize,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    // --- Input ---
    /// Path to a unified diff file.
    #[arg(long)]
    pub diff_file: Option<PathBuf>,

    /// Read the unified diff from stdin.
    #[arg(long, default_value_t = false)]
    pub diff_stdin: bool,

    /// The diff, title and body are base64-encoded.
    #[arg(long, default_value_t = false)]
    pub base64: bool,

    // --- Pull request ---
    /// JSON file holding an array of prior PR comments.
    #[arg(long)]
    pub comments: Option<PathBuf>,

    /// README or repository description file.
    #[arg(long)]
    pub readme: Option<PathBuf>,

    #[arg(long, default_value = "unknown")]
    pub author: String,

    #[arg(long)]
    pub pr_number: Option<u64>,

    /// Repository as `owner/repo`.
    #[arg(long)]
    pub repository: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub body: Option<String>,

    /// Review id (a fresh UUID when omitted).
    #[arg(long)]
    pub review_id: Option<String>,

    // --- Reputation ---
    /// Author's current reputation score.
    #[arg(long)]
    pub score: Option<i64>,

    /// JSON array of prior reputation event strings.
    #[arg(long)]
    pub history: Option<String>,

    // --- Pipeline ---
    /// Stage selection policy (overrides the configured one).
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Directory of `<stage-id>.md` instruction overrides.
    #[arg(long)]
    pub instructions_dir: Option<PathBuf>,

    // --- Output ---
    #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,
}

/// Where the diff comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    DiffFile(PathBuf),
    Stdin,
}

/// Stage selection policy as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PolicyArg {
    Static,
    Dynamic,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Static => PolicyKind::Static,
            PolicyArg::Dynamic => PolicyKind::Dynamic,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render a report using the renderer for this format.
    pub fn render(&self, report: &ReviewReport) -> String {
        use reviewloom::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => reviewloom::output::TerminalRenderer.render(report),
            OutputFormat::Json => reviewloom::output::JsonRenderer.render(report),
        }
    }
}

impl ReviewArgs {
    /// Validate that exactly one input source is provided.
    pub fn validate_input(&self) -> Result<InputMode, String> {
        match (&self.diff_file, self.diff_stdin) {
            (None, false) => {
                Err("one input source is required: --diff-file or --diff-stdin".to_string())
            }
            (Some(_), true) => {
                Err("only one input source allowed: --diff-file or --diff-stdin".to_string())
            }
            (Some(path), false) => Ok(InputMode::DiffFile(path.clone())),
            (None, true) => Ok(InputMode::Stdin),
        }
    }

    /// Split `--repository owner/repo`.
    pub fn owner_repo(&self) -> Result<Option<(String, String)>, String> {
        let Some(ref full) = self.repository else {
            return Ok(None);
        };
        match full.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Some((owner.to_string(), repo.to_string())))
            }
            _ => Err(format!("--repository must be owner/repo, got '{full}'")),
        }
    }

    /// Parse `--history` as a JSON array of strings.
    pub fn parse_history(&self) -> Result<Vec<String>, String> {
        match self.history {
            None => Ok(Vec::new()),
            Some(ref raw) => serde_json::from_str(raw)
                .map_err(|e| format!("--history must be a JSON array of strings: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn review_args(args: &[&str]) -> ReviewArgs {
        let mut full = vec!["reviewloom", "review"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Command::Review(args) => *args,
            other => panic!("expected review, got {other:?}"),
        }
    }

    #[test]
    fn validate_no_input() {
        let args = review_args(&[]);
        assert!(
            args.validate_input()
                .unwrap_err()
                .contains("one input source is required")
        );
    }

    #[test]
    fn validate_both_inputs() {
        let args = review_args(&["--diff-file", "a.patch", "--diff-stdin"]);
        assert!(
            args.validate_input()
                .unwrap_err()
                .contains("only one input source allowed")
        );
    }

    #[test]
    fn validate_diff_file_input() {
        let args = review_args(&["--diff-file", "a.patch"]);
        assert_eq!(
            args.validate_input().unwrap(),
            InputMode::DiffFile(PathBuf::from("a.patch"))
        );
    }

    #[test]
    fn validate_stdin_input() {
        let args = review_args(&["--diff-stdin"]);
        assert_eq!(args.validate_input().unwrap(), InputMode::Stdin);
    }

    #[test]
    fn review_defaults() {
        let args = review_args(&["--diff-stdin"]);
        assert_eq!(args.author, "unknown");
        assert_eq!(args.format, OutputFormat::Terminal);
        assert!(args.policy.is_none());
        assert!(!args.base64);
    }

    #[test]
    fn policy_flag_maps_to_kind() {
        let args = review_args(&["--diff-stdin", "--policy", "dynamic"]);
        assert_eq!(args.policy.map(PolicyKind::from), Some(PolicyKind::Dynamic));
    }

    #[test]
    fn repository_split() {
        let args = review_args(&["--diff-stdin", "--repository", "acme/widgets"]);
        assert_eq!(
            args.owner_repo().unwrap(),
            Some(("acme".to_string(), "widgets".to_string()))
        );
        let bad = review_args(&["--diff-stdin", "--repository", "widgets"]);
        assert!(bad.owner_repo().is_err());
    }

    #[test]
    fn history_json() {
        let args = review_args(&["--diff-stdin", "--history", r#"["PR #1: x"]"#]);
        assert_eq!(args.parse_history().unwrap(), vec!["PR #1: x"]);
        let bad = review_args(&["--diff-stdin", "--history", "nope"]);
        assert!(bad.parse_history().is_err());
    }

    #[test]
    fn delta_counts() {
        match parse(&["reviewloom", "delta", "--critical", "1", "--praise", "2"]).command {
            Command::Delta(d) => {
                assert_eq!(d.critical, 1);
                assert_eq!(d.medium, 0);
                assert_eq!(d.praise, 2);
            }
            other => panic!("expected delta, got {other:?}"),
        }
    }

    #[test]
    fn context_args() {
        let cli = parse(&[
            "reviewloom",
            "context",
            "--diff-file",
            "d.patch",
            "--file",
            "src/a.rs",
            "--line",
            "3",
        ]);
        match cli.command {
            Command::Context(c) => {
                assert_eq!(c.file, "src/a.rs");
                assert_eq!(c.line, 3);
                assert!(c.window.is_none());
            }
            other => panic!("expected context, got {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = parse(&["reviewloom", "stages", "-v"]);
        assert!(cli.verbose);
    }
}
