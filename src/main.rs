use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_subscriber::EnvFilter;

use patchwise_core::{OutputFormat, Overrides, ReviewerConfig, ReviewerError, DEFAULT_CONFIG_PATHS};
use patchwise_difflens::parser::parse_unified_diff;
use patchwise_review::client::ReviewClient;
use patchwise_review::event::PullRequestEvent;
use patchwise_review::github::GitHubClient;
use patchwise_review::llm::OpenAiClient;
use patchwise_review::pipeline::{ReviewOutcome, ReviewPipeline};
use patchwise_review::publish::Publisher;
use patchwise_review::retry::RetryPolicy;
use patchwise_review::vcs::{PullRequestRef, VcsProvider};

const GITHUB_MAX_RETRIES: u32 = 3;

#[derive(Parser)]
#[command(
    name = "patchwise",
    version,
    about = "LLM pull request reviewer for GitHub Actions",
    long_about = "Patchwise fetches a pull request diff, filters it, asks an OpenAI-compatible\n\
                  model for a review and posts the findings as line comments plus a summary.\n\n\
                  Examples:\n  \
                    patchwise review                          Review the PR of the current Actions event\n  \
                    patchwise review --pr owner/repo#12       Review a specific pull request\n  \
                    git diff main > c.patch && patchwise review --diff-file c.patch --dry-run\n  \
                    patchwise init                            Write .github/pr_review_config.yml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request and post comments
    #[command(long_about = "Review a pull request and post comments.\n\n\
        Without --pr the pull request is taken from GITHUB_REPOSITORY and the event\n\
        payload at GITHUB_EVENT_PATH. Events other than opened, synchronize and\n\
        reopened are skipped with exit code 0.\n\n\
        Requires OPENAI_API_KEY, and GITHUB_TOKEN unless --diff-file and --dry-run are both given.")]
    Review {
        /// Pull request to review (format: owner/repo#123)
        #[arg(long)]
        pr: Option<String>,

        /// Review a local unified diff instead of fetching the PR files
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// Configuration file, relative to the workspace
        #[arg(long, env = "CONFIG_PATH")]
        config: Option<PathBuf>,

        /// Review mode override (concise, standard, thorough)
        #[arg(long, env = "REVIEW_MODE")]
        review_mode: Option<String>,

        /// Comment threshold override (low, medium, high)
        #[arg(long, env = "COMMENT_THRESHOLD")]
        comment_threshold: Option<String>,

        /// Model override
        #[arg(long, env = "OPENAI_MODEL")]
        model: Option<String>,

        /// OpenAI-compatible API base URL
        #[arg(long, env = "OPENAI_BASE_URL")]
        base_url: Option<String>,

        /// GitHub REST API base URL (GitHub Enterprise)
        #[arg(long, env = "GITHUB_API_URL")]
        github_api_url: Option<String>,

        /// Print the review instead of posting it
        #[arg(long)]
        dry_run: bool,

        /// Output format for --dry-run
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Create a default .github/pr_review_config.yml
    #[command(long_about = "Create a default .github/pr_review_config.yml.\n\n\
        Writes every option with its default value. Fails if the file already exists.")]
    Init,
}

struct ReviewArgs {
    pr: Option<String>,
    diff_file: Option<PathBuf>,
    config: Option<PathBuf>,
    overrides: Overrides,
    github_api_url: Option<String>,
    dry_run: bool,
    format: OutputFormat,
}

enum Target {
    Pull(PullRequestRef),
    Skipped(String),
    Local,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Review {
            pr,
            diff_file,
            config,
            review_mode,
            comment_threshold,
            model,
            base_url,
            github_api_url,
            dry_run,
            format,
        } => {
            let args = ReviewArgs {
                pr,
                diff_file,
                config,
                overrides: Overrides {
                    review_mode,
                    comment_threshold,
                    model,
                    base_url,
                },
                github_api_url,
                dry_run,
                format,
            };
            run_review(args).await?;
        }
        Command::Init => {
            let path = Path::new(DEFAULT_CONFIG_PATHS[0]);
            if path.exists() {
                miette::bail!("{} already exists", path.display());
            }
            let yaml = ReviewerConfig::default().to_yaml()?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("creating {}", dir.display()))?;
            }
            std::fs::write(path, yaml).into_diagnostic()?;
            println!("Created {} with default configuration", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "patchwise=debug,reqwest=info"
    } else {
        "patchwise=info,reqwest=warn,octocrab=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn workspace_root() -> PathBuf {
    std::env::var_os("GITHUB_WORKSPACE")
        .filter(|w| !w.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Decide which pull request to review, if any.
fn resolve_target(pr: Option<&str>) -> Result<Target, ReviewerError> {
    if let Some(pr) = pr {
        return Ok(Target::Pull(pr.parse()?));
    }
    let (Some(repository), Some(event_path)) =
        (env_secret("GITHUB_REPOSITORY"), env_secret("GITHUB_EVENT_PATH"))
    else {
        return Ok(Target::Local);
    };

    let event = PullRequestEvent::read(Path::new(&event_path))?;
    if !event.should_review() {
        return Ok(Target::Skipped(event.action.unwrap_or_default()));
    }
    Ok(Target::Pull(PullRequestRef::from_repository(
        &repository,
        event.number,
    )?))
}

async fn run_review(args: ReviewArgs) -> Result<()> {
    let workspace = workspace_root();
    let mut config = ReviewerConfig::load(&workspace, args.config.as_deref())?;
    config.apply_overrides(&args.overrides)?;
    config.validate()?;
    tracing::debug!(
        mode = %config.review_mode,
        threshold = %config.comment_threshold,
        model = %config.llm.model,
        "resolved configuration"
    );

    let api_key = env_secret("OPENAI_API_KEY").ok_or_else(|| {
        ReviewerError::Config("OPENAI_API_KEY not set. Add it as a repository secret".into())
    })?;
    let model = OpenAiClient::new(&config.llm, api_key)?;
    let client = ReviewClient::new(Arc::new(model), RetryPolicy::new(config.llm.max_retries));
    let pipeline = ReviewPipeline::new(client, config)?;

    let pr = match resolve_target(args.pr.as_deref())? {
        Target::Pull(pr) => Some(pr),
        Target::Skipped(action) => {
            tracing::info!(%action, "event action is not reviewed, nothing to do");
            return Ok(());
        }
        Target::Local if args.diff_file.is_some() => None,
        Target::Local => {
            return Err(ReviewerError::Config(
                "no pull request to review: pass --pr or run from a pull_request event".into(),
            )
            .into())
        }
    };

    let needs_github = !(args.dry_run && args.diff_file.is_some());
    let github = if needs_github {
        let token = env_secret("GITHUB_TOKEN").unwrap_or_default();
        Some(GitHubClient::new(
            &token,
            args.github_api_url.as_deref(),
            RetryPolicy::new(GITHUB_MAX_RETRIES),
        )?)
    } else {
        None
    };

    let entries = match (&args.diff_file, &github, &pr) {
        (Some(path), _, _) => {
            let diff = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            parse_unified_diff(&diff)?
        }
        (None, Some(github), Some(pr)) => github.list_files(pr).await?,
        _ => miette::bail!("no diff source: pass --diff-file or --pr"),
    };

    let outcome = pipeline.review(entries).await?;

    if args.dry_run {
        print_outcome(&outcome, args.format)?;
        return Ok(());
    }

    let (Some(github), Some(pr)) = (&github, &pr) else {
        miette::bail!(miette::miette!(
            help = "use --dry-run to print the review of a local diff",
            "publishing requires a pull request"
        ));
    };
    let config = pipeline.config();
    let report = Publisher::new(github, config.comment_styling.title_prefix.as_str())
        .publish(pr, &outcome, config, Utc::now())
        .await?;
    eprintln!(
        "Posted {} comments to {pr} ({} duplicates skipped, {} failed)",
        report.posted, report.duplicates, report.failed
    );
    Ok(())
}

fn print_outcome(outcome: &ReviewOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", outcome.to_markdown()),
        OutputFormat::Text => print!("{outcome}"),
    }
    Ok(())
}
