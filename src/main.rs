//! `jobcheck` - command-line front end for the fraud-detection API.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jobcheck_client::config::{ClientConfig, parse_api_url};
use jobcheck_client::models::{Page, PredictionLog};
use jobcheck_client::telemetry::init_tracing;
use jobcheck_client::{
    AdminClient, AnalysisResult, AnalysisWorkflow, ApiClient, FileSessionStore, RestoreOutcome,
    SessionManager, Verdict,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "jobcheck", about = "Check job postings for fraud", disable_version_flag = true)]
struct Cli {
    /// Base URL of the API
    #[arg(long, env = "JOBCHECK_API_URL", global = true)]
    api_url: Option<String>,

    /// File holding the persisted session
    #[arg(long, env = "JOBCHECK_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session on this machine
    Login {
        username: String,
        #[arg(long, env = "JOBCHECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        username: String,
        email: String,
        #[arg(long, env = "JOBCHECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user, checking the token with the server
    Whoami,
    /// Analyze a job posting (text argument, --file, or stdin)
    Analyze {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Flag the posting for review if it is judged fraudulent
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        flag: Option<String>,
    },
    /// Recent analyses of the signed-in user
    History,
    /// Dashboard statistics
    Stats,
    /// Prediction log
    Predictions {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Flagged postings
    Flagged {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Retrain the model (administrators only)
    Retrain,
    /// Print version and build information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = parse_api_url(url)?;
    }
    if let Some(path) = &cli.session_file {
        config.session_file = path.clone();
    }

    init_tracing(config.log_format, cli.verbose).map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    let api = ApiClient::new(config.api_url.clone(), config.http.clone(), None)?;
    let session = Arc::new(SessionManager::new(
        api,
        Arc::new(FileSessionStore::new(&config.session_file)),
    ));
    if session.restore() == RestoreOutcome::Malformed {
        eprintln!("{}", "Stored session was unreadable and has been cleared.".yellow());
    }

    match cli.command {
        Commands::Login { username, password } => {
            let password = password_or_prompt(password, false)?;
            let user = session
                .login(&username, &password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Signed in as {} ({})", user.username.bold(), user.role);
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password, true)?;
            let user = session
                .register(&username, &email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Registered and signed in as {}", user.username.bold());
        }
        Commands::Logout => {
            session.logout();
            println!("Signed out");
        }
        Commands::Whoami => match session.verify().await.map_err(|e| anyhow!(e.user_message()))? {
            Some(user) => println!("{} ({}, id {})", user.username.bold(), user.role, user.id),
            None => println!("Not signed in"),
        },
        Commands::Analyze { text, file, flag } => {
            let text = read_job_text(text, file)?;
            let workflow = AnalysisWorkflow::new(session.clone(), config.workflow.clone());
            analyze(&workflow, &text, flag).await?;
        }
        Commands::History => {
            if !session.is_authenticated() {
                bail!("Sign in to see your history");
            }
            let workflow = AnalysisWorkflow::new(session.clone(), config.workflow.clone());
            workflow.refresh_history().await;
            print_logs(&workflow.history());
        }
        Commands::Stats => {
            let stats = AdminClient::new(session.clone())
                .stats()
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Total analyses:  {}", stats.total_predictions);
            println!("Fraudulent:      {} ({:.2}%)", stats.total_fake, stats.fake_percentage);
            println!("Legitimate:      {}", stats.total_real);
            println!("Flagged:         {}", stats.total_flagged);
            for day in &stats.daily_trend {
                println!("  {}  total {:>4}  fake {:>4}  real {:>4}", day.date, day.total, day.fake, day.real);
            }
        }
        Commands::Predictions { skip, limit } => {
            let page = AdminClient::new(session.clone())
                .predictions(Page { skip, limit })
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            print_logs(&page.predictions);
            println!("{} of {} shown", page.predictions.len(), page.total);
        }
        Commands::Flagged { skip, limit } => {
            let page = AdminClient::new(session.clone())
                .flagged(Page { skip, limit })
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            for post in &page.flagged_posts {
                println!(
                    "#{:<6} prediction {:<6} {:<6} {}  {}",
                    post.id,
                    post.prediction_id,
                    post.prediction,
                    post.flagged_at,
                    post.reason
                );
            }
            println!("{} of {} shown", page.flagged_posts.len(), page.total);
        }
        Commands::Retrain => {
            let spinner = ProgressBar::new_spinner().with_message("Retraining model...");
            spinner.enable_steady_tick(std::time::Duration::from_millis(120));
            let outcome = AdminClient::new(session.clone()).retrain().await;
            spinner.finish_and_clear();
            let retrained = outcome.map_err(|e| anyhow!(e.user_message()))?;
            println!(
                "{} {} v{} (accuracy {:.3}, F1 {:.3})",
                retrained.message, retrained.model_name, retrained.version, retrained.accuracy, retrained.f1_score
            );
        }
        Commands::Version => unreachable!("handled before the session is opened"),
    }

    Ok(())
}

async fn analyze(workflow: &AnalysisWorkflow, text: &str, flag: Option<String>) -> Result<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")
            .map_err(|e| anyhow!(e.to_string()))?
            .progress_chars("=> "),
    );
    bar.set_message("Scanning");

    let mut progress = workflow.subscribe_progress();
    let renderer = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let value = *progress.borrow_and_update();
                bar.set_position(value.clamp(0.0, 100.0) as u64);
            }
        })
    };

    let outcome = workflow.submit(text).await;
    renderer.abort();
    bar.finish_and_clear();

    let result = match outcome.map_err(|e| anyhow!(e.user_message()))? {
        Some(result) => result,
        None => bail!("Nothing to analyze"),
    };
    print_verdict(&result);

    if let Some(reason) = flag {
        if workflow.can_flag() {
            workflow.flag(&reason).await.map_err(|e| anyhow!(e.user_message()))?;
            println!("Post flagged for review.");
        } else if result.verdict.is_fraudulent() {
            eprintln!("{}", "Sign in to flag postings.".yellow());
        } else {
            eprintln!("Only fraudulent verdicts can be flagged.");
        }
    }
    Ok(())
}

fn print_verdict(result: &AnalysisResult) {
    let verdict = match result.verdict {
        Verdict::Fraudulent => result.verdict.to_string().red().bold(),
        Verdict::Legitimate => result.verdict.to_string().green().bold(),
    };
    println!("{verdict}  confidence {:.1}%", result.confidence);
    println!(
        "prediction #{}  analyzed {}",
        result.prediction_id,
        result.analyzed_at.with_timezone(&chrono::Local).format("%b %e, %I:%M %p")
    );
}

fn print_logs(logs: &[PredictionLog]) {
    if logs.is_empty() {
        println!("No analyses yet");
        return;
    }
    for log in logs {
        let verdict = match log.verdict() {
            Verdict::Fraudulent => "FAKE".red(),
            Verdict::Legitimate => "REAL".green(),
        };
        let when = log
            .created_at_utc()
            .map(|t| t.with_timezone(&chrono::Local).format("%b %e, %I:%M %p").to_string())
            .unwrap_or_else(|| "-".to_string());
        let excerpt: String = log.job_text.chars().take(60).collect();
        let flagged = if log.is_flagged { " [flagged]" } else { "" };
        println!("#{:<6} {} {:>6.1}%  {}  {}{}", log.id, verdict, log.confidence, when, excerpt, flagged);
    }
}

fn read_job_text(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
        }
        (None, None) => std::io::read_to_string(std::io::stdin()).context("failed to read job text from stdin"),
    }
}

fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let prompt = dialoguer::Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm password", "Passwords do not match")
    } else {
        prompt
    };
    Ok(prompt.interact()?)
}

fn print_version() {
    println!("jobcheck {}", env!("CARGO_PKG_VERSION"));
    println!("commit     {}", option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"));
    println!("built      {}", option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"));
}
