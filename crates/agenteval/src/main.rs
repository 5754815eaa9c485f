mod config;
mod inputs;
mod report;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use agenteval_agent::{create_generator, GenerationConfig, Generator, GeneratorType};
use agenteval_core::{
    aggregate, EvalRunner, RunError, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_ROUNDS,
};
use agenteval_logging::{init_tracing, LogEvent, LogFormat, Logger};

use crate::config::ProjectConfig;

/// Exit code for a run stopped by Ctrl+C
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "agenteval",
    about = "Criteria-based evaluation of agent transcripts",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Agent to use for both critic and quantifier
    #[arg(short, long, value_enum, global = true)]
    agent: Option<AgentChoice>,

    /// Model to use (if agent supports it)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Requests allowed per synthesis or per test case
    #[arg(long, global = true)]
    max_rounds: Option<usize>,

    /// Limit on a single generation request, e.g. "90s"
    #[arg(long, global = true, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Tracing level (RUST_LOG overrides)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Directory for the event log and rolling trace files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize a criteria document from a task's examples
    Criteria {
        /// Task file with name, description and both example transcripts
        #[arg(long)]
        task: PathBuf,
        /// Extra guidance for the critic
        #[arg(long)]
        instructions: Option<String>,
        /// Where to write the criteria document (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score test cases against a criteria document
    Quantify {
        #[arg(long)]
        task: PathBuf,
        #[arg(long)]
        criteria: PathBuf,
        /// JSON file of id to test case, or a directory of test case files
        #[arg(long)]
        cases: PathBuf,
        /// Where to write the scored records
        #[arg(long)]
        out: PathBuf,
        /// Test cases scored at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Summarize scored records per criterion
    Report {
        #[arg(long)]
        criteria: PathBuf,
        #[arg(long)]
        results: PathBuf,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Synthesize criteria, score every test case and report
    Run {
        #[arg(long)]
        task: PathBuf,
        #[arg(long)]
        cases: PathBuf,
        /// Directory for criteria.json, results.json and report.json
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentChoice {
    Claude,
    Opencode,
}

impl From<AgentChoice> for GeneratorType {
    fn from(choice: AgentChoice) -> Self {
        match choice {
            AgentChoice::Claude => GeneratorType::ClaudeCode,
            AgentChoice::Opencode => GeneratorType::OpenCode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Effective settings after merging flags, `agenteval.toml` and defaults
#[derive(Debug)]
struct Settings {
    working_dir: PathBuf,
    critic: GeneratorType,
    quantifier: GeneratorType,
    critic_config: GenerationConfig,
    quantifier_config: GenerationConfig,
    max_rounds: usize,
    concurrency: usize,
}

impl Settings {
    /// Priority: CLI flag > role section > global config > default
    fn resolve(cli: &Cli, project: &ProjectConfig, working_dir: PathBuf) -> Result<Self> {
        let critic = resolve_agent(cli.agent, project.critic_agent())?;
        let quantifier = resolve_agent(cli.agent, project.quantifier_agent())?;

        let generation_config = |model: Option<&str>| {
            let mut config = GenerationConfig::new(working_dir.clone());
            if let Some(model) = cli.model.as_deref().or(model) {
                config = config.with_model(model.to_string());
            }
            if let Some(timeout) = cli.timeout.or(project.timeout) {
                config = config.with_timeout(timeout);
            }
            config
        };
        let critic_config = generation_config(project.critic_model());
        let quantifier_config = generation_config(project.quantifier_model());

        let max_rounds = cli
            .max_rounds
            .or(project.max_rounds)
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        if max_rounds == 0 {
            bail!("max_rounds must be at least 1");
        }

        Ok(Self {
            working_dir,
            critic,
            quantifier,
            critic_config,
            quantifier_config,
            max_rounds,
            concurrency: project.concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
        })
    }

    fn path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

fn resolve_agent(flag: Option<AgentChoice>, configured: Option<&str>) -> Result<GeneratorType> {
    if let Some(choice) = flag {
        return Ok(choice.into());
    }
    match configured {
        Some(name) => name.parse().map_err(anyhow::Error::msg),
        None => Ok(GeneratorType::ClaudeCode),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let guard = init_tracing(&cli.log_level, log_format, cli.log_dir.as_deref());

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let settings = Settings::resolve(&cli, &project, working_dir)?;

    let logger = match cli.log_dir {
        Some(ref dir) => Logger::with_file(log_format, &dir.join("events.jsonl"))
            .context("Failed to open event log")?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    let code = match cli.command {
        Commands::Criteria {
            ref task,
            ref instructions,
            ref out,
        } => {
            run_criteria(&settings, logger, task, instructions.clone(), out.as_deref()).await?
        }
        Commands::Quantify {
            ref task,
            ref criteria,
            ref cases,
            ref out,
            concurrency,
        } => run_quantify(&settings, logger, task, criteria, cases, out, concurrency).await?,
        Commands::Report {
            ref criteria,
            ref results,
            json,
        } => run_report(&settings, criteria, results, json)?,
        Commands::Run {
            ref task,
            ref cases,
            ref out_dir,
            ref instructions,
            concurrency,
            json,
        } => {
            run_all(
                &settings,
                logger,
                task,
                cases,
                out_dir,
                instructions.clone(),
                concurrency,
                json,
            )
            .await?
        }
    };

    // Flush the trace file before exiting
    drop(guard);
    std::process::exit(code);
}

/// Build a runner for the configured generators and route Ctrl+C to it
async fn build_runner(
    settings: &Settings,
    logger: Arc<Logger>,
    concurrency: Option<usize>,
) -> Result<EvalRunner> {
    let critic: Arc<dyn Generator> = Arc::from(create_generator(settings.critic));
    if !critic.is_available().await {
        bail!(
            "Critic agent '{}' is not available. Make sure it's installed and in PATH.",
            critic.name()
        );
    }

    let mut runner = EvalRunner::new(critic, logger)
        .with_max_rounds(settings.max_rounds)
        .with_max_concurrency(concurrency.unwrap_or(settings.concurrency));

    if settings.quantifier != settings.critic {
        let quantifier: Arc<dyn Generator> = Arc::from(create_generator(settings.quantifier));
        if !quantifier.is_available().await {
            bail!(
                "Quantifier agent '{}' is not available. Make sure it's installed and in PATH.",
                quantifier.name()
            );
        }
        runner = runner.with_quantifier_generator(quantifier);
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing requests in flight...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(runner)
}

async fn run_criteria(
    settings: &Settings,
    logger: Arc<Logger>,
    task_path: &Path,
    instructions: Option<String>,
    out: Option<&Path>,
) -> Result<i32> {
    let task = inputs::load_task(&settings.path(task_path))?;
    let runner = build_runner(settings, logger.clone(), None)
        .await?
        .with_instructions(instructions);

    logger.log(&LogEvent::EvaluationStarted {
        task: task.name.clone(),
        working_dir: settings.working_dir.clone(),
        generator: runner.generator_name().to_string(),
    });

    let store = match runner.synthesize(&task, &settings.critic_config).await {
        Ok(store) => store,
        Err(RunError::Interrupted) => return Ok(EXIT_INTERRUPTED),
        Err(e) => return Err(e).context("Criteria synthesis failed"),
    };

    let document = store.to_document()?;
    match out {
        Some(path) => inputs::write_output(&settings.path(path), &document)?,
        None => println!("{}", document),
    }
    Ok(0)
}

async fn run_quantify(
    settings: &Settings,
    logger: Arc<Logger>,
    task_path: &Path,
    criteria_path: &Path,
    cases_path: &Path,
    out: &Path,
    concurrency: Option<usize>,
) -> Result<i32> {
    let task = inputs::load_task(&settings.path(task_path))?;
    let store = inputs::load_store(&settings.path(criteria_path))?;
    if store.is_empty() {
        bail!("Criteria file {} has no criteria", criteria_path.display());
    }
    let items = inputs::load_cases(&settings.path(cases_path))?;
    let runner = build_runner(settings, logger.clone(), concurrency).await?;

    logger.log(&LogEvent::EvaluationStarted {
        task: task.name.clone(),
        working_dir: settings.working_dir.clone(),
        generator: runner.generator_name().to_string(),
    });

    let outcome = runner
        .score_batch(
            Arc::new(store),
            Arc::new(task),
            items,
            &settings.quantifier_config,
        )
        .await;

    inputs::write_output(&settings.path(out), &outcome.scored.to_json()?)?;
    report::print_batch_summary(&outcome);
    Ok(outcome.exit_code())
}

fn run_report(
    settings: &Settings,
    criteria_path: &Path,
    results_path: &Path,
    json: bool,
) -> Result<i32> {
    let store = inputs::load_store(&settings.path(criteria_path))?;
    let results = inputs::load_results(&settings.path(results_path))?;
    let report = aggregate(&store, &results).context("Results do not match the criteria")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_report(&report);
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
async fn run_all(
    settings: &Settings,
    logger: Arc<Logger>,
    task_path: &Path,
    cases_path: &Path,
    out_dir: &Path,
    instructions: Option<String>,
    concurrency: Option<usize>,
    json: bool,
) -> Result<i32> {
    let task = inputs::load_task(&settings.path(task_path))?;
    let items = inputs::load_cases(&settings.path(cases_path))?;
    let out_dir = settings.path(out_dir);
    let runner = build_runner(settings, logger.clone(), concurrency)
        .await?
        .with_instructions(instructions);

    logger.log(&LogEvent::EvaluationStarted {
        task: task.name.clone(),
        working_dir: settings.working_dir.clone(),
        generator: runner.generator_name().to_string(),
    });

    let store = match runner.synthesize(&task, &settings.critic_config).await {
        Ok(store) => store,
        Err(RunError::Interrupted) => return Ok(EXIT_INTERRUPTED),
        Err(e) => return Err(e).context("Criteria synthesis failed"),
    };
    inputs::write_output(&out_dir.join("criteria.json"), &store.to_document()?)?;

    let store = Arc::new(store);
    let outcome = runner
        .score_batch(
            store.clone(),
            Arc::new(task),
            items,
            &settings.quantifier_config,
        )
        .await;
    inputs::write_output(&out_dir.join("results.json"), &outcome.scored.to_json()?)?;
    report::print_batch_summary(&outcome);

    let report = aggregate(&store, &outcome.scored).context("Scored records failed validation")?;
    inputs::write_output(
        &out_dir.join("report.json"),
        &serde_json::to_string_pretty(&report)?,
    )?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!();
        report::print_report(&report);
    }

    Ok(outcome.exit_code())
}
