use std::fmt;
use std::path::PathBuf;

use mastery_core::model::{EngineSettingsDraft, LessonId, ModuleDescriptor};
use mastery_core::recommend::SequentialPolicy;
use services::{Clock, EngineError, ProgressionEngine};

mod logging;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app inspect [--db <sqlite_url>] [--learner <id>]");
    eprintln!("  app lesson  --catalog <modules.json> --lesson <id> [--db <sqlite_url>] [--learner <id>]");
    eprintln!("  app clear   [--db <sqlite_url>] [--learner <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://mastery.sqlite3?mode=rwc");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MASTERY_DB_URL, MASTERY_LEARNER, MASTERY_DEFAULT_THRESHOLD, MASTERY_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Inspect,
    Lesson,
    Clear,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "inspect" => Some(Self::Inspect),
            "lesson" => Some(Self::Lesson),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    learner: Option<String>,
    catalog: Option<PathBuf>,
    lesson: Option<LessonId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("MASTERY_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://mastery.sqlite3?mode=rwc".into(), normalize_sqlite_url),
            learner: None,
            catalog: None,
            lesson: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--learner" => parsed.learner = Some(require_value(args, "--learner")?),
                "--catalog" => {
                    parsed.catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                "--lesson" => parsed.lesson = Some(LessonId::new(require_value(args, "--lesson")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }
    let path = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    format!("sqlite://{path}?mode=rwc")
}

async fn open_engine(args: &Args) -> Result<ProgressionEngine, EngineError> {
    let mut draft = EngineSettingsDraft::from_env()?;
    if let Some(learner) = &args.learner {
        draft.learner = Some(learner.clone());
    }
    let settings = draft.validate()?;
    ProgressionEngine::open_sqlite(&args.db_url, settings, Clock::default()).await
}

fn load_catalog(path: &PathBuf) -> Result<Vec<ModuleDescriptor>, Box<dyn std::error::Error>> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

async fn run(command: Command, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(&args).await?;

    match command {
        Command::Inspect => {
            let records: Vec<_> = engine.tracker().records().collect();
            let report = serde_json::json!({
                "modules": records,
                "remediation": engine.registry().entries(),
                "canProceed": engine.registry().can_proceed(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Lesson => {
            let catalog = args
                .catalog
                .as_ref()
                .ok_or(ArgsError::MissingFlag { flag: "--catalog" })?;
            let lesson_id = args
                .lesson
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--lesson" })?;
            let modules = load_catalog(catalog)?;

            let report = serde_json::json!({
                "progress": engine.lesson_progress(&lesson_id, &modules),
                "pendingRemediation": engine.registry().remediation_for_lesson(&lesson_id),
                "canAdvance": engine.can_advance_lesson(&lesson_id, &modules),
                "nextModule": engine.recommend_next(&SequentialPolicy, &lesson_id, &modules),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Clear => {
            engine.clear_all();
            engine.flush().await;
            let failed = engine.tracker().failed_writes() + engine.registry().failed_writes();
            if failed > 0 {
                tracing::warn!(failed, "some stores could not be erased");
            } else {
                tracing::info!(db = %args.db_url, "progress cleared");
            }
        }
    }

    engine.flush().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next().as_deref().and_then(Command::from_arg) else {
        print_usage();
        std::process::exit(2);
    };

    let parsed = match Args::parse(&mut args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(err) = run(command, parsed).await {
        tracing::error!(error = %err, "command failed");
        std::process::exit(1);
    }
}
