//! nlq CLI - translate questions to SQL
//!
//! Usage:
//!   nlq ask "<question>" [--dialect <dialect>] [--user <id>] [--sql]
//!   nlq resume <result.json> --answer "<key>=<value>" ...
//!   nlq catalog
//!
//! Examples:
//!   nlq ask "total deposits by country last week"
//!   nlq ask "show revenue" > pending.json
//!   nlq resume pending.json --answer "AmbiguousMetric|revenue=ggr"

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use nlq::config::Settings;
use nlq::model::QueryEntities;
use nlq::sql::Dialect;
use nlq::{NlpQueryResult, NlqService};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "nlq")]
#[command(about = "nlq - Translate natural-language report questions into SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $NLQ_CONFIG, ./nlq.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQL dialect, overriding the config file
    #[arg(short, long, global = true)]
    dialect: Option<DialectArg>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a question
    Ask {
        question: String,

        /// Scope rows to this user's partitions
        #[arg(short, long)]
        user: Option<String>,

        /// Print only the SQL instead of the full JSON result
        #[arg(long)]
        sql: bool,
    },

    /// Answer clarification prompts from an earlier result
    Resume {
        /// JSON output of `ask` (or just its `entities` object)
        file: PathBuf,

        /// Answer as `<prompt key>=<choice>`; repeat for several prompts
        #[arg(short, long = "answer", value_name = "KEY=VALUE")]
        answers: Vec<String>,

        #[arg(short, long)]
        user: Option<String>,

        #[arg(long)]
        sql: bool,
    },

    /// List the metrics and dimensions the catalog knows
    Catalog,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Tsql,
    Postgres,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Config error: {}", e);
        std::process::exit(2);
    });
    if let Some(dialect) = cli.dialect {
        settings.translation.dialect = dialect.into();
    }

    let service = match NlqService::from_settings(&settings) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Failed to load catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Ask { question, user, sql } => {
            match service.process_query(&question, user.as_deref()).await {
                Ok(result) => print_result(&result, sql),
                Err(e) => {
                    eprintln!("Translation error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Resume {
            file,
            answers,
            user,
            sql,
        } => cmd_resume(&service, file, answers, user, sql).await,
        Commands::Catalog => cmd_catalog(&service),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "nlq=debug" } else { "nlq=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn cmd_resume(
    service: &NlqService,
    file: PathBuf,
    answers: Vec<String>,
    user: Option<String>,
    sql: bool,
) -> ExitCode {
    let entities = match read_entities(&file) {
        Ok(entities) => entities,
        Err(e) => {
            eprintln!("Error reading '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut responses = HashMap::new();
    for answer in &answers {
        // keys contain '|' but never '='
        let Some((key, value)) = answer.split_once('=') else {
            eprintln!("Answer '{}' is not KEY=VALUE", answer);
            return ExitCode::FAILURE;
        };
        responses.insert(key.trim().to_string(), value.trim().to_string());
    }

    match service
        .resume_with_clarification(&entities, &responses, user.as_deref())
        .await
    {
        Ok(result) => print_result(&result, sql),
        Err(e) => {
            eprintln!("Clarification error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Accept either a whole `ask` result or a bare entities object.
fn read_entities(file: &Path) -> Result<QueryEntities, String> {
    let content = fs::read_to_string(file).map_err(|e| e.to_string())?;
    let mut value: serde_json::Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;
    if let Some(entities) = value.get_mut("entities") {
        value = entities.take();
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn print_result(result: &NlpQueryResult, sql_only: bool) -> ExitCode {
    if sql_only {
        return match result.sql() {
            Some(sql) => {
                println!("{}", sql);
                ExitCode::SUCCESS
            }
            None if result.needs_clarification => {
                for prompt in &result.prompts {
                    eprintln!("{} [{}]", prompt.question, prompt.key);
                    for option in &prompt.options {
                        eprintln!("  - {} ({})", option.label, option.value);
                    }
                }
                ExitCode::FAILURE
            }
            None => {
                eprintln!("{}", result.error.as_deref().unwrap_or("no SQL produced"));
                ExitCode::FAILURE
            }
        };
    }

    match serde_json::to_string_pretty(result) {
        Ok(json) => {
            println!("{}", json);
            exit_code(result)
        }
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Success only when SQL was produced; a pending clarification is a failure.
fn exit_code(result: &NlpQueryResult) -> ExitCode {
    if result.sql().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_catalog(service: &NlqService) -> ExitCode {
    let kb = service.knowledge();

    println!("Metrics:");
    for metric in kb.metric_mappings() {
        println!(
            "  - {} ({}) on {}; aliases: {}",
            metric.kind,
            metric.name,
            metric.table,
            metric.aliases.join(", ")
        );
    }
    println!();

    println!("Dimensions:");
    for dimension in kb.dimension_mappings() {
        println!(
            "  - {} ({}) {}.{}; aliases: {}",
            dimension.kind,
            dimension.name,
            dimension.table,
            dimension.column,
            dimension.aliases.join(", ")
        );
    }

    ExitCode::SUCCESS
}
