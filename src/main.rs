use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use metrics_sql_bot::config::Config;
use metrics_sql_bot::db::{close_pool, init_pool, DbPool, PgStore, QueryExecutor};
use metrics_sql_bot::llm::LlmClient;
use metrics_sql_bot::pipeline::{Pipeline, Responder};
use metrics_sql_bot::policy::{self, Verdict};
use metrics_sql_bot::telemetry;
use metrics_sql_bot::transport::{TelegramApi, TelegramBot};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "metrics-sql-bot")]
#[command(about = "Answer video-statistics questions with a single number")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot (default)
    Serve,
    /// Answer one question and print the reply
    Ask {
        /// The question in natural language
        question: String,
    },
    /// Show whether a SQL statement would be allowed to run
    Check {
        /// The SQL statement to validate
        sql: String,
    },
}

struct Stdout;

#[async_trait]
impl Responder for Stdout {
    async fn send_text(&self, text: &str) -> metrics_sql_bot::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Some(Command::Check { sql }) = &args.command {
        match policy::validate(sql) {
            Verdict::Accepted => println!("accepted"),
            Verdict::Rejected(reason) => println!("rejected: {}", reason),
        }
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    telemetry::init(config.log_file.as_deref()).context("Failed to initialise logging")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Ask { question } => ask(config, &question).await,
        Command::Check { .. } => Ok(()),
    }
}

fn build_pipeline(config: &Config, pool: DbPool) -> Result<Pipeline> {
    let translator = LlmClient::new(&config.llm)?;
    let store = PgStore::new(pool, config.database.statement_timeout);
    Ok(Pipeline::new(
        Arc::new(translator),
        QueryExecutor::new(Arc::new(store)),
    ))
}

async fn serve(config: Config) -> Result<()> {
    info!("=== Starting bot ===");
    info!(database = ?config.database, llm = ?config.llm, "Loaded configuration");

    let telegram = config.require_telegram()?;
    let api = TelegramApi::new(&telegram.token)?;

    let pool = init_pool(&config.database)
        .await
        .context("Failed to connect to the database")?;
    let pipeline = Arc::new(build_pipeline(&config, pool.clone())?);

    let bot = TelegramBot::new(api, pipeline);
    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    })
    .await;

    close_pool(&pool).await;
    info!("=== Bot stopped ===");
    Ok(())
}

async fn ask(config: Config, question: &str) -> Result<()> {
    let pool = init_pool(&config.database)
        .await
        .context("Failed to connect to the database")?;
    let pipeline = build_pipeline(&config, pool.clone())?;

    let outcome = pipeline.handle(question, &Stdout).await;
    close_pool(&pool).await;
    outcome?;
    Ok(())
}
