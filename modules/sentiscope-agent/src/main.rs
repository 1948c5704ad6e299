use std::sync::Arc;
use std::time::Duration;

use ai_client::claude::DEFAULT_CLAUDE_MODEL;
use ai_client::gemini::DEFAULT_GEMINI_MODEL;
use ai_client::openai::DEFAULT_OPENAI_MODEL;
use ai_client::{ChatModel, Claude, Gemini, OpenAi, RetryPolicy, RetryingModel};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sentiscope_agent::batch::{BatchOptions, Reprocessor};
use sentiscope_agent::store::PgCommentStore;
use sentiscope_agent::{CommentStore, Pipeline};
use sentiscope_common::{AppConfig, LlmProvider, SentimentStats};

#[derive(Parser)]
#[command(name = "sentiscope", about = "Sentiment analysis for social media comments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single text and print the full pipeline state.
    Analyze {
        #[arg(long)]
        text: String,
        #[arg(long)]
        lang: Option<String>,
    },
    /// Analyze every comment of a user that has no sentiment yet.
    Reprocess {
        #[arg(long = "user")]
        user_id: String,
        #[arg(long)]
        lang: Option<String>,
        /// Stop at the first failing comment.
        #[arg(long)]
        stop_on_error: bool,
    },
    /// Analyze one pending comment of a user.
    ReprocessComment {
        #[arg(long = "user")]
        user_id: String,
        #[arg(long = "comment")]
        comment_id: String,
        #[arg(long)]
        lang: Option<String>,
    },
    /// Print dashboard statistics for a user's analyzed comments.
    Stats {
        #[arg(long = "user")]
        user_id: String,
        /// Trailing window for the daily trend.
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Number of top emotions to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Crates whose logs are shown at info level unless `RUST_LOG` says otherwise.
const LOG_TARGETS: &[&str] = &["sentiscope", "sentiscope_agent", "sentiscope_common", "ai_client"];

fn log_filter() -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}=info").parse()?);
    }
    Ok(filter)
}

fn init_tracing() -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter()?)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_model(config: &AppConfig) -> Result<Arc<dyn ChatModel>> {
    let api_key = config.require_llm_api_key()?;
    let policy = RetryPolicy::builder()
        .max_attempts(config.llm_max_attempts)
        .timeout(Duration::from_secs(config.llm_timeout_secs))
        .build();

    let model: Arc<dyn ChatModel> = match config.llm_provider {
        LlmProvider::Gemini => {
            let name = config.llm_model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            Arc::new(RetryingModel::new(Gemini::new(api_key, name), policy))
        }
        LlmProvider::Claude => {
            let name = config.llm_model.as_deref().unwrap_or(DEFAULT_CLAUDE_MODEL);
            Arc::new(RetryingModel::new(Claude::new(api_key, name), policy))
        }
        LlmProvider::OpenAi => {
            let name = config.llm_model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            Arc::new(RetryingModel::new(OpenAi::new(api_key, name), policy))
        }
    };

    info!(model = model.name(), "LLM backend ready");
    Ok(model)
}

async fn connect_store(config: &AppConfig) -> Result<PgCommentStore> {
    let store = PgCommentStore::connect(config.require_database_url()?).await?;
    store.ensure_lock_table().await?;
    Ok(store)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Analyze { text, lang } => {
            let pipeline = Pipeline::new(build_model(&config)?);
            let lang = lang.unwrap_or_else(|| config.default_lang.clone());
            let state = pipeline.run(&text, Some(&lang)).await?;
            print_json(&state)?;
        }
        Command::Reprocess {
            user_id,
            lang,
            stop_on_error,
        } => {
            let pipeline = Pipeline::new(build_model(&config)?);
            let store = Arc::new(connect_store(&config).await?);
            let lang = lang.unwrap_or_else(|| config.default_lang.clone());

            let reprocessor = Reprocessor::new(pipeline, store)
                .with_options(BatchOptions::builder().stop_on_error(stop_on_error).build());
            let report = reprocessor.reprocess_unanalyzed(&user_id, Some(&lang)).await?;
            print_json(&report)?;
        }
        Command::ReprocessComment {
            user_id,
            comment_id,
            lang,
        } => {
            let pipeline = Pipeline::new(build_model(&config)?);
            let store = Arc::new(connect_store(&config).await?);
            let lang = lang.unwrap_or_else(|| config.default_lang.clone());

            let outcome = Reprocessor::new(pipeline, store)
                .reprocess_comment(&user_id, &comment_id, Some(&lang))
                .await?;
            print_json(&outcome)?;
        }
        Command::Stats {
            user_id,
            days,
            limit,
        } => {
            let store = connect_store(&config).await?;
            let records = store.sentiments_for_user(&user_id).await?;
            let stats = SentimentStats::from_records(&records);
            let trend = SentimentStats::daily_trend(&records, days, chrono::Utc::now());

            print_json(&json!({
                "total": stats.total,
                "distribution": stats.distribution,
                "average_sentiment_value": stats.average_sentiment_value,
                "prevailing_sentiment": stats.prevailing_sentiment,
                "top_emotions": stats.top_emotions(limit),
                "tone": stats.tone_breakdown,
                "impact": stats.impact_breakdown,
                "sarcasm": stats.sarcasm,
                "trend": trend,
            }))?;
        }
    }

    Ok(())
}
