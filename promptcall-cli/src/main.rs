use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use promptcall_parsers::{
    build_tools_system_message, intercept_tool_calls, InterceptorConfig, ParserFactory,
    RecoveryPolicy, ToolCallAccumulator,
};
use promptcall_types::{ChatMessage, ToolCallFormat, ToolDefinition};
use tokio_util::sync::CancellationToken;

mod logging;

const DEFAULT_CHUNK_SIZE: usize = 8;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
struct Cli {
    /// Interceptor config file (.yaml, .yml or .toml)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Tool call format, overrides the config file
    #[clap(long)]
    format: Option<ToolCallFormat>,

    /// Debug logging on stderr
    #[clap(long, short)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Stream a model transcript through the interceptor
    Replay {
        #[clap(help = "Transcript file: raw model text, or JSON lines with --jsonl")]
        path: PathBuf,
        #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE, help = "Characters per streamed message")]
        chunk_size: usize,
        #[clap(long, help = "Each line is one ChatMessage, sent as its own batch")]
        jsonl: bool,
        /// Surface rejected tool call text once and keep scanning
        #[clap(long)]
        passthrough: bool,
    },

    /// Print the system message that teaches a model the tool call format
    Prompt {
        #[clap(long, help = "JSON or YAML list of tool definitions")]
        tools: PathBuf,
        #[clap(long, default_value = "", help = "Base system message")]
        base: String,
    },

    /// Print a JSON schema
    Schema {
        #[clap(value_enum, default_value_t = SchemaKind::Message)]
        kind: SchemaKind,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SchemaKind {
    Message,
    Tool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(if cli.verbose { "debug" } else { "warn" });

    let mut config = match &cli.config {
        Some(path) => InterceptorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => InterceptorConfig::default(),
    };
    if let Some(format) = cli.format {
        config.format = format;
    }

    match cli.command {
        Commands::Replay {
            path,
            chunk_size,
            jsonl,
            passthrough,
        } => {
            if passthrough {
                config.recovery = RecoveryPolicy::Passthrough;
            }
            let batches = if jsonl {
                read_jsonl(&path)?
            } else {
                let text = read_file(&path)?;
                chunk_text(&text, chunk_size)
                    .into_iter()
                    .map(|chunk| vec![ChatMessage::assistant(chunk)])
                    .collect()
            };
            replay(batches, config).await?;
        }
        Commands::Prompt { tools, base } => {
            let content = read_file(&tools)?;
            let tools: Vec<ToolDefinition> = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid tool definitions in {}", tools.display()))?;
            let protocol = ParserFactory::create_protocol(&config.format);
            let message = build_tools_system_message(protocol.as_ref(), &base, &tools)?;
            println!("{}", message);
        }
        Commands::Schema { kind } => {
            let schema = match kind {
                SchemaKind::Message => schemars::schema_for!(ChatMessage),
                SchemaKind::Tool => schemars::schema_for!(ToolDefinition),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

async fn replay(batches: Vec<Vec<ChatMessage>>, config: InterceptorConfig) -> Result<()> {
    tracing::debug!("Replaying {} batch(es) as {}", batches.len(), config.format);
    let upstream = futures::stream::iter(batches);
    let mut stream = Box::pin(intercept_tool_calls(
        upstream,
        CancellationToken::new(),
        config,
    ));

    let mut acc = ToolCallAccumulator::new();
    while let Some(batch) = stream.next().await {
        for message in &batch {
            acc.push_message(message);
        }
        println!("{}", serde_json::to_string(&batch)?);
    }

    if !acc.is_empty() {
        let call = acc
            .finish()
            .context("Tool call arguments are not valid JSON")?;
        println!("{}", serde_json::json!({ "tool_call": call }));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_jsonl(path: &Path) -> Result<Vec<Vec<ChatMessage>>> {
    read_file(path)?
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| -> Result<Vec<ChatMessage>> {
            let message: ChatMessage = serde_json::from_str(line)
                .with_context(|| format!("Invalid message on line {}", index + 1))?;
            Ok(vec![message])
        })
        .collect()
}

/// Cut text into pieces of at most `size` characters.
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
