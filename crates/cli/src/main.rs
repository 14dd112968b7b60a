//! CLI tool for serializing chat exports into persona training data.
//!
//! This tool reads per-channel JSON exports and writes one JSONL training
//! record per conversation window, plus a `metadata.json` summary.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatlog_serializer_core::{
    generate_prompts, load_message_data,
    pipeline::{PipelineConfig, PipelineResult},
    write_jsonl_output,
};

/// Serialize chat exports to instruction/context/response JSONL.
#[derive(Parser, Debug)]
#[command(name = "chatlog-serialize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing JSON channel exports
    #[arg(long, default_value = "./data/unprocessed")]
    input_dir: PathBuf,

    /// Output directory for JSONL files
    #[arg(long, default_value = "./data/processed")]
    output_dir: PathBuf,

    /// TOML file with pipeline settings (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Messages past a window's start before it closes
    #[arg(long)]
    max_conversation_length: Option<usize>,

    /// Silence in milliseconds that ends a conversation
    #[arg(long)]
    inactivity_gap: Option<i64>,

    /// Platform named in instructions
    #[arg(long)]
    platform: Option<String>,

    /// Also write flattened prompt-format records
    #[arg(long)]
    prompt_format: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(len) = self.max_conversation_length {
            config.max_conversation_length = len;
        }
        if let Some(gap) = self.inactivity_gap {
            config.inactivity_gap = gap;
        }
        if let Some(platform) = &self.platform {
            config.platform = platform.clone();
        }
        config.prompt_format |= self.prompt_format;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.pipeline_config()?;

    info!("Loading exports from {:?}...", args.input_dir);
    let loaded = load_message_data(&args.input_dir);
    info!(
        "Loaded {} messages from {} files ({} skipped)",
        loaded.report.messages_loaded, loaded.report.files_loaded, loaded.report.files_skipped
    );

    let prompts = generate_prompts(&loaded.messages, &config)?;

    info!("Writing output to {:?}...", args.output_dir);
    let result: PipelineResult =
        write_jsonl_output(&prompts, &args.output_dir, config.prompt_format)?;

    let metadata_path = args.output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "input_dir": args.input_dir.to_string_lossy(),
            "output_dir": args.output_dir.to_string_lossy(),
            "max_conversation_length": config.max_conversation_length,
            "inactivity_gap": config.inactivity_gap,
            "half_window_threshold": config.half_window_threshold,
            "platform": config.platform,
            "prompt_format": config.prompt_format,
        },
        "load": loaded.report,
        "counts": {
            "total_windows": result.total_windows,
            "opening_windows": result.opening_windows,
            "half_windows": result.half_windows,
            "full_windows": result.full_windows,
        },
        "stats": {
            "total_context_messages": result.total_context_messages,
            "avg_context_messages_per_window": if result.total_windows > 0 {
                result.total_context_messages as f64 / result.total_windows as f64
            } else {
                0.0
            },
        },
        "files": {
            "prompts_path": result.prompts_path.to_string_lossy(),
            "prompt_format_path": result.prompt_format_path.as_ref().map(|p| p.to_string_lossy()),
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Messages loaded: {}", loaded.report.messages_loaded);
    println!(
        "  Rows dropped: {} filtered, {} invalid",
        loaded.report.rows_filtered, loaded.report.rows_invalid
    );
    println!("  Windows: {}", result.total_windows);
    println!(
        "    opening: {}, half: {}, full: {}",
        result.opening_windows, result.half_windows, result.full_windows
    );
    println!("  Output: {:?}", result.prompts_path);
    if let Some(path) = &result.prompt_format_path {
        println!("  Prompt format: {:?}", path);
    }
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}
