use anyhow::Context;
use banana_qc::api::{self, ApiResponse, Endpoint};
use banana_qc::calibration::reference::{ChartLayout, render_chart};
use banana_qc::{ProcessingConfig, logging};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "banana-qc")]
#[command(about = "Color-correct banana photos and extract the bananas")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run images through one of the processing endpoints
    Process {
        #[arg(long, value_enum)]
        endpoint: EndpointArg,

        /// JSON configuration file (defaults apply to missing fields)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory for processed images
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },

    /// Write a synthetic ColorChecker image
    RenderChart {
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, default_value_t = 40)]
        cell_size: u32,

        #[arg(long, default_value_t = 10)]
        gap: u32,
    },

    /// Print the default configuration as JSON
    DefaultConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum EndpointArg {
    ColorCorrection,
    BananaExtraction,
    Combined,
}

impl From<EndpointArg> for Endpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::ColorCorrection => Endpoint::ColorCorrection,
            EndpointArg::BananaExtraction => Endpoint::BananaExtraction,
            EndpointArg::Combined => Endpoint::CombinedProcessing,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Process {
            endpoint,
            config,
            output_dir,
            images,
        } => process_images(endpoint.into(), config, output_dir, images).await,
        Command::RenderChart {
            output,
            cell_size,
            gap,
        } => {
            let layout = ChartLayout {
                cell_size,
                gap,
                ..ChartLayout::default()
            };
            render_chart(&layout)
                .save(&output)
                .with_context(|| format!("Failed to write chart to {}", output.display()))?;
            println!("Created {} ({}x{})", output.display(), layout.width(), layout.height());
            Ok(())
        }
        Command::DefaultConfig => {
            println!("{}", ProcessingConfig::default().to_json_string()?);
            Ok(())
        }
    }
}

/// Process every image concurrently on the blocking pool and save the results
async fn process_images(
    endpoint: Endpoint,
    config_path: Option<PathBuf>,
    output_dir: PathBuf,
    images: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => ProcessingConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProcessingConfig::default(),
    };
    let config = Arc::new(config);

    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let total = images.len();
    let mut tasks = JoinSet::new();
    for path in images {
        let config = Arc::clone(&config);
        tasks.spawn(async move {
            let result = run_one(endpoint, &path, config).await;
            (path, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (path, result) = joined.context("Processing task panicked")?;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                eprintln!("{}: {err:#}", path.display());
                failures += 1;
                continue;
            }
        };

        println!("{} -> {}", path.display(), response.status);
        for (key, value) in &response.headers {
            println!("  {key}: {value}");
        }

        if response.is_success() {
            let output = output_dir.join(output_name(&path, endpoint));
            tokio::fs::write(&output, &response.body)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("  saved {}", output.display());
        } else {
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {total} images failed");
    }
    Ok(())
}

async fn run_one(endpoint: Endpoint, path: &Path, config: Arc<ProcessingConfig>) -> anyhow::Result<ApiResponse> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let response = tokio::task::spawn_blocking(move || api::handle_upload(endpoint, &bytes, &config)).await?;
    Ok(response)
}

fn output_name(path: &Path, endpoint: Endpoint) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}_{}.png", endpoint.path().trim_start_matches('/'))
}
