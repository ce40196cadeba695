use anyhow::{Context, Result};
use clap::Parser;
use sdk_assets::{GeneratorOptions, ModuleFormat, SdkAssetGenerator, SdkLayout};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ddc-assets")]
#[command(about = "Generate missing compiled Dart SDK assets for DDC", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the Dart SDK checkout to operate against
    #[arg(long)]
    sdk_root: PathBuf,

    /// Module format of the compiled bundle (amd or ddc)
    #[arg(long, default_value = "amd")]
    format: String,

    /// Compile with the compiler's canary feature set
    #[arg(long)]
    canary: bool,

    /// Pass --verbose to the summary worker
    #[arg(long)]
    verbose: bool,

    /// JSON file overriding the standard SDK layout
    #[arg(long)]
    layout: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let module_format: ModuleFormat = cli.format.parse()?;

    let layout = match &cli.layout {
        Some(path) => SdkLayout::load(path)
            .await
            .with_context(|| format!("failed to load layout from {}", path.display()))?,
        None => SdkLayout::standard(&cli.sdk_root),
    };

    let generator = SdkAssetGenerator::new(
        layout,
        GeneratorOptions {
            module_format,
            canary: cli.canary,
            verbose: cli.verbose,
        },
    );

    generator.generate().await?;

    Ok(())
}
