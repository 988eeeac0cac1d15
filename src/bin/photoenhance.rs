//! CLI for photoenhance - AI photo enhancement.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use photoenhance::image::{normalize, SourceImage};
use photoenhance::{
    resolve_prompt, EnhanceClient, EnhancementResult, EnhancementStyle, GeminiModel, ServerConfig,
    Session,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "photoenhance")]
#[command(about = "Enhance photos with a Gemini image model through a small proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enhancement proxy
    Serve(ServeArgs),

    /// Normalize a photo and send it to a proxy for enhancement
    Enhance(EnhanceArgs),

    /// Normalize a photo locally without sending it anywhere
    Normalize(NormalizeArgs),

    /// List enhancement styles
    Styles,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on (overrides PHOTOENHANCE_BIND)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Gemini model (overrides PHOTOENHANCE_MODEL)
    #[arg(short, long, value_enum)]
    model: Option<ModelArg>,

    /// Upstream timeout in seconds (overrides PHOTOENHANCE_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args)]
struct EnhanceArgs {
    /// Photo to enhance
    input: PathBuf,

    /// Enhancement style
    #[arg(short, long, value_enum, default_value = "high-quality-restore")]
    style: StyleArg,

    /// Instruction text for the custom style
    #[arg(short, long)]
    prompt: Option<String>,

    /// Proxy endpoint
    #[arg(short, long, default_value = photoenhance::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory to write enhanced_image.png into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Also write the normalized preview that was sent
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 180)]
    timeout: u64,
}

#[derive(Args)]
struct NormalizeArgs {
    /// Photo to normalize
    input: PathBuf,

    /// Output JPEG path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    HighQualityRestore,
    CreativeUpscale,
    PortraitEnhance,
    Custom,
}

impl From<StyleArg> for EnhancementStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::HighQualityRestore => EnhancementStyle::HighQualityRestore,
            StyleArg::CreativeUpscale => EnhancementStyle::CreativeUpscale,
            StyleArg::PortraitEnhance => EnhancementStyle::PortraitEnhance,
            StyleArg::Custom => EnhancementStyle::CustomPrompt,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::NanoBanana,
            ModelArg::Pro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // API_KEY and PHOTOENHANCE_* may come from a local .env file
    let _ = dotenvy::dotenv();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("photoenhance={log_level},tower_http={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Enhance(args) => enhance(args, cli.json).await,
        Commands::Normalize(args) => normalize_file(args, cli.json),
        Commands::Styles => list_styles(cli.json),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<ExitCode> {
    let mut config = ServerConfig::from_env().context("invalid server configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(model) = args.model {
        config.model = model.into();
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    photoenhance::server::serve(config).await?;
    Ok(ExitCode::SUCCESS)
}

async fn enhance(args: EnhanceArgs, json_output: bool) -> anyhow::Result<ExitCode> {
    let style: EnhancementStyle = args.style.into();
    if args.prompt.is_some() && style != EnhancementStyle::CustomPrompt {
        anyhow::bail!("--prompt is only used with --style custom");
    }

    let client = EnhanceClient::builder()
        .endpoint(&args.endpoint)
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let mut session = Session::new();
    let image = match session.load_file(&args.input) {
        Ok(image) => image,
        Err(e) => return report_failure(&e.user_message(), e.kind(), json_output),
    };
    let (width, height) = (image.width(), image.height());

    if let Some(ref preview) = args.preview {
        image
            .save(preview)
            .with_context(|| format!("failed to write preview {}", preview.display()))?;
    }

    let outcome = session
        .enhance_until(
            &client,
            style,
            args.prompt.as_deref(),
            cancel_on(tokio::signal::ctrl_c()),
        )
        .await
        .cloned();

    match outcome {
        Some(EnhancementResult::Success { .. }) => {
            let path = session.download(&args.output_dir)?;
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "style": style.as_str(),
                    "output": path.display().to_string(),
                    "normalized": { "width": width, "height": height },
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Enhanced image: {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(EnhancementResult::Failure { kind, message }) => {
            report_failure(&message, kind, json_output)
        }
        None => anyhow::bail!("no image loaded"),
    }
}

/// Resolves when `signal` fires. A signal that cannot be registered never
/// cancels.
async fn cancel_on<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!("failed to listen for Ctrl-C; the request cannot be cancelled: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("cancelling enhancement");
}

fn report_failure(
    message: &str,
    kind: photoenhance::ErrorKind,
    json_output: bool,
) -> anyhow::Result<ExitCode> {
    if json_output {
        let result = serde_json::json!({
            "success": false,
            "kind": kind,
            "error": message,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        eprintln!("{message}");
    }
    Ok(ExitCode::FAILURE)
}

fn normalize_file(args: NormalizeArgs, json_output: bool) -> anyhow::Result<ExitCode> {
    let source = SourceImage::open(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let normalized = normalize(&source)?;
    normalized.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "input": args.input.display().to_string(),
            "declared_media_type": source.declared_media_type(),
            "original": { "width": source.width(), "height": source.height() },
            "output": args.output.display().to_string(),
            "media_type": normalized.media_type(),
            "normalized": { "width": normalized.width(), "height": normalized.height() },
            "size_bytes": normalized.size(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Normalized {} ({}x{}, {}) -> {} ({}x{}, {} bytes)",
            args.input.display(),
            source.width(),
            source.height(),
            source.declared_media_type(),
            args.output.display(),
            normalized.width(),
            normalized.height(),
            normalized.size()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn list_styles(json_output: bool) -> anyhow::Result<ExitCode> {
    #[derive(serde::Serialize)]
    struct StyleInfo {
        name: &'static str,
        label: &'static str,
        prompt: String,
    }

    let styles: Vec<StyleInfo> = EnhancementStyle::ALL
        .into_iter()
        .map(|style| StyleInfo {
            name: style.as_str(),
            label: style.label(),
            prompt: resolve_prompt(style, None),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&styles)?);
    } else {
        println!("Enhancement styles:\n");
        for s in &styles {
            println!("  {} ({})", s.label, s.name);
            println!("    {}", s.prompt);
        }
    }
    Ok(ExitCode::SUCCESS)
}
