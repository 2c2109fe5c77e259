//! Pinewright CLI entry point.
//!
//! Provides `generate`, `refine`, `enhance` and `analyze` subcommands over
//! the generation pipeline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use pinewright::config::{self, Config};
use pinewright::credentials::{self, GEMINI_API_KEY};
use pinewright::pipeline::{
    ArtifactKind, ChatRole, GenerationRequest, GenerationResult, PineGenerator, PipelineStage,
    RefinementSession, SessionContext, StageOrchestrator,
};
use pinewright::providers::gemini::GeminiProvider;
use pinewright::providers::LlmProvider;

/// Pinewright: turn trading ideas into Pine Script.
#[derive(Parser)]
#[command(name = "pinewright", version, about)]
struct Cli {
    /// Config file (default: ~/.pinewright/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs to ~/.pinewright/logs.
    #[arg(long, global = true)]
    log_file: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Options shared by commands that build or refine a script.
#[derive(Args)]
struct ScriptOptions {
    /// Generate a backtestable strategy instead of an indicator.
    #[arg(long)]
    strategy: bool,
    /// Draw in a separate pane instead of over price.
    #[arg(long)]
    no_overlay: bool,
    /// Target version tag, e.g. v6.
    #[arg(long = "target")]
    target_version: Option<String>,
    /// Model selector.
    #[arg(long)]
    model: Option<String>,
    /// File with supplemental context that overrides domain guidelines.
    #[arg(long)]
    context: Option<PathBuf>,
    /// Write the final code here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Generate a script from a description.
    Generate {
        /// What the script should do.
        description: String,
        /// Rewrite the description with the utility model first.
        #[arg(long)]
        enhance: bool,
        /// Continue into an interactive refinement session.
        #[arg(long)]
        refine: bool,
        /// Script options.
        #[command(flatten)]
        options: ScriptOptions,
    },
    /// Refine an existing script interactively.
    Refine {
        /// Script to refine.
        code_file: PathBuf,
        /// Script options.
        #[command(flatten)]
        options: ScriptOptions,
    },
    /// Rewrite a rough idea into a precise description.
    Enhance {
        /// Text to enhance.
        text: String,
    },
    /// Analyse a document into suggested generation settings.
    Analyze {
        /// Document to analyse (PDF, image or text).
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = config::runtime_paths()?;
    let _logging_guard = if cli.log_file {
        Some(pinewright::logging::init_file(&paths.logs_dir)?)
    } else {
        pinewright::logging::init_cli();
        None
    };

    let config_path = cli.config.clone().unwrap_or(paths.config_toml);
    let config = config::load_or_default(&config_path)?;
    let generator = build_generator(&config)?;

    match cli.command {
        Command::Generate {
            description,
            enhance,
            refine,
            options,
        } => handle_generate(&generator, &config, description, enhance, refine, options).await,
        Command::Refine { code_file, options } => {
            handle_refine(&generator, &config, &code_file, options).await
        }
        Command::Enhance { text } => {
            println!("{}", generator.enhance_text(&text).await);
            Ok(())
        }
        Command::Analyze { file } => handle_analyze(&generator, &file).await,
    }
}

fn build_generator(config: &Config) -> anyhow::Result<PineGenerator> {
    let credentials = credentials::load_default_credentials()?;
    let api_key = credentials
        .require(GEMINI_API_KEY)
        .context("set GEMINI_API_KEY in the environment or ~/.pinewright/.env")?;
    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(api_key));
    Ok(PineGenerator::new(provider, config.generation_settings()))
}

fn progress_stages() -> StageOrchestrator {
    StageOrchestrator::with_listener(|stage: PipelineStage| -> anyhow::Result<()> {
        eprintln!("[{stage}]");
        Ok(())
    })
}

fn session_context(config: &Config, options: &ScriptOptions) -> anyhow::Result<SessionContext> {
    let supplemental_context = options
        .context
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read context file {}", path.display()))
        })
        .transpose()?;
    let selector = options
        .model
        .clone()
        .unwrap_or_else(|| config.models.default.clone());

    Ok(SessionContext {
        artifact_kind: if options.strategy {
            ArtifactKind::Strategy
        } else {
            config.defaults.artifact_kind
        },
        target_version: options
            .target_version
            .clone()
            .unwrap_or_else(|| config.defaults.target_version.clone()),
        model: config.models.choice(&selector),
        supplemental_context,
    })
}

async fn handle_generate(
    generator: &PineGenerator,
    config: &Config,
    description: String,
    enhance: bool,
    refine: bool,
    options: ScriptOptions,
) -> anyhow::Result<()> {
    let context = session_context(config, &options)?;
    let description = if enhance {
        let enhanced = generator.enhance_text(&description).await;
        eprintln!("Enhanced description:\n{enhanced}\n");
        enhanced
    } else {
        description
    };

    let request = GenerationRequest {
        description,
        artifact_kind: context.artifact_kind,
        overlay: !options.no_overlay && config.defaults.overlay,
        target_version: context.target_version.clone(),
        model: context.model.clone(),
        supplemental_context: context.supplemental_context.clone(),
    };

    let mut stages = progress_stages();
    let result = generator
        .generate(&request, &mut stages)
        .await
        .context("generation failed")?;
    print_result(&result);

    if refine {
        let mut session = RefinementSession::start(context, result, stages);
        refine_loop(generator, &mut session).await?;
        write_code(session.current_code(), options.out.as_deref())
    } else {
        write_code(&result.code, options.out.as_deref())
    }
}

async fn handle_refine(
    generator: &PineGenerator,
    config: &Config,
    code_file: &Path,
    options: ScriptOptions,
) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(code_file)
        .with_context(|| format!("failed to read {}", code_file.display()))?;
    let context = session_context(config, &options)?;
    let mut session = RefinementSession::from_code(context, code, progress_stages());
    refine_loop(generator, &mut session).await?;
    let out = options.out.as_deref().unwrap_or(code_file);
    write_code(session.current_code(), Some(out))
}

async fn handle_analyze(generator: &PineGenerator, file: &Path) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let analysis = generator
        .analyze_document(&bytes, &name)
        .await
        .context("document analysis failed")?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

/// Read instructions from stdin, one turn per line, until `:quit` or EOF.
async fn refine_loop(
    generator: &PineGenerator,
    session: &mut RefinementSession,
) -> anyhow::Result<()> {
    info!(session_id = %session.id(), "entering refinement loop");
    eprintln!("Refinement session. Commands: :code, :history, :clear, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let instruction = line.trim();
        match instruction {
            "" => continue,
            ":quit" | ":q" => break,
            ":code" => println!("{}", session.current_code()),
            ":clear" => session.clear(),
            ":history" => {
                for message in session.history() {
                    let who = match message.role {
                        ChatRole::User => "you",
                        ChatRole::Explanation => "model",
                    };
                    println!("{who}> {}", message.content);
                }
            }
            _ => match generator.refine(session, instruction).await {
                Ok(result) => print_result(&result),
                Err(e) => eprintln!("{e}"),
            },
        }
    }
    Ok(())
}

fn print_result(result: &GenerationResult) {
    if !result.explanation.is_empty() {
        eprintln!("{}\n", result.explanation);
    }
}

fn write_code(code: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{code}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{code}"),
    }
    Ok(())
}
