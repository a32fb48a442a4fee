use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use highlight_compositor::{
    assembly::SmartAssembleRequest,
    selector::SelectionStyles,
    story::{NarrativeStyle, StylePreset, StylePresetEngine},
    Assembler, Config, Conformer, ContentSelector, FfmpegGateway, MusicAnalyzer,
};

#[derive(Parser)]
#[command(
    name = "highlight-compositor",
    version,
    about = "Assemble beat-synced wedding highlight edits",
    long_about = "Highlight-Compositor analyzes a music track and a set of source clips, \
selects and trims the best musically aligned moments, and renders a preview plus a \
deterministic timeline that can be conformed to master quality later."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a preview and timeline from source clips and music
    Assemble {
        /// Source video clips
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Music track path
        #[arg(short, long)]
        music: PathBuf,

        /// Target duration in seconds (0 = 3s per clip)
        #[arg(short, long, default_value_t = 60)]
        target_seconds: u32,

        /// Reorder and filter clips with AI content selection first
        #[arg(long)]
        select: bool,

        /// Story template (traditional, modern, intimate, destination)
        #[arg(long, default_value = "traditional")]
        story_style: NarrativeStyle,

        /// Editing style preset (romantic, energetic, cinematic, documentary)
        #[arg(long, default_value = "romantic")]
        style_preset: StylePreset,

        /// Temporary directory for processing
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Re-render a timeline from original sources at master quality
    Conform {
        /// Path to timeline.json
        #[arg(long)]
        timeline: PathBuf,

        /// Output path for the conformed video
        #[arg(long)]
        out: PathBuf,

        /// Override music path
        #[arg(long)]
        music: Option<PathBuf>,

        /// Skip audio overlay
        #[arg(long)]
        no_audio: bool,

        /// Temporary directory for processing
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Analyze a music track and print the beat grid as JSON
    AnalyzeMusic {
        /// Music track path
        music: PathBuf,

        /// Optional duration cap in seconds
        #[arg(short, long)]
        target_seconds: Option<u32>,
    },

    /// List the editing style presets and their configuration
    ListPresets,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HIGHLIGHT_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    config.validate()?;

    match cli.command {
        Command::Assemble {
            clips,
            music,
            target_seconds,
            select,
            story_style,
            style_preset,
            temp_dir,
        } => {
            if let Some(dir) = temp_dir {
                config.temp_root = Some(dir);
            }

            let gateway = Arc::new(FfmpegGateway::detect().await?);
            let assembler = Assembler::new(gateway.clone(), config.clone());
            let styles = SelectionStyles {
                story_style,
                style_preset,
            };

            if select {
                let selector = ContentSelector::new(
                    gateway,
                    config.analysis.clone(),
                    config.vision.clone(),
                );
                let result = assembler
                    .assemble_with_selection(
                        &selector,
                        SmartAssembleRequest {
                            clips,
                            music,
                            target_seconds,
                            use_ai_selection: true,
                            styles,
                            fast_mode: true,
                        },
                    )
                    .await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let result = assembler.assemble(&clips, &music, target_seconds).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }

        Command::Conform {
            timeline,
            out,
            music,
            no_audio,
            temp_dir,
        } => {
            if let Some(dir) = temp_dir {
                config.temp_root = Some(dir);
            }

            let gateway = Arc::new(FfmpegGateway::detect().await?);
            let conformer = Conformer::new(gateway, config);
            let result = conformer
                .conform(&timeline, Some(&out), music.as_deref(), no_audio)
                .await?;

            println!("Conform completed successfully");
            println!("  Output: {}", result.output.display());
            println!("  Conform time: {:.2}s", result.conform_time);
        }

        Command::AnalyzeMusic {
            music,
            target_seconds,
        } => {
            let gateway = Arc::new(FfmpegGateway::detect().await?);
            let analyzer = MusicAnalyzer::new(gateway);
            let analysis = analyzer
                .analyze(&music, target_seconds.map(|t| t as f64))
                .await;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Command::ListPresets => {
            let engine = StylePresetEngine::new();
            let summaries: Vec<_> = engine
                .available_presets()
                .into_iter()
                .map(|preset| engine.summary(preset))
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}
