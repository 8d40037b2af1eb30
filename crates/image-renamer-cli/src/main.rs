use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image_renamer_core::{AnalysisStatus, Config, ImageRenamer};

#[derive(Parser)]
#[command(name = "image-renamer")]
#[command(about = "Rename and tag images using a local vision model")]
#[command(version)]
struct Cli {
    /// Write logs to a rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a folder of images and suggest new names
    Analyze {
        /// Directory containing the images
        directory: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Apply the suggested renames instead of just printing them
        #[arg(long)]
        apply: bool,

        /// Skip embedding XMP metadata when applying
        #[arg(long)]
        no_metadata: bool,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Revert the most recent rename session
    Undo {
        /// Revert a specific session instead of the latest
        #[arg(long)]
        session: Option<String>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List recorded rename sessions, newest first
    Sessions {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "image-renamer.json")]
        path: PathBuf,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config, anyhow::Error> {
    Ok(match path {
        Some(config_path) => Config::from_file(&config_path)?,
        None => Config::default(),
    })
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    // File logging keeps the progress bar clean; stderr otherwise
    match &cli.log_dir {
        Some(dir) => image_renamer_core::logging::init_logger(
            &dir.to_string_lossy(),
            image_renamer_core::config::LogLevel::Info,
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
        None => env_logger::init(),
    }

    match cli.command {
        Commands::Analyze {
            directory,
            recursive,
            apply,
            no_metadata,
            verbose,
            config,
        } => {
            let mut config = load_config(config)?;

            // Override config with command line arguments
            config.recursive = recursive;
            if no_metadata {
                config.write_metadata = false;
            }
            config.log_level = match verbose {
                0 => image_renamer_core::config::LogLevel::Info,
                1 => image_renamer_core::config::LogLevel::Debug,
                _ => image_renamer_core::config::LogLevel::Trace,
            };

            let renamer = ImageRenamer::new(config)?;

            if !renamer.endpoint_available() {
                anyhow::bail!(
                    "Inference endpoint {} is not reachable or has no model loaded",
                    renamer.config().endpoint_url
                );
            }

            let images = renamer.discover_images(&directory)?;
            if images.is_empty() {
                println!("No images found in {}", directory.display());
                return Ok(());
            }
            println!("Found {} images", images.len());

            // Ctrl-C requests a cooperative stop after the in-flight image
            let cancel = Arc::new(AtomicBool::new(false));
            let cancel_handler = cancel.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nStopping after the current image...");
                cancel_handler.store(true, Ordering::SeqCst);
            })?;

            let progress_bar = ProgressBar::new(images.len() as u64);
            progress_bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );

            let mut on_progress = |done: usize, _total: usize, name: &str| {
                progress_bar.set_position(done as u64);
                progress_bar.set_message(name.to_string());
            };

            info!("Analyzing {} images...", images.len());
            let records =
                renamer.analyze_batch(&images, &cancel, Some(&mut on_progress), None);
            progress_bar.finish_and_clear();

            for record in &records {
                match record.status {
                    AnalysisStatus::Success => {
                        let suggestion = record
                            .final_filename()
                            .unwrap_or("<no suggestion>");
                        println!(
                            "{} -> {}.{} [{}]",
                            record.original_name,
                            suggestion,
                            record.extension,
                            record.final_tags().join(", ")
                        );
                    }
                    _ => println!(
                        "{}: {} ({})",
                        record.original_name,
                        record.status,
                        record.error.as_deref().unwrap_or("no detail")
                    ),
                }
            }

            if apply {
                let session = renamer.apply(&records)?;
                println!(
                    "Applied session {}: {} renamed, {} failed",
                    session.id,
                    session.success_count(),
                    session.failure_count()
                );
            } else {
                println!("Dry run: pass --apply to rename the files");
            }

            Ok(())
        }

        Commands::Undo { session, config } => {
            let renamer = ImageRenamer::new(load_config(config)?)?;

            let outcome = match session {
                Some(id) => renamer.undo_session(&id)?,
                None => renamer.undo_last()?,
            };

            match outcome {
                Some((session, reverted)) => {
                    println!("Reverted {} files from session {}", reverted, session.id);
                }
                None => println!("No session to undo"),
            }
            Ok(())
        }

        Commands::Sessions { config } => {
            let renamer = ImageRenamer::new(load_config(config)?)?;
            let sessions = renamer.list_sessions();
            if sessions.is_empty() {
                println!("No recorded sessions");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}  {} renamed, {} failed{}",
                    session.id,
                    session.success_count(),
                    session.failure_count(),
                    if session.undone { "  (undone)" } else { "" }
                );
            }
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
