use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};
use photodup::checkpoint::CheckpointStore;
use photodup::config::{DedupConfig, SUPPORTED_HASH_SIZES};
use photodup::pipeline::{Deduplicator, ScanOutcome, ScanPhase, ScanProgress};
use photodup::report::{Report, format_file_size};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "photodup", version, about = "Find visually duplicate photos")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find duplicate groups and recommend a keeper for each
    Scan(ScanArgs),

    /// Work with the scan checkpoint
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCmd,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory to scan
    #[arg(short, long, value_name = "DIR")]
    path: PathBuf,

    /// Maximum Hamming distance for two images to match
    #[arg(short, long, default_value_t = 10)]
    threshold: u32,

    /// Hash grid size (8, 16 or 32)
    #[arg(long, default_value_t = 8, value_parser = parse_hash_size)]
    hash_size: u32,

    /// Skip images whose smaller side is below this many pixels
    #[arg(long, default_value_t = 100)]
    min_resolution: u32,

    /// Confirm borderline matches with SSIM
    #[arg(long)]
    use_ssim: bool,

    /// Minimum SSIM score for a borderline match
    #[arg(long, default_value_t = 0.95)]
    ssim_threshold: f64,

    /// Distance above which matches are refined (default: threshold / 2)
    #[arg(long)]
    refine_cutoff: Option<u32>,

    /// Aspect-ratio bucket width
    #[arg(long, default_value_t = 0.05)]
    aspect_tolerance: f64,

    /// Save a checkpoint after this many images
    #[arg(long, default_value_t = 100)]
    checkpoint_interval: usize,

    /// Resume from an existing checkpoint
    #[arg(long)]
    resume: bool,

    /// Checkpoint location (default: `<DIR>/.dedup_checkpoint.json`)
    #[arg(long, value_name = "FILE")]
    checkpoint_file: Option<PathBuf>,

    /// Also write the results as JSON
    #[arg(long, value_name = "FILE")]
    json_output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CheckpointCmd {
    /// Show what an existing checkpoint contains
    Show {
        /// Directory the checkpoint belongs to
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        #[arg(long, value_name = "FILE")]
        checkpoint_file: Option<PathBuf>,
    },

    /// Delete the checkpoint
    Clear {
        /// Directory the checkpoint belongs to
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        #[arg(long, value_name = "FILE")]
        checkpoint_file: Option<PathBuf>,
    },
}

impl ScanArgs {
    fn to_config(&self) -> DedupConfig {
        DedupConfig {
            threshold: self.threshold,
            hash_size: self.hash_size,
            min_resolution: self.min_resolution,
            use_ssim: self.use_ssim,
            ssim_threshold: self.ssim_threshold,
            refine_cutoff: self.refine_cutoff,
            aspect_tolerance: self.aspect_tolerance,
            checkpoint_interval: self.checkpoint_interval,
            resume: self.resume,
            checkpoint_file: self.checkpoint_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Scan(args) => scan(&args)?,
        Commands::Checkpoint { command } => match command {
            CheckpointCmd::Show {
                path,
                checkpoint_file,
            } => {
                let store = checkpoint_store(&path, checkpoint_file);
                if !store.exists() {
                    println!("No checkpoint at {}", store.path().display());
                    return Ok(());
                }
                let summary = store
                    .inspect()
                    .with_context(|| format!("Invalid checkpoint {}", store.path().display()))?;
                println!("🗂️  Checkpoint {}", store.path().display());
                println!("   saved:          {}", summary.saved_at.to_rfc3339());
                println!("   threshold:      {}", summary.config.threshold);
                println!("   hash size:      {}", summary.config.hash_size);
                println!("   min resolution: {}", summary.config.min_resolution);
                println!("   processed:      {}", summary.processed_files);
                println!("   fingerprinted:  {}", summary.records);
            }

            CheckpointCmd::Clear {
                path,
                checkpoint_file,
            } => {
                let store = checkpoint_store(&path, checkpoint_file);
                if store.exists() {
                    store.clear();
                    println!("🧹 Removed {}", store.path().display());
                } else {
                    println!("No checkpoint at {}", store.path().display());
                }
            }
        },
    }

    Ok(())
}

fn scan(args: &ScanArgs) -> Result<()> {
    println!("▶ Scanning for duplicates in: {}", args.path.display());

    let (sender, receiver) = crossbeam_channel::unbounded();
    let dedup = Deduplicator::new(args.to_config())
        .context("Invalid scan settings")?
        .with_progress_sender(sender);
    if dedup.is_refining() {
        println!("▶ SSIM refinement enabled");
    }

    let progress = thread::spawn(move || render_progress(receiver));
    let result = benchmark("scan", || {
        let result = dedup.run(&args.path);
        // The progress thread exits once the sender is gone.
        drop(dedup);
        let _ = progress.join();
        result
    });

    let outcome = result.with_context(|| format!("Failed to scan {}", args.path.display()))?;
    print_outcome(&outcome);

    if let Some(json_path) = &args.json_output {
        Report::new(&outcome, &args.to_config())
            .write_json(json_path)
            .with_context(|| format!("Failed to write report {}", json_path.display()))?;
        println!("\n✅ Wrote report to {}", json_path.display());
    }

    Ok(())
}

fn print_outcome(outcome: &ScanOutcome) {
    println!(
        "\n▶ {} images fingerprinted, {} skipped",
        outcome.total_images, outcome.skipped
    );
    if outcome.groups.is_empty() {
        println!("No duplicates found.");
        return;
    }

    println!(
        "Found {} duplicate group(s) with {} duplicate image(s):",
        outcome.groups.len(),
        outcome.duplicate_count()
    );
    for group in &outcome.groups {
        println!("\n✨ Group {}:", group.id + 1);
        if let Some(keeper) = group.keeper() {
            println!(
                "   🏆 Keeping → {} ({}x{}, {}, score {:.2})",
                keeper.path,
                keeper.width,
                keeper.height,
                format_file_size(keeper.file_size),
                keeper.quality_score
            );
        }
        for dup in group.culled() {
            println!(
                "   ▶ {} ({}x{}, {}, score {:.2})",
                dup.path,
                dup.width,
                dup.height,
                format_file_size(dup.file_size),
                dup.quality_score
            );
        }
    }
    println!("\n⚠️  Review only; no files were changed.");
}

fn render_progress(receiver: Receiver<ScanProgress>) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut fingerprinting = false;
    for event in receiver {
        match event.phase {
            ScanPhase::Discovery => bar.set_message("Scanning for images…"),
            ScanPhase::Fingerprinting => {
                if !fingerprinting {
                    fingerprinting = true;
                    bar.set_length(event.total as u64);
                    if let Ok(style) = ProgressStyle::with_template(
                        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    ) {
                        bar.set_style(style.progress_chars("=>-"));
                    }
                }
                bar.set_position(event.processed as u64);
                let name = Path::new(&event.current)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                bar.set_message(name);
            }
            ScanPhase::Comparing => {
                bar.set_message(format!("Comparing {} images…", event.total))
            }
            ScanPhase::Scoring => bar.set_message(format!("Scoring {} groups…", event.total)),
            ScanPhase::Complete => break,
        }
    }
    bar.finish_and_clear();
}

fn checkpoint_store(root: &Path, checkpoint_file: Option<PathBuf>) -> CheckpointStore {
    let config = DedupConfig {
        checkpoint_file,
        ..DedupConfig::default()
    };
    CheckpointStore::new(config.checkpoint_path(root))
}

fn parse_hash_size(s: &str) -> Result<u32, String> {
    let size: u32 = s.parse().map_err(|e| format!("{}", e))?;
    if SUPPORTED_HASH_SIZES.contains(&size) {
        Ok(size)
    } else {
        Err(format!("must be one of {:?}", SUPPORTED_HASH_SIZES))
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
