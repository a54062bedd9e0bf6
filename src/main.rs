use ab_glyph::FontArc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use layerscan::config::{self, DetectionConfig};
use layerscan::detect::detect_issues;
use layerscan::drawing::{DrawingEngine, PixelOperation};
use layerscan::issues::IgnoreList;
use layerscan::layer::LayerStack;
use layerscan::output;
use layerscan::progress::{Progress, ProgressEvent};
use layerscan::storage::PngDirStorage;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

#[derive(Parser)]
#[command(name = "layerscan")]
#[command(about = "Pre-print defect detection and pixel editing for resin layer stacks")]
#[command(long_about = "\
Pre-print defect detection and pixel editing for resin layer stacks

A stack is a directory with one grayscale PNG per layer. Files are ordered
by name, so zero-pad the numbers:

  layers/
  ├── config.toml          # Detection settings (optional)
  ├── 0000.png             # Layer 0, on the build plate
  ├── 0001.png
  └── ...

Issues found by 'detect':
  Empty           layer with no lit pixel
  Touching bound  lit pixels inside the edge margins
  Island          region with too little support on the layer below
  Overhang        new area wide enough to survive erosion
  Resin trap      enclosed cavity with no path out of the print

Run 'layerscan gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory of per-layer PNGs
    #[arg(long, default_value = "layers", global = true)]
    layers: PathBuf,

    /// Config file (defaults to config.toml in the layer directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log phase summaries
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log per-phase details
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the stack for printability issues
    Detect {
        /// Also write the issues as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// JSON list of issues to suppress (same format as --json)
        #[arg(long)]
        ignore: Option<PathBuf>,
    },
    /// Print the bounding rectangle of every lit pixel in the stack
    Bounds,
    /// Apply a JSON list of pixel operations and write changed layers back
    Draw {
        /// JSON file with the operations
        operations: PathBuf,
        /// TrueType/OpenType font for text operations
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Detect { json, ignore } => {
            let config = load_config(cli.config.as_deref(), &cli.layers)?;
            init_thread_pool(&config.processing);
            let stack = LayerStack::new(PngDirStorage::open(&cli.layers)?);
            let ignored = match ignore {
                Some(path) => {
                    let list: IgnoreList = serde_json::from_str(&std::fs::read_to_string(path)?)?;
                    log::info!("{} issues on the ignore list", list.len());
                    list
                }
                None => IgnoreList::new(),
            };

            let issues = with_progress_bar(|progress| {
                detect_issues(&stack, &config, &ignored, progress)
            })?;
            output::print_detect_output(&issues);

            if let Some(path) = json {
                std::fs::write(&path, serde_json::to_string_pretty(&issues)?)?;
                println!("Wrote {}", path.display());
            }
        }
        Command::Bounds => {
            let config = load_config(cli.config.as_deref(), &cli.layers)?;
            init_thread_pool(&config.processing);
            let stack = LayerStack::new(PngDirStorage::open(&cli.layers)?);
            let bounds = with_progress_bar(|progress| stack.bounding_rectangle(progress))?;
            output::print_bounds_output(&stack.metadata(), bounds);
        }
        Command::Draw { operations, font } => {
            let config = load_config(cli.config.as_deref(), &cli.layers)?;
            init_thread_pool(&config.processing);
            let ops: Vec<PixelOperation> =
                serde_json::from_str(&std::fs::read_to_string(&operations)?)?;

            let mut engine = DrawingEngine::new();
            if let Some(path) = font {
                engine = engine.with_font(FontArc::try_from_vec(std::fs::read(path)?)?);
            }

            let mut stack = LayerStack::new(PngDirStorage::open(&cli.layers)?);
            with_progress_bar(|progress| engine.apply(&mut stack, &ops, progress))?;
            let changed: Vec<u32> = stack
                .layers()
                .iter()
                .filter(|layer| layer.is_modified())
                .map(|layer| layer.index())
                .collect();
            output::print_draw_output(ops.len(), &changed);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--config` when given, otherwise `config.toml` in the layer directory.
fn load_config(path: Option<&Path>, layers: &Path) -> Result<DetectionConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(layers),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Run `work` with a terminal progress bar fed from its [`Progress`].
fn with_progress_bar<T>(work: impl FnOnce(&Progress) -> T) -> T {
    let (tx, rx) = mpsc::channel();
    let drawer = std::thread::spawn(move || draw_progress(rx));
    // The sender lives in `progress`; dropping it ends the drawer
    let result = {
        let progress = Progress::new().with_sink(tx);
        work(&progress)
    };
    if drawer.join().is_err() {
        log::warn!("progress display stopped early");
    }
    result
}

fn draw_progress(rx: Receiver<ProgressEvent>) {
    let style = ProgressStyle::default_bar()
        .template("{msg:24} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let bar = ProgressBar::new(0);
    bar.set_style(style);

    let mut phase = String::new();
    for event in rx {
        if event.phase != phase {
            bar.reset();
            bar.set_length(u64::from(event.total));
            bar.set_message(event.phase.clone());
            phase = event.phase;
        }
        bar.set_position(u64::from(event.processed));
    }
    bar.finish_and_clear();
}
