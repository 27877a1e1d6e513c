use clap::{Parser, Subcommand};
use simple_heal::heal::{CancelToken, HealOutcome, HealRequest, Healer};
use simple_heal::imaging::{ImageBackend, QualityTier, RustBackend};
use simple_heal::types::{Rect, Stroke};
use simple_heal::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Input image plus the selection to work on.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Image to read
    #[arg(long, short)]
    input: PathBuf,

    /// Target rectangle as left,top,right,bottom (right/bottom exclusive)
    #[arg(long, value_parser = parse_rect)]
    rect: Rect,

    /// Rectangles the source search must avoid (repeatable)
    #[arg(long = "exclude", value_parser = parse_rect)]
    excluded: Vec<Rect>,
}

#[derive(Parser)]
#[command(name = "simple-heal")]
#[command(about = "Content-aware healing for photographs")]
#[command(long_about = "\
Content-aware healing for photographs

Removes a marked object or blemish by filling it with texture found
elsewhere in the same image. Select the area with a rectangle or with
brush strokes:

  simple-heal heal -i photo.jpg --rect 120,80,184,144 -o healed.png
  simple-heal heal -i photo.jpg --strokes strokes.json -o healed.png

A strokes file is a JSON array of strokes:

  [{\"points\": [{\"x\": 10, \"y\": 12}, {\"x\": 40, \"y\": 15}],
    \"radius\": 12, \"hardness\": 0.8, \"opacity\": 1.0}]

Rectangles can be healed from an automatically detected source region
or from one you pick with --source (see 'simple-heal candidates').

Run 'simple-heal gen-config' to generate a documented heal.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing file = stock defaults)
    #[arg(long, default_value = "heal.toml", global = true)]
    config: PathBuf,

    /// Log debug diagnostics (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Heal a rectangle or brush-stroke selection
    Heal {
        /// Image to read
        #[arg(long, short)]
        input: PathBuf,

        /// Where to write the healed image (format follows the extension)
        #[arg(long, short)]
        output: PathBuf,

        /// Target rectangle as left,top,right,bottom
        #[arg(
            long,
            value_parser = parse_rect,
            conflicts_with = "strokes",
            required_unless_present = "strokes"
        )]
        rect: Option<Rect>,

        /// JSON file with brush strokes
        #[arg(long)]
        strokes: Option<PathBuf>,

        /// Clone from this rectangle instead of searching
        #[arg(long, value_parser = parse_rect, requires = "rect")]
        source: Option<Rect>,

        /// Rectangles the source search must avoid (repeatable)
        #[arg(long = "exclude", value_parser = parse_rect)]
        excluded: Vec<Rect>,

        /// Quality tier: lite, medium, or advanced
        #[arg(long, default_value_t = QualityTier::Medium)]
        tier: QualityTier,
    },
    /// List ranked source regions for a rectangle
    Candidates(TargetArgs),
    /// Validate a target rectangle without healing
    Check {
        /// Image to read
        #[arg(long, short)]
        input: PathBuf,

        /// Target rectangle as left,top,right,bottom
        #[arg(long, value_parser = parse_rect)]
        rect: Rect,
    },
    /// Print a stock heal.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Heal {
            input,
            output: output_path,
            rect,
            strokes,
            source,
            excluded,
            tier,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::new();
            let image = backend.load(&input)?;

            let mut request = match (rect, strokes) {
                (Some(rect), _) => HealRequest::rect(rect),
                (None, Some(path)) => HealRequest::strokes(load_strokes(&path)?),
                (None, None) => return Err("either --rect or --strokes is required".into()),
            };
            request = request.with_tier(tier).with_excluded(excluded);
            if let Some(source) = source {
                request = request.with_source(source);
            }

            let healer = Healer::new(config, backend);
            let cancel = CancelToken::new();
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_heal_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let outcome = healer.heal(&image, &request, &cancel, Some(tx));
            printer.join().unwrap();
            let outcome = outcome?;

            let written = match &outcome {
                HealOutcome::Healed(result) => {
                    healer.backend().save(&result.image, &output_path)?;
                    Some(output_path.as_path())
                }
                HealOutcome::Cancelled(_) => None,
            };
            output::print_result(&outcome, written);
        }
        Command::Candidates(args) => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::new();
            let image = backend.load(&args.input)?;
            let healer = Healer::new(config, backend);
            let candidates = healer.candidates(&image, &args.rect, &args.excluded)?;
            output::print_candidates(&args.rect, &candidates);
        }
        Command::Check { input, rect } => {
            let config = config::load_config(&cli.config)?;
            let backend = RustBackend::new();
            let (width, height) = simple_heal::imaging::get_dimensions(&backend, &input)?;
            let validation = Healer::new(config, backend).validate((width, height), &rect);
            output::print_validation(&rect, &validation);
            if !validation.is_valid() {
                return Err(validation.message.into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "simple_heal=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid rectangle '{s}': {e}"))?;
    match parts[..] {
        [left, top, right, bottom] if right > left && bottom > top => {
            Ok(Rect::new(left, top, right, bottom))
        }
        [_, _, _, _] => Err(format!("rectangle '{s}' must have right > left and bottom > top")),
        _ => Err(format!("rectangle '{s}' must be left,top,right,bottom")),
    }
}

fn load_strokes(path: &Path) -> Result<Vec<Stroke>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
