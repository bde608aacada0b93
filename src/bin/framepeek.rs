use std::{sync::Arc, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Env;
use framepeek::{
    DecoderPolicy, ExtractOptions, ExtractionRequest, ExtractionResult, FfmpegEngine,
    FfmpegLogLevel, FrameExtractor, ImageSink, LogSink, OutputPattern, PixelFormat, ProbeBudget,
    ProgressCallback, ProgressInfo,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

/// Exit status for invalid or missing arguments.
const USAGE_EXIT_CODE: i32 = 1;

const CLI_AFTER_HELP: &str = "Examples:\n  framepeek extract input.mp4 frame_%03d.png 3\n  framepeek extract rtsp://camera.local/stream thumb_%d.jpg 1 --probe-size 65536\n  framepeek extract input.mkv out/%02d.png 5 --dry-run --verbose\n  framepeek completions zsh > _framepeek";

#[derive(Debug, Parser)]
#[command(
    name = "framepeek",
    version,
    about = "Extract the first few video frames of a file or stream with minimal latency",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while frames are written.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the first frames of an input.
    #[command(
        about = "Extract the first N video frames",
        after_help = "Examples:\n  framepeek extract input.mp4 frame_%03d.png 3\n  framepeek extract input.mp4 frame_%d.jpg 10 --json"
    )]
    Extract {
        /// Input media path or URL.
        input: String,
        /// Output path template with one integer placeholder, e.g. frame_%03d.png.
        output_pattern: OutputPattern,
        /// Number of frames to extract.
        num_frames: u64,
        /// Only log the paths frames would be written to.
        #[arg(long)]
        dry_run: bool,
        /// Pixel format of written images (rgb8, rgba8, gray8).
        #[arg(long)]
        pixel_format: Option<String>,
        /// Allow overwriting existing output files.
        #[arg(long)]
        overwrite: bool,
        /// Maximum bytes examined while probing the input.
        #[arg(long)]
        probe_size: Option<u64>,
        /// Maximum stream duration analyzed while probing, in milliseconds.
        #[arg(long)]
        analyze_duration_ms: Option<u64>,
        /// Disable the low-delay and fast decoder flags.
        #[arg(long)]
        no_low_delay: bool,
        /// Print a machine-readable JSON summary.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
        "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn init_logging(cli: &Cli) {
    let dry_run = matches!(cli.command, Commands::Extract { dry_run: true, .. });
    let default_filter = if cli.global.verbose {
        "debug"
    } else if dry_run {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        Self { bar }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current);
        self.bar
            .set_message(info.output_path.display().to_string());
    }
}

fn print_report(result: &ExtractionResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let payload = json!({
            "requested": result.requested(),
            "extracted": result.frames_extracted(),
            "success": result.is_success(),
            "outputs": result
                .output_paths()
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>(),
            "error": result.error().map(|error| json!({
                "stage": error.stage(),
                "message": error.to_string(),
                "engine_code": error.engine_code(),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for path in result.output_paths() {
        println!("{} {}", "frame".green().bold(), path.display());
    }

    match result.error() {
        Some(error) if result.is_success() => eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "stopped after {} of {} frames ({} stage): {error}",
                result.frames_extracted(),
                result.requested(),
                error.stage()
            )
            .yellow()
        ),
        Some(error) => eprintln!(
            "{} {} stage failed: {error}",
            "error:".red().bold(),
            error.stage()
        ),
        None => {}
    }
    Ok(())
}

fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Extract {
            input,
            output_pattern,
            num_frames,
            dry_run,
            pixel_format,
            overwrite,
            probe_size,
            analyze_duration_ms,
            no_low_delay,
            json,
        } => {
            let mut engine = FfmpegEngine::new()?;
            if let Some(level) = &cli.global.log_level {
                let parsed = FfmpegLogLevel::parse(level)
                    .ok_or(format!("unsupported --log-level: {level}"))?;
                engine = engine.with_log_level(parsed);
            }

            let pixel_format = match &pixel_format {
                Some(value) => parse_pixel_format(value)
                    .ok_or(format!("unsupported --pixel-format: {value}"))?,
                None => PixelFormat::default(),
            };

            let mut budget = ProbeBudget::default();
            if let Some(bytes) = probe_size {
                budget = budget.with_probe_bytes(bytes);
            }
            if let Some(millis) = analyze_duration_ms {
                budget = budget.with_analyze_duration(Duration::from_millis(millis));
            }

            let policy = if no_low_delay {
                DecoderPolicy::conformant()
            } else {
                DecoderPolicy::default()
            };

            let mut options = ExtractOptions::new()
                .with_probe_budget(budget)
                .with_decoder_policy(policy);

            let progress = (cli.global.progress && !json).then(|| Arc::new(TerminalProgress::new(num_frames)));
            if let Some(progress) = &progress {
                options = options.with_progress(progress.clone());
            }

            let extractor = FrameExtractor::with_options(engine, options);
            let request = ExtractionRequest::new(input, output_pattern, num_frames);

            let result = if dry_run {
                extractor.extract(&request, &mut LogSink)
            } else {
                let mut sink = ImageSink::new()
                    .pixel_format(pixel_format)
                    .overwrite(overwrite);
                extractor.extract(&request, &mut sink)
            };

            if let Some(progress) = progress {
                progress.bar.finish_and_clear();
            }

            print_report(&result, json)?;
            Ok(result.exit_code())
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framepeek", &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = if error.use_stderr() { USAGE_EXIT_CODE } else { 0 };
            let _ = error.print();
            std::process::exit(code);
        }
    };

    init_logging(&cli);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}
