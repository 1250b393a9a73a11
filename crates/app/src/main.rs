use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use mania_toolkit_core::{
    batch::{self, collect_chart_files},
    codec, BatchOptions, BatchReport, BlendProfile, FileStatus, HoldNoteParams, Job,
    KeyRemapParams, ToolkitConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> mania_toolkit_core::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.preset {
        Some(path) => ToolkitConfig::from_path(path)?,
        None => ToolkitConfig::default(),
    };
    if let Some(out) = cli.out {
        config.output_dir = Some(out);
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }

    match cli.command {
        Commands::Remap(args) => {
            args.apply(&mut config.remap);
            run_job(&args.paths, Job::Remap(config.remap.clone()), &config)
        }
        Commands::Holds(args) => {
            args.apply(&mut config.holds);
            run_job(&args.paths, Job::Holds(config.holds.clone()), &config)
        }
        Commands::Inspect { paths, json } => inspect(&paths, json),
    }
}

fn run_job(
    paths: &[PathBuf],
    job: Job,
    config: &ToolkitConfig,
) -> mania_toolkit_core::Result<ExitCode> {
    let files = collect_chart_files(paths)?;
    if files.is_empty() {
        tracing::warn!("no chart files found");
        return Ok(ExitCode::FAILURE);
    }

    let options = BatchOptions {
        output_dir: config.output_dir.clone(),
        threads: config.threads,
    };
    let report = batch::run_batch(&files, &job, &options);
    print_report(&report);

    Ok(if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match &outcome.status {
            FileStatus::Written(output) => {
                println!("{} -> {}", outcome.path.display(), output.display())
            }
            FileStatus::Skipped => println!("{} skipped", outcome.path.display()),
            FileStatus::Failed { kind, message } => {
                println!("{} failed ({kind}): {message}", outcome.path.display())
            }
        }
    }
    println!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
}

fn inspect(paths: &[PathBuf], json: bool) -> mania_toolkit_core::Result<ExitCode> {
    let mut failed = false;
    for path in collect_chart_files(paths)? {
        let beatmap = match codec::parse_file(&path) {
            Ok(beatmap) => beatmap,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read chart");
                failed = true;
                continue;
            }
        };

        let summary = beatmap.summary();
        if json {
            let line = serde_json::to_string(&summary).map_err(std::io::Error::from)?;
            println!("{line}");
        } else {
            println!(
                "{}: {}K, {} notes ({} holds), {} timing points -> {}",
                path.display(),
                summary.key_count,
                summary.notes,
                summary.holds,
                summary.timing_points,
                summary.output_name
            );
        }
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Key-count and hold-note converter for osu!mania charts", long_about = None)]
struct Cli {
    /// JSON preset providing defaults for every option.
    #[arg(long, global = true)]
    preset: Option<PathBuf>,
    /// Directory for converted charts. Defaults to each source's directory.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    /// Worker threads; 0 uses every core.
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert charts to a higher key count.
    Remap(RemapArgs),
    /// Change the tap/hold density of charts.
    Holds(HoldsArgs),
    /// Print a short summary of each chart.
    Inspect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Emit one JSON object per chart.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct RemapArgs {
    /// Chart files or directories to search.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Target key count.
    #[arg(long)]
    keys: Option<usize>,
    /// Duplicated columns left empty.
    #[arg(long)]
    blank: Option<usize>,
    /// Re-roll the column mapping more often as this grows; 0 never re-rolls.
    #[arg(long)]
    gap: Option<f64>,
    /// Beat divisor for removing notes that crowd duplicates.
    #[arg(long)]
    clean: Option<u32>,
    #[arg(long)]
    seed: Option<String>,
    /// Only convert charts with these key counts.
    #[arg(long, value_delimiter = ',')]
    allow: Vec<usize>,
    /// Replace the creator instead of crediting the converter.
    #[arg(long)]
    creator: Option<String>,
}

impl RemapArgs {
    fn apply(&self, params: &mut KeyRemapParams) {
        if let Some(keys) = self.keys {
            params.target_keys = keys;
        }
        if let Some(blank) = self.blank {
            params.blank = blank;
        }
        if let Some(gap) = self.gap {
            params.gap = gap;
        }
        if let Some(clean) = self.clean {
            params.clean = clean;
        }
        if self.seed.is_some() {
            params.seed = self.seed.clone();
        }
        if !self.allow.is_empty() {
            params.allowed_keys = self.allow.clone();
        }
        if self.creator.is_some() {
            params.creator = self.creator.clone();
        }
    }
}

#[derive(Args, Debug)]
struct HoldsArgs {
    /// Chart files or directories to search.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Density level from -3 to 10.
    #[arg(long, allow_hyphen_values = true)]
    level: Option<i32>,
    /// Chance in percent that a note is converted.
    #[arg(long)]
    percent: Option<f64>,
    /// Beat divisor hold lengths snap to.
    #[arg(long)]
    divide: Option<f64>,
    /// Columns that keep holds at a time; 0 keeps all.
    #[arg(long)]
    columns: Option<usize>,
    /// Rows between re-rolls of the held columns; 0 never re-rolls.
    #[arg(long)]
    window: Option<usize>,
    /// Overall difficulty written to converted charts.
    #[arg(long)]
    od: Option<f64>,
    /// Keep holds already present in the source.
    #[arg(long)]
    keep_holds: bool,
    /// Re-snap hold ends to the timing point active at the end.
    #[arg(long)]
    fix_grid: bool,
    /// Skip charts this tool already converted.
    #[arg(long)]
    skip_converted: bool,
    /// Secondary beat divisor for blended durations.
    #[arg(long, requires_all = ["blend_level", "blend_mix"])]
    blend_divide: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "blend_divide")]
    blend_level: Option<i32>,
    /// Percentage of notes that keep the primary profile.
    #[arg(long, requires = "blend_divide")]
    blend_mix: Option<f64>,
    #[arg(long)]
    seed: Option<String>,
    #[arg(long, value_delimiter = ',')]
    allow: Vec<usize>,
    #[arg(long)]
    creator: Option<String>,
}

impl HoldsArgs {
    fn apply(&self, params: &mut HoldNoteParams) {
        if let Some(level) = self.level {
            params.level = level;
        }
        if let Some(percent) = self.percent {
            params.percent = percent;
        }
        if let Some(divide) = self.divide {
            params.divide = divide;
        }
        if let Some(columns) = self.columns {
            params.columns = columns;
        }
        if let Some(window) = self.window {
            params.window = window;
        }
        if self.od.is_some() {
            params.overall_difficulty = self.od;
        }
        params.preserve_holds |= self.keep_holds;
        params.fix_grid_error |= self.fix_grid;
        params.skip_converted |= self.skip_converted;
        if let (Some(divide), Some(level), Some(mix)) =
            (self.blend_divide, self.blend_level, self.blend_mix)
        {
            params.blend = Some(BlendProfile { divide, level, mix });
        }
        if self.seed.is_some() {
            params.seed = self.seed.clone();
        }
        if !self.allow.is_empty() {
            params.allowed_keys = self.allow.clone();
        }
        if self.creator.is_some() {
            params.creator = self.creator.clone();
        }
    }
}
