//! ecgstrip CLI — fetch PTB-XL records and render strip charts.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ecgstrip::{derive_mask, ChartLayout, RenderMode, PIXELS_PER_MM};
use ecgstrip_dataset::{ManagerConfig, PtbXlManager, PTB_XL_BUCKET};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ecgstrip")]
#[command(about = "Render PTB-XL ECG records as gridded strip charts with trace masks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a record's signal files without rendering.
    Fetch {
        #[command(flatten)]
        dataset: CliDatasetArgs,

        /// PTB-XL record identifier.
        #[arg(long)]
        ecg_id: u32,
    },

    /// Render a record to a PNG, optionally deriving its trace mask.
    Render(CliRenderArgs),

    /// Print record metadata and the resulting chart geometry.
    Info {
        #[command(flatten)]
        dataset: CliDatasetArgs,

        /// PTB-XL record identifier.
        #[arg(long)]
        ecg_id: u32,
    },
}

#[derive(Debug, Clone, Args)]
struct CliDatasetArgs {
    /// Directory the bucket is mirrored into.
    #[arg(long, default_value = "ptb_xl_data")]
    downloads_dir: PathBuf,

    /// Source bucket name.
    #[arg(long, default_value = PTB_XL_BUCKET)]
    bucket: String,

    /// Fail instead of downloading missing files.
    #[arg(long)]
    no_download: bool,
}

impl CliDatasetArgs {
    fn to_config(&self, layout: ChartLayout) -> ManagerConfig {
        ManagerConfig {
            bucket: self.bucket.clone(),
            downloads_dir: self.downloads_dir.clone(),
            download_if_missing: !self.no_download,
            generate_if_missing: true,
            layout,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliLayoutArgs {
    /// Paper speed in mm/s.
    #[arg(long, default_value_t = 25.0)]
    mm_per_second: f32,

    /// Vertical spacing between lead baselines in mm.
    #[arg(long, default_value_t = 20.0)]
    lead_separation: f32,

    /// Vertical canvas margin in mm.
    #[arg(long, default_value_t = 10.0)]
    vertical_margin: f32,

    /// Gain in mm/mV.
    #[arg(long, default_value_t = 10.0)]
    mm_per_millivolt: f32,
}

impl CliLayoutArgs {
    fn to_core(&self) -> ChartLayout {
        ChartLayout {
            mm_per_second: self.mm_per_second,
            lead_separation_mm: self.lead_separation,
            vertical_margin_mm: self.vertical_margin,
            mm_per_millivolt: self.mm_per_millivolt,
            ..ChartLayout::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliRenderArgs {
    #[command(flatten)]
    dataset: CliDatasetArgs,

    #[command(flatten)]
    layout: CliLayoutArgs,

    /// PTB-XL record identifier.
    #[arg(long)]
    ecg_id: u32,

    /// Output PNG path (default: ecg_<id>.png in the working directory).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also derive the trace mask and write it to this PNG path.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Render without grid and labels.
    #[arg(long)]
    clean: bool,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { dataset, ecg_id } => run_fetch(&dataset, ecg_id),
        Commands::Render(args) => run_render(&args),
        Commands::Info { dataset, ecg_id } => run_info(&dataset, ecg_id),
    }
}

// ── fetch ──────────────────────────────────────────────────────────────

fn run_fetch(dataset: &CliDatasetArgs, ecg_id: u32) -> CliResult<()> {
    let manager = PtbXlManager::new(dataset.to_config(ChartLayout::default()))?;
    manager.download_record(ecg_id)?;
    println!("record {} available at {}", ecg_id, manager.signal_path(ecg_id)?.display());
    Ok(())
}

// ── render ─────────────────────────────────────────────────────────────

fn run_render(args: &CliRenderArgs) -> CliResult<()> {
    let manager = PtbXlManager::new(args.dataset.to_config(args.layout.to_core()))?;
    let record = manager.load_record(args.ecg_id)?;

    let mode = if args.clean {
        RenderMode::Clean
    } else {
        RenderMode::Annotated
    };
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("ecg_{}.png", args.ecg_id)));

    let img =
        manager
            .renderer()
            .render_to_file(&record.samples, &record.metadata, mode, &out)?;
    tracing::info!("chart written to {}", out.display());

    if let Some(mask_path) = &args.mask {
        let clean = manager
            .renderer()
            .render(&record.samples, &record.metadata, RenderMode::Clean);
        let mask = derive_mask(&image::imageops::grayscale(&clean));
        mask.save_png(mask_path)?;
        tracing::info!(
            "mask written to {} ({} trace pixels)",
            mask_path.display(),
            mask.foreground_count()
        );
    }

    println!(
        "rendered record {} to {} ({}x{} px)",
        args.ecg_id,
        out.display(),
        img.width(),
        img.height()
    );
    Ok(())
}

// ── info ───────────────────────────────────────────────────────────────

fn run_info(dataset: &CliDatasetArgs, ecg_id: u32) -> CliResult<()> {
    let manager = PtbXlManager::new(dataset.to_config(ChartLayout::default()))?;
    let record = manager.load_record(ecg_id)?;
    let layout = manager.renderer().layout();

    let width_mm = layout.width_mm(record.metadata.sig_len, record.metadata.fs);
    let height_mm = layout.height_mm();

    println!("record {}", ecg_id);
    println!("  leads:       {}", record.metadata.sig_name.join(" "));
    println!("  samples:     {}", record.metadata.sig_len);
    println!("  fs:          {} Hz", record.metadata.fs);
    println!("  duration:    {:.2} s", record.metadata.duration_s());
    println!("  canvas:      {:.1}x{:.1} mm", width_mm, height_mm);
    println!(
        "  raster:      {}x{} px",
        (width_mm * PIXELS_PER_MM).round() as u32,
        (height_mm * PIXELS_PER_MM).round() as u32
    );
    Ok(())
}
