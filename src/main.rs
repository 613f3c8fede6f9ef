mod acquire;
mod assemble;
mod discovery;
mod frame;
mod listing;
mod progress;
mod prompt;
mod remote;
mod settings;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use discovery::ScanFolder;
use progress::{format_duration, ProgressConfig, ProgressMode, ProgressReporter};
use prompt::Prompter;
use remote::DeviceClient;
use settings::{OutputFormat, RunSettings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "scan2vid",
    version,
    about = "Download an ESP32-CAM scan folder and assemble it into a video or GIF"
)]
struct Cli {
    /// Camera address (host or host:port; http:// is implied)
    #[arg(long, default_value = settings::DEFAULT_DEVICE_IP)]
    ip: String,

    /// Output frame rate. Non-positive or non-numeric values fall back to 10.
    #[arg(long, default_value = "10", allow_hyphen_values = true)]
    fps: String,

    /// Keep frames in memory only instead of also saving them under --downloads-dir.
    #[arg(long, default_value_t = false)]
    no_save_images: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Mp4)]
    format: OutputFormat,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = settings::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Root directory for saved source images.
    #[arg(long, default_value = settings::DEFAULT_DOWNLOADS_DIR)]
    downloads_dir: PathBuf,

    /// Directory for the default output path.
    #[arg(long, default_value = settings::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Scan folder to use (e.g. scan_3) instead of picking from a list.
    #[arg(long)]
    folder: Option<String>,

    /// Output file path (default: <output-dir>/<folder>.<format>).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Accept defaults for every prompt.
    #[arg(short = 'y', long, default_value_t = false)]
    yes: bool,

    /// Progress display mode: auto (TTY-aware), rich, plain, quiet.
    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    progress: ProgressMode,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

impl Cli {
    fn run_settings(&self) -> RunSettings {
        RunSettings {
            device: self.ip.clone(),
            fps: settings::resolve_fps(&self.fps),
            save_images: !self.no_save_images,
            format: self.format,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            downloads_dir: self.downloads_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    if let Err(err) = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted by user.");
        std::process::exit(0);
    }) {
        log::warn!("could not install Ctrl-C handler: {err}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:?}");
            eprintln!("Unexpected error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.run_settings();
    let progress_cfg = ProgressConfig::new(cli.progress);
    log::debug!("settings: {:?}", settings);

    if settings.format.needs_ffmpeg() {
        if let Err(err) = util::ensure_ffmpeg_available() {
            eprintln!(
                "ffmpeg is required for {} output: {:#}",
                settings.format.extension(),
                err
            );
            return Ok(ExitCode::FAILURE);
        }
    }

    let client = DeviceClient::new(settings.base_url(), settings.timeout)
        .context("set up device client")?;

    let folders = discovery::fetch_scan_folders(&client);
    if folders.is_empty() {
        eprintln!("No scan folders found.");
        return Ok(ExitCode::FAILURE);
    }

    let mut prompter = Prompter::stdio();
    let selected = match pick_folder(&cli, &folders, &mut prompter)? {
        FolderPick::Chosen(folder) => folder,
        FolderPick::Unknown(name) => {
            eprintln!("Folder {} is not on the device.", name);
            return Ok(ExitCode::FAILURE);
        }
        FolderPick::Nothing => return Ok(ExitCode::SUCCESS),
    };

    if !cli.yes && !prompter.confirm(&format!("Proceed with {}?", selected.path), true)? {
        eprintln!("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let entries = listing::fetch_image_list(&client, &selected.path);
    if entries.is_empty() {
        return Ok(ExitCode::FAILURE);
    }

    let persist_dir = settings
        .save_images
        .then(|| settings.persist_dir(&selected.path));
    let mut reporter = ProgressReporter::new("download", entries.len() as u64, progress_cfg);
    let acquired = acquire::download_frames(&client, &entries, persist_dir.as_deref(), &mut reporter)?;
    reporter.finish("download complete");

    println!(
        "Download summary: folder={} frames={} / {} gaps={} duration={} saved_to={}",
        selected.path,
        acquired.frames.len(),
        entries.len(),
        acquired.gaps,
        format_duration(acquired.elapsed),
        acquired
            .persisted_dir
            .as_ref()
            .map(|p| format!("{} ({} files)", p.display(), acquired.persisted_files))
            .unwrap_or_else(|| "-".to_string()),
    );

    if acquired.frames.is_empty() {
        eprintln!("No valid frames to encode.");
        return Ok(ExitCode::FAILURE);
    }

    let default_output = settings.default_output_path(&selected.path);
    let output = match &cli.output {
        Some(path) => path.clone(),
        None if cli.yes => default_output,
        None => prompter.output_path(default_output)?,
    };

    let ok = assemble::save_video(
        &acquired.frames,
        &output,
        settings.fps,
        settings.format,
        progress_cfg,
    )?;
    if !ok {
        eprintln!("Encoding failed.");
        return Ok(ExitCode::FAILURE);
    }

    let shown = std::fs::canonicalize(&output).unwrap_or(output);
    println!("Done! Saved: {}", shown.display());
    if let Some(dir) = &acquired.persisted_dir {
        println!("Images saved in: {}", dir.display());
    }
    Ok(ExitCode::SUCCESS)
}

enum FolderPick<'a> {
    Chosen(&'a ScanFolder),
    Unknown(String),
    Nothing,
}

fn pick_folder<'a, R: std::io::BufRead, W: std::io::Write>(
    cli: &Cli,
    folders: &'a [ScanFolder],
    prompter: &mut Prompter<R, W>,
) -> Result<FolderPick<'a>> {
    if let Some(name) = &cli.folder {
        let wanted = format!("/{}", settings::folder_stem(name));
        return Ok(match folders.iter().find(|f| f.path == wanted) {
            Some(folder) => FolderPick::Chosen(folder),
            None => FolderPick::Unknown(wanted),
        });
    }
    if cli.yes {
        return Ok(folders.first().map_or(FolderPick::Nothing, FolderPick::Chosen));
    }
    Ok(prompter
        .select_folder(folders)?
        .map_or(FolderPick::Nothing, FolderPick::Chosen))
}
