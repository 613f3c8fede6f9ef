use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DEVICE_IP: &str = "192.168.43.133";
pub const DEFAULT_FPS: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "videos";
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum OutputFormat {
    Mp4,
    Avi,
    Mov,
    Gif,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "MP4 (MPEG-4)",
            OutputFormat::Avi => "AVI (Motion JPEG)",
            OutputFormat::Mov => "QuickTime MOV",
            OutputFormat::Gif => "Animated GIF (slower, larger)",
        }
    }

    /// Container formats are written by ffmpeg; GIF is encoded in-process.
    pub fn needs_ffmpeg(self) -> bool {
        !matches!(self, OutputFormat::Gif)
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub device: String,
    pub fps: u32,
    pub save_images: bool,
    pub format: OutputFormat,
    pub timeout: Duration,
    pub downloads_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl RunSettings {
    pub fn base_url(&self) -> String {
        device_base_url(&self.device)
    }

    pub fn persist_dir(&self, folder: &str) -> PathBuf {
        self.downloads_dir.join(folder_stem(folder))
    }

    pub fn default_output_path(&self, folder: &str) -> PathBuf {
        default_output_path(&self.output_dir, folder, self.format)
    }
}

pub fn device_base_url(device: &str) -> String {
    let device = device.trim().trim_end_matches('/');
    if device.starts_with("http://") || device.starts_with("https://") {
        device.to_string()
    } else {
        format!("http://{}", device)
    }
}

/// Non-positive or unparsable input falls back to [`DEFAULT_FPS`].
pub fn resolve_fps(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 1 => u32::try_from(n).unwrap_or(DEFAULT_FPS),
        _ => DEFAULT_FPS,
    }
}

pub fn folder_stem(folder: &str) -> &str {
    folder.trim_start_matches('/')
}

pub fn default_output_path(output_dir: &Path, folder: &str, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", folder_stem(folder), format.extension()))
}
