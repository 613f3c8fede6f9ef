use crate::frame::Frame;
use crate::listing::ImageEntry;
use crate::progress::ProgressReporter;
use crate::remote::ImageSource;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Acquisition {
    pub frames: Vec<Frame>,
    pub gaps: usize,
    pub persisted_dir: Option<PathBuf>,
    pub persisted_files: usize,
    pub elapsed: Duration,
}

/// A failed download, decode or save drops that item and moves on. With
/// `persist_dir` set, the raw bytes of every kept frame land there under the
/// remote file name.
pub fn download_frames(
    source: &dyn ImageSource,
    entries: &[ImageEntry],
    persist_dir: Option<&Path>,
    progress: &mut ProgressReporter,
) -> Result<Acquisition> {
    if let Some(dir) = persist_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create download dir {}", dir.display()))?;
    }

    let started = Instant::now();
    let mut frames = Vec::with_capacity(entries.len());
    let mut gaps = 0usize;
    let mut persisted_files = 0usize;

    for entry in entries {
        match acquire_one(source, entry, persist_dir) {
            Ok((frame, persisted)) => {
                frames.push(frame);
                persisted_files += usize::from(persisted);
            }
            Err(err) => {
                gaps += 1;
                progress.warn(format!("Failed: {} ({:#})", entry.remote_path, err));
            }
        }
        progress.advance();
    }

    log::info!(
        "acquired {}/{} frames after {} attempts",
        frames.len(),
        entries.len(),
        progress.processed()
    );
    Ok(Acquisition {
        frames,
        gaps,
        persisted_dir: persist_dir.map(Path::to_path_buf),
        persisted_files,
        elapsed: started.elapsed(),
    })
}

fn acquire_one(
    source: &dyn ImageSource,
    entry: &ImageEntry,
    persist_dir: Option<&Path>,
) -> Result<(Frame, bool)> {
    let bytes = source
        .fetch_image(&entry.remote_path)
        .context("download")?;
    let frame = Frame::decode(&bytes)?;
    log::trace!(
        "{} -> {}x{} ({} bytes)",
        entry.remote_path,
        frame.width(),
        frame.height(),
        bytes.len()
    );

    let persisted = match persist_dir {
        Some(dir) => {
            let dst = dir.join(entry.file_name());
            std::fs::write(&dst, &bytes).with_context(|| format!("save {}", dst.display()))?;
            true
        }
        None => false,
    };
    Ok((frame, persisted))
}
