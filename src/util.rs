use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::Command;
use std::thread::JoinHandle;

pub fn ensure_ffmpeg_available() -> Result<()> {
    let out = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .context("failed to run ffmpeg -version")?;
    if !out.status.success() {
        bail!("ffmpeg exists but returned non-zero on -version");
    }
    Ok(())
}

pub fn spawn_stderr_collector(stderr: impl Read + Send + 'static) -> JoinHandle<Vec<String>> {
    std::thread::spawn(move || {
        let mut lines = VecDeque::new();
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line).unwrap_or(0);
            if read == 0 {
                break;
            }
            let cleaned = line.trim().to_string();
            if cleaned.is_empty() {
                continue;
            }
            lines.push_back(cleaned);
            if lines.len() > 20 {
                lines.pop_front();
            }
        }

        lines.into_iter().collect::<Vec<_>>()
    })
}

pub fn stderr_tail(lines: &[String]) -> String {
    if lines.is_empty() {
        "<no ffmpeg stderr>".to_string()
    } else {
        lines.join(" | ")
    }
}
