use crate::frame::Frame;
use crate::progress::{format_duration, ProgressConfig, ProgressReporter};
use crate::settings::OutputFormat;
use crate::util;

use anyhow::{bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::Delay;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::rc::Rc;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerCodec {
    pub muxer: &'static str,
    pub encoder: &'static str,
    pub fourcc: &'static str,
    pub pix_fmt: &'static str,
}

const MPEG4_MP4: ContainerCodec = ContainerCodec {
    muxer: "mp4",
    encoder: "mpeg4",
    fourcc: "mp4v",
    pix_fmt: "yuv420p",
};
const MJPEG_AVI: ContainerCodec = ContainerCodec {
    muxer: "avi",
    encoder: "mjpeg",
    fourcc: "MJPG",
    pix_fmt: "yuvj420p",
};
const MPEG4_MOV: ContainerCodec = ContainerCodec {
    muxer: "mov",
    encoder: "mpeg4",
    fourcc: "mp4v",
    pix_fmt: "yuv420p",
};

pub fn codec_for(format: OutputFormat) -> Option<ContainerCodec> {
    match format {
        OutputFormat::Mp4 => Some(MPEG4_MP4),
        OutputFormat::Avi => Some(MJPEG_AVI),
        OutputFormat::Mov => Some(MPEG4_MOV),
        OutputFormat::Gif => None,
    }
}

pub enum FrameSink {
    Gif(GifSink),
    Container(ContainerSink),
}

impl FrameSink {
    pub fn open(format: OutputFormat, path: &Path, fps: u32, dims: (u32, u32)) -> Result<Self> {
        match codec_for(format) {
            None => Ok(FrameSink::Gif(GifSink::open(path, fps, dims)?)),
            Some(codec) => Ok(FrameSink::Container(ContainerSink::open(
                path, codec, fps, dims,
            )?)),
        }
    }

    pub fn append(&mut self, frame: &Frame) -> Result<()> {
        let expected = match self {
            FrameSink::Gif(sink) => sink.dims,
            FrameSink::Container(sink) => sink.dims,
        };
        if frame.dimensions() != expected {
            bail!(
                "frame is {}x{} but the output was opened at {}x{}",
                frame.width(),
                frame.height(),
                expected.0,
                expected.1
            );
        }
        match self {
            FrameSink::Gif(sink) => sink.append(frame),
            FrameSink::Container(sink) => sink.append(frame),
        }
    }

    pub fn finalize(self) -> Result<()> {
        match self {
            FrameSink::Gif(sink) => sink.finalize(),
            FrameSink::Container(sink) => sink.finalize(),
        }
    }
}

pub struct GifSink {
    encoder: GifEncoder<GifBuffer>,
    buffer: GifBuffer,
    delay: Delay,
    dims: (u32, u32),
    path: PathBuf,
}

// Shared with the encoder so the bytes can be taken back once it has
// written the trailer.
#[derive(Clone, Default)]
struct GifBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for GifBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl GifSink {
    fn open(path: &Path, fps: u32, dims: (u32, u32)) -> Result<Self> {
        File::create(path).with_context(|| format!("create {}", path.display()))?;
        let buffer = GifBuffer::default();
        let mut encoder = GifEncoder::new_with_speed(buffer.clone(), 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .context("write GIF header")?;
        Ok(Self {
            encoder,
            buffer,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            dims,
            path: path.to_path_buf(),
        })
    }

    fn append(&mut self, frame: &Frame) -> Result<()> {
        // The GIF encoder quantizes from RGBA.
        let rgba = frame.to_rgba();
        self.encoder
            .encode_frame(image::Frame::from_parts(rgba, 0, 0, self.delay))
            .with_context(|| format!("append GIF frame to {}", self.path.display()))
    }

    fn finalize(self) -> Result<()> {
        // Dropping the encoder writes the trailer.
        drop(self.encoder);
        let bytes = self.buffer.0.take();
        std::fs::write(&self.path, &bytes)
            .with_context(|| format!("write {} ({} bytes)", self.path.display(), bytes.len()))
    }
}

pub struct ContainerSink {
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<Vec<String>>>,
    dims: (u32, u32),
    path: PathBuf,
}

impl ContainerSink {
    fn open(path: &Path, codec: ContainerCodec, fps: u32, dims: (u32, u32)) -> Result<Self> {
        // ffmpeg only touches the output after the first frame arrives; check
        // the path is writable before handing it over.
        File::create(path).with_context(|| format!("create {}", path.display()))?;

        let (w, h) = dims;
        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", w, h))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("pipe:0")
            .arg("-an")
            .arg("-c:v")
            .arg(codec.encoder)
            .arg("-tag:v")
            .arg(codec.fourcc)
            .arg("-pix_fmt")
            .arg(codec.pix_fmt)
            .arg("-q:v")
            .arg("3")
            .arg("-f")
            .arg(codec.muxer)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn ffmpeg for {}", path.display()))?;

        let stderr = child.stderr.take().map(util::spawn_stderr_collector);
        let stdin = child.stdin.take().context("ffmpeg stdin missing")?;
        log::debug!(
            "ffmpeg writing {} {}x{} @{}fps with {}/{}",
            path.display(),
            w,
            h,
            fps,
            codec.encoder,
            codec.fourcc
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(BufWriter::with_capacity(4 * 1024 * 1024, stdin)),
            stderr,
            dims,
            path: path.to_path_buf(),
        })
    }

    fn append(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self.stdin.as_mut().context("ffmpeg stdin already closed")?;
        if let Err(err) = stdin.write_all(frame.as_rgb24()) {
            let tail = self.abort();
            bail!(
                "ffmpeg stopped accepting frames for {}: {} stderr_tail={}",
                self.path.display(),
                err,
                tail
            );
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().context("flush frames to ffmpeg")?;
        }
        let mut child = self.child.take().context("ffmpeg already reaped")?;
        let status = child.wait().context("wait for ffmpeg")?;
        let lines = self.collect_stderr();
        if !status.success() {
            bail!(
                "ffmpeg encode failed output={} status={} stderr_tail={}",
                self.path.display(),
                status,
                util::stderr_tail(&lines)
            );
        }
        Ok(())
    }

    fn abort(&mut self) -> String {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        util::stderr_tail(&self.collect_stderr())
    }

    fn collect_stderr(&mut self) -> Vec<String> {
        self.stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ContainerSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            let _ = self.abort();
        }
    }
}

/// `Ok(false)` means nothing was encoded: no frames, or the output could not
/// be opened. A failure after frames started flowing, including the final
/// write, comes back as `Err`.
pub fn save_video(
    frames: &[Frame],
    output: &Path,
    fps: u32,
    format: OutputFormat,
    progress: ProgressConfig,
) -> Result<bool> {
    let Some(first) = frames.first() else {
        eprintln!("No frames to encode.");
        return Ok(false);
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }

    eprintln!(
        "Encoding {} frames to {} ({})",
        frames.len(),
        output.display(),
        format.description()
    );

    let mut sink = match FrameSink::open(format, output, fps, first.dimensions()) {
        Ok(sink) => sink,
        Err(err) => {
            log::error!("open writer for {}: {:#}", output.display(), err);
            eprintln!("Video writer failed: {:#}", err);
            return Ok(false);
        }
    };

    let mut reporter = ProgressReporter::new("encode", frames.len() as u64, progress);
    for (idx, frame) in frames.iter().enumerate() {
        sink.append(frame)
            .with_context(|| format!("append frame {}", idx))?;
        reporter.advance();
    }
    sink.finalize()?;
    let outcome = reporter.finish("encode complete");

    println!(
        "Encode summary: output={} format={} frames={} fps={} size={}x{} duration={} rate={:.1} frames/s",
        output.display(),
        format.extension(),
        outcome.processed_items,
        fps,
        first.width(),
        first.height(),
        format_duration(outcome.elapsed),
        outcome.items_per_sec
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressMode;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgb, RgbImage};
    use std::io::BufReader;
    use tempfile::TempDir;

    fn ffmpeg_available() -> bool {
        util::ensure_ffmpeg_available().is_ok()
    }

    fn frames(count: usize, w: u32, h: u32) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let shade = (i * 25 % 256) as u8;
                Frame::from_rgb(RgbImage::from_pixel(w, h, Rgb([shade, 255 - shade, 64])))
                    .expect("frame")
            })
            .collect()
    }

    fn quiet() -> ProgressConfig {
        ProgressConfig::new(ProgressMode::Quiet)
    }

    #[test]
    fn codec_table_covers_container_formats_only() {
        assert_eq!(codec_for(OutputFormat::Mp4).map(|c| c.fourcc), Some("mp4v"));
        assert_eq!(codec_for(OutputFormat::Avi).map(|c| c.fourcc), Some("MJPG"));
        assert_eq!(codec_for(OutputFormat::Mov).map(|c| c.fourcc), Some("mp4v"));
        assert_eq!(codec_for(OutputFormat::Gif), None);
    }

    #[test]
    fn empty_frames_fail_without_writing() {
        let tmp = TempDir::new().expect("tempdir");
        for format in [
            OutputFormat::Mp4,
            OutputFormat::Avi,
            OutputFormat::Mov,
            OutputFormat::Gif,
        ] {
            let out = tmp.path().join("nested").join(format!("empty.{}", format.extension()));
            let ok = save_video(&[], &out, 10, format, quiet()).expect("no error");
            assert!(!ok);
            assert!(!out.exists());
        }
        assert!(!tmp.path().join("nested").exists());
    }

    #[test]
    fn gif_holds_every_frame() {
        let tmp = TempDir::new().expect("tempdir");
        let out = tmp.path().join("videos").join("scan_1.gif");

        let ok = save_video(&frames(10, 24, 16), &out, 5, OutputFormat::Gif, quiet())
            .expect("encode gif");
        assert!(ok);

        let file = BufReader::new(File::open(&out).expect("open gif"));
        let decoded = GifDecoder::new(file)
            .expect("gif decoder")
            .into_frames()
            .collect_frames()
            .expect("decode gif frames");
        assert_eq!(decoded.len(), 10);
        assert_eq!(decoded[0].buffer().dimensions(), (24, 16));
        let (numer, denom) = decoded[0].delay().numer_denom_ms();
        assert_eq!(numer / denom, 200);
    }

    #[test]
    fn mismatched_frame_size_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let out = tmp.path().join("mixed.gif");
        let mut mixed = frames(2, 16, 16);
        mixed.extend(frames(1, 8, 8));

        let err = save_video(&mixed, &out, 10, OutputFormat::Gif, quiet())
            .expect_err("size mismatch must fail");
        assert!(format!("{err:#}").contains("8x8"), "{err:#}");
    }

    #[test]
    fn unopenable_output_reports_failure() {
        let tmp = TempDir::new().expect("tempdir");
        // A directory where the file should be.
        let out = tmp.path().join("taken.gif");
        std::fs::create_dir_all(&out).expect("mkdir");

        let ok = save_video(&frames(3, 8, 8), &out, 10, OutputFormat::Gif, quiet())
            .expect("open failure is not an error");
        assert!(!ok);
    }

    #[test]
    fn failed_gif_write_is_an_error() {
        // Opens fine, refuses every write with ENOSPC.
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let err = save_video(&frames(5, 32, 32), full, 10, OutputFormat::Gif, quiet())
            .expect_err("short write must not report success");
        assert!(format!("{err:#}").contains("/dev/full"), "{err:#}");
    }

    #[test]
    fn avi_output_is_written() {
        if !ffmpeg_available() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        let out = tmp.path().join("scan_1.avi");

        let ok = save_video(&frames(10, 64, 48), &out, 10, OutputFormat::Avi, quiet())
            .expect("encode avi");
        assert!(ok);
        let len = std::fs::metadata(&out).expect("stat avi").len();
        assert!(len > 0);
    }

    #[test]
    fn container_frame_count_matches_input() {
        if !ffmpeg_available() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        for format in [OutputFormat::Mp4, OutputFormat::Avi, OutputFormat::Mov] {
            let out = tmp.path().join(format!("clip.{}", format.extension()));
            let ok = save_video(&frames(12, 64, 48), &out, 12, format, quiet())
                .expect("encode container");
            assert!(ok);

            let probe = Command::new("ffprobe")
                .args([
                    "-v",
                    "error",
                    "-select_streams",
                    "v:0",
                    "-count_frames",
                    "-show_entries",
                    "stream=nb_read_frames",
                    "-of",
                    "csv=p=0",
                ])
                .arg(&out)
                .output();
            let Ok(probe) = probe else {
                return;
            };
            let count = String::from_utf8_lossy(&probe.stdout).trim().to_string();
            assert_eq!(count, "12", "{} frame count", format.extension());
        }
    }
}
