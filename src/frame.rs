use anyhow::{bail, Context, Result};
use image::{RgbImage, RgbaImage};

#[derive(Debug, Clone)]
pub struct Frame {
    pixels: RgbImage,
}

impl Frame {
    /// Decodes a JPEG/PNG payload. The format is sniffed from the bytes, not
    /// taken from the remote file name.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("payload is not a decodable image")?;
        Self::from_rgb(img.to_rgb8())
    }

    pub fn from_rgb(pixels: RgbImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            bail!("decoded image has no pixels");
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Packed `rgb24` bytes, what ffmpeg's rawvideo demuxer reads.
    pub fn as_rgb24(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn to_rgba(&self) -> RgbaImage {
        image::DynamicImage::ImageRgb8(self.pixels.clone()).to_rgba8()
    }
}
