//! PNG frame output.

use std::error::Error;
use std::path::PathBuf;

use csgray_scene::{FrameSink, FrameView};
use image::{Rgb, RgbImage};

/// Writes each saved frame to `<dir>/<prefix><seq>.png`.
pub struct PngSink {
    dir: PathBuf,
    prefix: String,
    written: Vec<PathBuf>,
}

impl PngSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            written: Vec::new(),
        }
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{}{:05}.png", self.prefix, seq))
    }
}

/// Convert a packed `0x00RRGGBB` frame to an RGB image.
pub fn to_image(frame: &FrameView<'_>) -> RgbImage {
    RgbImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        let p = frame.pixel(x as usize, y as usize);
        Rgb([(p >> 16) as u8, (p >> 8) as u8, p as u8])
    })
}

impl FrameSink for PngSink {
    fn write_frame(&mut self, seq: u64, frame: &FrameView<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(seq);
        to_image(frame).save(&path)?;
        log::debug!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_image_unpacks_channels_and_skips_padding() {
        // 2x2 visible, rows padded to 4.
        let pixels = [0x00ff0000, 0x0000ff00, 0xdead, 0xbeef, 0x000000ff, 0x00102030, 0xdead, 0xbeef];
        let frame = FrameView {
            width: 2,
            height: 2,
            x_row: 4,
            pixels: &pixels,
        };
        let img = to_image(&frame);
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 255, 0]));
        assert_eq!(img.get_pixel(0, 1), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([0x10, 0x20, 0x30]));
    }

    #[test]
    fn test_frame_names_are_zero_padded() {
        let sink = PngSink::new("out", "frame_");
        assert_eq!(sink.path(7), PathBuf::from("out").join("frame_00007.png"));
    }
}
