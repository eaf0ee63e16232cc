use std::path::Path;

use image::RgbaImage;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{ReadyState, VideoSource};

/// Presents a single still image as a live [`VideoSource`].
///
/// Every capture returns the same picture, which makes the whole sampling
/// pipeline reproducible without a camera. Captures into a frame of a
/// different size are resampled nearest-neighbour.
pub struct ImageFileSource {
    image: RgbaImage,
}

impl ImageFileSource {
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        let image = image::open(path)?.to_rgba8();
        log::info!(
            "Loaded still source {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self { image })
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }
}

impl VideoSource for ImageFileSource {
    fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.image.dimensions();
        (w > 0 && h > 0).then_some((w, h))
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn capture(&mut self, frame: &mut Frame) -> Result<(), BoxError> {
        let (src_w, src_h) = self.image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err("source image is empty".into());
        }

        let dst_w = frame.width();
        let dst_h = frame.height();
        let channels = frame.channels() as usize;
        let copied = channels.min(4);
        let data = frame.data_mut();

        for y in 0..dst_h {
            let sy = (y as u64 * src_h as u64 / dst_h as u64) as u32;
            for x in 0..dst_w {
                let sx = (x as u64 * src_w as u64 / dst_w as u64) as u32;
                let px = self.image.get_pixel(sx, sy).0;
                let offset = (y as usize * dst_w as usize + x as usize) * channels;
                data[offset..offset + copied].copy_from_slice(&px[..copied]);
            }
        }
        Ok(())
    }
}
