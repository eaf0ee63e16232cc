use ndarray::ArrayView2;

/// A captured video frame: contiguous pixel bytes in row-major order.
///
/// The scheduler keeps one `Frame` alive across cycles and asks the video
/// source to overwrite it, so [`Frame::reshape`] reuses the allocation
/// whenever the dimensions are unchanged.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            byte_len(width, height, channels),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Zero-filled frame of the given size.
    pub fn blank(width: u32, height: u32, channels: u8) -> Self {
        Self::new(
            vec![0u8; byte_len(width, height, channels)],
            width,
            height,
            channels,
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Resizes the buffer in place. Pixel contents are unspecified afterwards.
    pub fn reshape(&mut self, width: u32, height: u32, channels: u8) {
        if self.width == width && self.height == height && self.channels == channels {
            return;
        }
        self.data.resize(byte_len(width, height, channels), 0);
        self.width = width;
        self.height = height;
        self.channels = channels;
    }

    /// One row per pixel, one column per channel.
    pub fn pixels(&self) -> ArrayView2<'_, u8> {
        ArrayView2::from_shape((self.pixel_count(), self.channels as usize), &self.data)
            .expect("Frame data length must match dimensions")
    }
}

fn byte_len(width: u32, height: u32, channels: u8) -> usize {
    (width as usize) * (height as usize) * (channels as usize)
}
