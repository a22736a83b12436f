//! Decoded frame sources.
//!
//! A [FrameSource] opens a clip into a [FrameStream] that yields frames
//! already resized to the requested [FrameShape]. Streams own their decoder
//! state and release it when dropped.

mod image_seq;
#[cfg(feature = "opencv")]
mod opencv_;

pub use image_seq::*;
#[cfg(feature = "opencv")]
pub use opencv_::*;

use crate::common::*;

/// One decoded frame in `[height, width, channels]` layout.
pub type Frame = Array3<u8>;

/// The spatial shape of decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl FrameShape {
    pub fn num_components(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// Opens clips into frame streams.
pub trait FrameSource
where
    Self: Debug + Send + Sync,
{
    fn open(&self, path: &Path, shape: FrameShape) -> Result<Box<dyn FrameStream>>;
}

/// A stream of decoded frames from one clip.
pub trait FrameStream
where
    Self: Send,
{
    /// The number of frames the clip claims to contain. Decoding may end
    /// earlier than that.
    fn total_frames(&self) -> usize;

    /// Decode the next frame, or return `None` when the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Build a frame from interleaved pixel bytes.
pub fn frame_from_raw(shape: FrameShape, bytes: Vec<u8>) -> Result<Frame> {
    let FrameShape {
        height,
        width,
        channels,
    } = shape;
    ensure!(
        bytes.len() == shape.num_components(),
        "expect {} bytes for a {}x{}x{} frame, but get {}",
        shape.num_components(),
        height,
        width,
        channels,
        bytes.len()
    );
    let frame = Array3::from_shape_vec((height, width, channels), bytes)?;
    Ok(frame)
}
