use super::*;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio,
};

/// Decodes video files with OpenCV.
///
/// Frames are resized with area interpolation and converted from OpenCV's
/// BGR order to RGB, or to grayscale for single channel shapes.
#[derive(Debug, Clone, Default)]
pub struct OpenCvSource;

impl OpenCvSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for OpenCvSource {
    fn open(&self, path: &Path, shape: FrameShape) -> Result<Box<dyn FrameStream>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| format_err!("non UTF-8 path '{}'", path.display()))?;
        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        ensure!(
            capture.is_opened()?,
            "unable to open video file '{}'",
            path.display()
        );

        // the frame count comes from container metadata and may overstate
        let total_frames = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;

        Ok(Box::new(OpenCvStream {
            capture,
            shape,
            total_frames,
        }))
    }
}

struct OpenCvStream {
    capture: videoio::VideoCapture,
    shape: FrameShape,
    total_frames: usize,
}

impl FrameStream for OpenCvStream {
    fn total_frames(&self) -> usize {
        self.total_frames
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let FrameShape {
            height,
            width,
            channels,
        } = self.shape;

        let mut image = Mat::default();
        match self.capture.read(&mut image) {
            Ok(true) if image.rows() > 0 => {}
            Ok(_) => return Ok(None),
            Err(err) => {
                debug!("stop decoding: {}", err);
                return Ok(None);
            }
        }

        let code = match channels {
            1 => imgproc::COLOR_BGR2GRAY,
            3 => imgproc::COLOR_BGR2RGB,
            _ => bail!("OpenCV streams support 1 or 3 channels, but get {}", channels),
        };

        match convert_frame(&image, height, width, code) {
            Ok(bytes) => {
                let frame = frame_from_raw(self.shape, bytes)?;
                Ok(Some(frame))
            }
            Err(err) => {
                debug!("stop decoding: {}", err);
                Ok(None)
            }
        }
    }
}

fn convert_frame(image: &Mat, height: usize, width: usize, code: i32) -> opencv::Result<Vec<u8>> {
    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(width as i32, height as i32),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    let mut converted = Mat::default();
    imgproc::cvt_color(&resized, &mut converted, code, 0)?;
    Ok(converted.data_bytes()?.to_vec())
}

impl Drop for OpenCvStream {
    fn drop(&mut self) {
        if let Err(err) = self.capture.release() {
            warn!("failed to release video capture: {}", err);
        }
    }
}
