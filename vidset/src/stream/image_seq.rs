use super::*;
use image::{imageops::FilterType, DynamicImage, GenericImageView as _};

/// Reads clips stored as directories of frame images.
///
/// The clip `<id>.<ext>` is a directory whose files are the frames in file
/// name order. A frame that fails to decode ends the stream.
#[derive(Debug, Clone, Default)]
pub struct ImageSequenceSource;

impl ImageSequenceSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&self, path: &Path, shape: FrameShape) -> Result<Box<dyn FrameStream>> {
        ensure!(
            shape.channels == 1 || shape.channels == 3,
            "image sequences support 1 or 3 channels, but get {}",
            shape.channels
        );

        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("failed to open clip directory '{}'", path.display()))?
            .map(|entry| -> Result<_> {
                let entry = entry?;
                Ok(entry.file_type()?.is_file().then(|| entry.path()))
            })
            .filter_map(|result| result.transpose())
            .try_collect()?;
        files.sort();

        Ok(Box::new(ImageSequenceStream {
            files,
            cursor: 0,
            shape,
        }))
    }
}

#[derive(Debug)]
struct ImageSequenceStream {
    files: Vec<PathBuf>,
    cursor: usize,
    shape: FrameShape,
}

impl FrameStream for ImageSequenceStream {
    fn total_frames(&self) -> usize {
        self.files.len()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = match self.files.get(self.cursor) {
            Some(path) => path,
            None => return Ok(None),
        };

        let image = match image::open(path) {
            Ok(image) => image,
            Err(err) => {
                debug!("stop decoding at '{}': {}", path.display(), err);
                self.cursor = self.files.len();
                return Ok(None);
            }
        };
        self.cursor += 1;

        let frame = convert_image(image, self.shape)?;
        Ok(Some(frame))
    }
}

fn convert_image(image: DynamicImage, shape: FrameShape) -> Result<Frame> {
    let FrameShape { height, width, .. } = shape;
    let (img_w, img_h) = image.dimensions();
    let image = if (img_h as usize, img_w as usize) != (height, width) {
        image.resize_exact(width as u32, height as u32, FilterType::Triangle)
    } else {
        image
    };

    let bytes = match shape.channels {
        1 => image.into_luma8().into_raw(),
        3 => image.into_rgb8().into_raw(),
        _ => unreachable!(),
    };
    frame_from_raw(shape, bytes)
}
