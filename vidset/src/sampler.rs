//! Temporal normalization of clips with heterogeneous frame rates.
//!
//! Instead of resampling by wall-clock time, a clip with `n` frames is
//! normalized by the integer multiplier `n / depth`. The first
//! `depth * multiplier` frames are decoded and every `step * multiplier`-th
//! frame is kept, so every accepted clip yields `depth / step` frames.

use crate::{
    common::*,
    stream::{Frame, FrameShape, FrameSource},
};

/// The decoding plan of one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalPlan {
    pub native_count: usize,
    pub depth: usize,
    pub step: usize,
    pub multiplier: usize,
}

impl TemporalPlan {
    /// Plan a clip with `native_count` frames. Returns `None` if the clip is
    /// shorter than `depth`, or if `depth` or `step` is zero.
    pub fn new(native_count: usize, depth: usize, step: usize) -> Option<Self> {
        if depth == 0 || step == 0 {
            return None;
        }
        (native_count >= depth).then(|| Self {
            native_count,
            depth,
            step,
            multiplier: native_count / depth,
        })
    }

    /// The distance between two kept frames in the decoded batch.
    pub fn stride(&self) -> usize {
        self.step * self.multiplier
    }

    /// The number of leading frames that must decode.
    pub fn required_count(&self) -> usize {
        self.depth * self.multiplier
    }

    /// The number of frames kept after subsampling.
    pub fn output_depth(&self) -> usize {
        self.depth / self.step
    }

    /// Subsample a decoded batch, or return `None` if the batch has fewer
    /// than [required_count](Self::required_count) frames.
    pub fn select(&self, frames: Vec<Frame>) -> Option<Vec<Frame>> {
        if frames.len() < self.required_count() {
            return None;
        }
        let selected: Vec<_> = frames
            .into_iter()
            .take(self.required_count())
            .step_by(self.stride())
            .take(self.output_depth())
            .collect();
        debug_assert_eq!(selected.len(), self.output_depth());
        Some(selected)
    }
}

/// The reason a clip is left out of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    /// The clip has fewer frames than the target depth.
    ShortClip { native_count: usize },
    /// The stream ended before the required frames were decoded.
    TruncatedDecode { decoded: usize, required: usize },
    /// Decoding did not finish within the configured timeout.
    DecodeTimeout { decoded: usize, required: usize },
}

impl Rejection {
    /// Whether the clip was rejected after paying the decoding cost.
    pub fn is_corrupted(&self) -> bool {
        !matches!(self, Self::ShortClip { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ShortClip { native_count } => write!(f, "only {} frames", native_count),
            Self::TruncatedDecode { decoded, required } => {
                write!(f, "decoded {} of {} required frames", decoded, required)
            }
            Self::DecodeTimeout { decoded, required } => write!(
                f,
                "timed out after decoding {} of {} required frames",
                decoded, required
            ),
        }
    }
}

/// The result of extracting one clip.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOutcome {
    Accepted {
        plan: TemporalPlan,
        /// The normalized clip in `[channels, depth / step, height, width]`
        /// layout with values in `[0, 1]`.
        video: Array4<f32>,
    },
    Rejected(Rejection),
}

/// Decode and normalize the clip at `path`.
///
/// At most one stream is open during the call and it is dropped before the
/// call returns, on every path.
pub fn extract_clip(
    source: &dyn FrameSource,
    path: &Path,
    shape: FrameShape,
    depth: usize,
    step: usize,
    timeout: Option<Duration>,
) -> Result<ClipOutcome> {
    ensure!(
        depth > 0 && step > 0,
        "depth and step must be positive, but get depth {} and step {}",
        depth,
        step
    );

    let mut stream = match source.open(path, shape) {
        Ok(stream) => stream,
        Err(err) => {
            warn!("unable to open clip '{}': {:#}", path.display(), err);
            return Ok(ClipOutcome::Rejected(Rejection::ShortClip { native_count: 0 }));
        }
    };

    let native_count = stream.total_frames();
    let plan = match TemporalPlan::new(native_count, depth, step) {
        Some(plan) => plan,
        None => return Ok(ClipOutcome::Rejected(Rejection::ShortClip { native_count })),
    };
    debug!("plan {:?} for '{}'", plan, path.display());

    let required = plan.required_count();
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut frames = Vec::with_capacity(required);

    while frames.len() < required {
        if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
            return Ok(ClipOutcome::Rejected(Rejection::DecodeTimeout {
                decoded: frames.len(),
                required,
            }));
        }

        // a frame that fails to decode ends the stream
        match stream.next_frame() {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => break,
            Err(err) => {
                debug!(
                    "stop decoding '{}' at frame {}: {:#}",
                    path.display(),
                    frames.len(),
                    err
                );
                break;
            }
        }
    }
    drop(stream);

    let decoded = frames.len();
    let frames = match plan.select(frames) {
        Some(frames) => frames,
        None => {
            return Ok(ClipOutcome::Rejected(Rejection::TruncatedDecode {
                decoded,
                required,
            }))
        }
    };

    let video = frames_to_video(&frames, shape)?;
    Ok(ClipOutcome::Accepted { plan, video })
}

/// Stack frames into a `[channels, time, height, width]` array scaled to
/// `[0, 1]`.
pub fn frames_to_video(frames: &[Frame], shape: FrameShape) -> Result<Array4<f32>> {
    let FrameShape {
        height,
        width,
        channels,
    } = shape;
    frames.iter().try_for_each(|frame| {
        ensure!(
            frame.shape() == [height, width, channels],
            "expect frame shape {:?}, but get {:?}",
            [height, width, channels],
            frame.shape()
        );
        Ok(())
    })?;

    let video = Array4::from_shape_fn(
        (channels, frames.len(), height, width),
        |(c, t, h, w)| frames[t][[h, w, c]] as f32 / 255.0,
    );
    Ok(video)
}
