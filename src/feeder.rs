use std::iter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use tracing::{debug, info};

use crate::types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputType {
    Image,
    Cam,
    Video,
}

/// An opened source of RGB frames
pub trait FrameSource {
    /// `(width, height)` of the frames this source yields
    fn input_shape(&self) -> (u32, u32);
    /// `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;
    fn close(&mut self) {}
}

pub struct InputFeeder {
    input_type: InputType,
    path: Option<PathBuf>,
    cam_index: usize,
    source: Option<Box<dyn FrameSource>>,
}

impl InputFeeder {
    pub fn new(input_type: InputType, path: Option<&Path>, cam_index: usize) -> Result<Self> {
        if input_type != InputType::Cam && path.is_none() {
            bail!("An input file is required for {:?} input", input_type);
        }
        Ok(Self {
            input_type,
            path: path.map(Path::to_path_buf),
            cam_index,
            source: None,
        })
    }

    /// Feeder over an already opened source
    pub fn with_source(input_type: InputType, source: Box<dyn FrameSource>) -> Self {
        Self {
            input_type,
            path: None,
            cam_index: 0,
            source: Some(source),
        }
    }

    pub fn load_data(&mut self) -> Result<()> {
        let source: Box<dyn FrameSource> = match self.input_type {
            InputType::Image => Box::new(ImageSource::open(self.require_path()?)?),
            InputType::Video => open_video(self.require_path()?)?,
            InputType::Cam => open_camera(self.cam_index)?,
        };
        let (w, h) = source.input_shape();
        info!("Opened {:?} input ({}x{})", self.input_type, w, h);
        self.source = Some(source);
        Ok(())
    }

    fn require_path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| anyhow!("No input file given"))
    }

    pub fn input_shape(&self) -> Option<(u32, u32)> {
        self.source.as_ref().map(|s| s.input_shape())
    }

    /// Lazily yields frames until the source runs dry. An error is yielded
    /// once and ends the sequence.
    pub fn next_batch(&mut self) -> impl Iterator<Item = Result<Frame>> + '_ {
        let mut done = false;
        iter::from_fn(move || {
            if done {
                return None;
            }
            let next = match self.source.as_mut() {
                Some(source) => source.next_frame().transpose(),
                None => Some(Err(anyhow!("Input source is not open, call load_data first"))),
            };
            if !matches!(next, Some(Ok(_))) {
                done = true;
            }
            next
        })
    }

    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            debug!("Closed {:?} input", self.input_type);
        }
    }
}

impl Drop for InputFeeder {
    fn drop(&mut self) {
        self.close();
    }
}

/// A still image, yielded exactly once
pub struct ImageSource {
    frame: Option<Frame>,
    shape: (u32, u32),
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let frame = image::open(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?
            .to_rgb8();
        Ok(Self::from_frame(frame))
    }

    pub fn from_frame(frame: Frame) -> Self {
        let shape = frame.dimensions();
        Self {
            frame: Some(frame),
            shape,
        }
    }
}

impl FrameSource for ImageSource {
    fn input_shape(&self) -> (u32, u32) {
        self.shape
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }

    fn close(&mut self) {
        self.frame = None;
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: usize) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::camera::CameraSource::new(index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: usize) -> Result<Box<dyn FrameSource>> {
    bail!("Camera input requires building with the `camera` feature")
}

#[cfg(feature = "video")]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(video::VideoSource::open(path)?))
}

#[cfg(not(feature = "video"))]
fn open_video(_path: &Path) -> Result<Box<dyn FrameSource>> {
    bail!("Video input requires building with the `video` feature")
}

#[cfg(feature = "video")]
mod video {
    use std::path::Path;

    use anyhow::{anyhow, Context, Result};
    use gstreamer as gst;
    use gstreamer::prelude::*;
    use gstreamer_app as gst_app;
    use tracing::warn;

    use super::FrameSource;
    use crate::types::Frame;

    const PIPELINE: &str = "filesrc name=src ! decodebin ! videoconvert \
        ! video/x-raw,format=RGB ! appsink name=sink sync=false";

    /// Decodes a video file through an appsink, one RGB frame per sample
    pub struct VideoSource {
        pipeline: gst::Pipeline,
        sink: gst_app::AppSink,
        shape: (u32, u32),
        pending: Option<Frame>,
    }

    impl VideoSource {
        pub fn open(path: &Path) -> Result<Self> {
            if !path.is_file() {
                return Err(anyhow!("Video file not found: {}", path.display()));
            }
            gst::init()?;

            let pipeline = gst::parse::launch(PIPELINE)?
                .downcast::<gst::Pipeline>()
                .map_err(|_| anyhow!("Decoder is not a pipeline"))?;
            let src = pipeline
                .by_name("src")
                .ok_or_else(|| anyhow!("Decoder has no source element"))?;
            src.set_property("location", path.to_string_lossy().as_ref());
            let sink = pipeline
                .by_name("sink")
                .ok_or_else(|| anyhow!("Decoder has no sink element"))?
                .downcast::<gst_app::AppSink>()
                .map_err(|_| anyhow!("Sink is not an appsink"))?;

            pipeline
                .set_state(gst::State::Playing)
                .context("Failed to start video decoding")?;

            let mut source = Self {
                pipeline,
                sink,
                shape: (0, 0),
                pending: None,
            };
            // the first sample fixes the frame size
            let first = source
                .pull()?
                .ok_or_else(|| anyhow!("Video {} has no frames", path.display()))?;
            source.shape = first.dimensions();
            source.pending = Some(first);
            Ok(source)
        }

        fn pull(&mut self) -> Result<Option<Frame>> {
            if self.sink.is_eos() {
                return Ok(None);
            }
            let sample = match self.sink.pull_sample() {
                Ok(sample) => sample,
                Err(_) if self.sink.is_eos() => return Ok(None),
                Err(e) => return Err(anyhow!("Failed to decode video frame: {e}")),
            };

            let caps = sample.caps().ok_or_else(|| anyhow!("Sample without caps"))?;
            let s = caps
                .structure(0)
                .ok_or_else(|| anyhow!("Caps without structure"))?;
            let dim = |name: &str| {
                s.get::<i32>(name)
                    .map(|v| v as u32)
                    .map_err(|e| anyhow!("Caps without {name}: {e}"))
            };
            let (width, height) = (dim("width")?, dim("height")?);

            let buffer = sample.buffer().ok_or_else(|| anyhow!("Sample without buffer"))?;
            let map = buffer.map_readable()?;
            Ok(Some(rgb_frame(map.as_slice(), width, height)?))
        }
    }

    /// Packs rows padded to 4-byte boundaries into a tight RGB image
    fn rgb_frame(data: &[u8], width: u32, height: u32) -> Result<Frame> {
        let row = width as usize * 3;
        let stride = (row + 3) & !3;
        if width == 0 || height == 0 || data.len() < stride * (height as usize - 1) + row {
            return Err(anyhow!("Video buffer too small for {}x{}", width, height));
        }
        let mut pixels = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            pixels.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        Frame::from_raw(width, height, pixels).ok_or_else(|| anyhow!("Invalid frame size"))
    }

    impl FrameSource for VideoSource {
        fn input_shape(&self) -> (u32, u32) {
            self.shape
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if let Some(frame) = self.pending.take() {
                return Ok(Some(frame));
            }
            self.pull()
        }

        fn close(&mut self) {
            if let Err(e) = self.pipeline.set_state(gst::State::Null) {
                warn!("Failed to stop video decoding: {}", e);
            }
        }
    }
}
