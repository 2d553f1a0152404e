use std::time::Duration;

use crate::encode::frame::{EncodedUnit, RawFrame};
use crate::encode::policy::RateControlMode;
use crate::error::EncoderError;

/// Video codec selection for an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Hevc,
}

/// Color/encoding format descriptor, chosen by the session's input mode:
/// a surface-backed opaque format in zero-copy mode, semi-planar YUV in
/// buffer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// Opaque surface-backed input; the renderer draws directly into a
    /// buffer the encoder reads.
    Surface,
    /// Semi-planar YUV 4:2:0 submitted through the frame queue.
    SemiPlanarYuv,
}

/// Opaque handle to an encoder-provided drawing surface.
///
/// In surface input mode the backend creates the surface at configure time
/// and the caller renders into it to produce input. The handle wraps a raw
/// platform token and is cheap to clone; it carries no ownership of the
/// underlying surface, which lives and dies with the encoder session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceHandle {
    raw: usize,
}

impl SurfaceHandle {
    /// Wrap a raw platform surface token.
    pub fn from_raw(raw: usize) -> SurfaceHandle {
        SurfaceHandle { raw }
    }

    /// The raw platform surface token.
    pub fn as_raw(&self) -> usize {
        self.raw
    }
}

/// Fully resolved encoder session configuration, produced from an
/// [`EncodeSessionConfig`](crate::encode::config::EncodeSessionConfig) with
/// policy defaults and pending rate overrides applied. This is what a
/// backend sees; it never sees the partial caller-side config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderFormat {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    /// Target bitrate, bits/second.
    pub bitrate: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Seconds between forced keyframes.
    pub keyframe_interval_secs: u32,
    pub rate_control: RateControlMode,
    pub color: ColorFormat,
}

/// The hardware encoder session boundary.
///
/// Implementations wrap one platform encoder session and are exclusively
/// owned by the encode worker for the session's lifetime. Call order is
/// `configure` once, `start` once, then any number of `submit_frame` /
/// `poll_output` calls from the worker loop, then `stop` once.
///
/// `poll_output` takes a short timeout rather than blocking indefinitely so
/// the worker loop stays responsive to a stop request.
pub trait HardwareEncoder: Send {
    /// Configure the session. In surface mode a successful configure returns
    /// the drawing surface the caller must render into; in buffer mode it
    /// returns `None`.
    fn configure(&mut self, format: &EncoderFormat) -> Result<Option<SurfaceHandle>, EncoderError>;

    /// Start the configured session.
    fn start(&mut self) -> Result<(), EncoderError>;

    /// Submit one raw frame with its presentation timestamp (µs). Buffer
    /// mode only; surface-mode input arrives through the drawing surface
    /// outside this trait.
    fn submit_frame(&mut self, frame: &RawFrame, pts_us: i64) -> Result<(), EncoderError>;

    /// Poll the output port for one completed unit, waiting at most
    /// `timeout`. `Ok(None)` means no unit is ready.
    fn poll_output(&mut self, timeout: Duration) -> Result<Option<EncodedUnit>, EncoderError>;

    /// Stop and release the hardware session. Best-effort; the worker logs
    /// failures and considers the session stopped regardless.
    fn stop(&mut self) -> Result<(), EncoderError>;
}

/// Factory invoked by the processor on every `start()` to create a fresh
/// hardware session. A failed session is terminal, so recovery always goes
/// through a new backend instance.
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn HardwareEncoder> + Send + Sync>;
