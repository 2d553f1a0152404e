//! **hwenc** is a safe, ergonomic pipeline for hardware video encoding: push
//! raw frames (or render into a GPU surface) on one side, receive compressed
//! bitstream units with monotonic presentation timestamps on the other.
//!
//! The crate manages everything between the two ends:
//!
//! - a dedicated worker thread per encode session (1:1 with the hardware
//!   encoder), with a start/stop state machine and bounded-latency teardown
//! - a bounded frame queue with an explicit backpressure policy
//! - resolution-dependent encoder tuning (bitrate model, keyframe interval,
//!   rate-control mode)
//! - a pluggable [`HardwareEncoder`] boundary for platform encoder sessions,
//!   with an FFmpeg-backed implementation behind the `ffmpeg` feature
//!
//! Muxing, device enumeration, and rendering are deliberately out of scope;
//! the encoded-unit callback is the hand-off point to downstream consumers.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use hwenc::{EncodeProcessor, EncodeSessionConfig, InputMode, PixelFormat, RawFrame};
//!
//! let processor = EncodeProcessor::new(Box::new(|| Box::new(my_backend())));
//! processor.set_output_callback(|unit| sink.write(unit));
//! processor.start(
//!     EncodeSessionConfig::new(1920, 1080).set_input_mode(InputMode::Buffer),
//! )?;
//! processor.push_frame(RawFrame::new(pixels, PixelFormat::Nv12, 1920, 1080));
//! processor.stop();
//! ```
//!
//! **Feature flags**: `ffmpeg` enables [`FfmpegEncoder`](crate::ffmpeg::FfmpegEncoder),
//! a [`HardwareEncoder`] backed by `ffmpeg-next` with hardware-encoder
//! discovery and software fallback.

pub mod encode;
pub mod error;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use encode::config::{EncodeSessionConfig, InputMode};
pub use encode::encoder::{
    Codec, ColorFormat, EncoderFactory, EncoderFormat, HardwareEncoder, SurfaceHandle,
};
pub use encode::frame::{EncodedUnit, PixelFormat, RawFrame};
pub use encode::frame_queue::{FrameQueue, OverflowPolicy};
pub use encode::policy::{RateControlMode, Tuning};
pub use encode::processor::{EncodeProcessor, ProcessorOptions, SessionEvent};
pub use encode::SessionState;
pub use error::{EncoderError, Error, Result};
