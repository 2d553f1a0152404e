//! The **encode** module is the core of the crate: one hardware-backed video
//! encode stream, from raw frames in to compressed bitstream units out, with
//! correct presentation timestamps.
//!
//! # Architecture
//!
//! One dedicated worker thread per active session, 1:1 with the hardware
//! encoder, not a thread pool. The public API is callable from any thread;
//! the configure/submit/poll cycle is serialized on the worker.
//!
//! ## Key Components
//!
//! - [`EncodeProcessor`](processor::EncodeProcessor): public orchestrator,
//!   lifecycle API, callback registration, frame intake
//! - `EncodeWorker` (internal): session state machine and encode loop on a
//!   dedicated named thread
//! - [`FrameQueue`](frame_queue::FrameQueue): bounded single-consumer,
//!   multi-producer frame queue with explicit overflow policy
//! - [`policy`]: pure resolution-to-tuning functions (bitrate, keyframe
//!   interval, rate control)
//! - [`HardwareEncoder`](encoder::HardwareEncoder): the platform encoder
//!   session boundary; implement it to plug in a backend
//!
//! ## Session lifecycle
//!
//! | State | Meaning |
//! |----------|------------------------------------------------------|
//! | Idle | No session; `start()` accepted |
//! | Starting | Worker spawned, hardware configuring |
//! | Running | Encoder accepting input, loop emitting output units |
//! | Stopping | Flag flipped; hardware teardown in progress |
//! | Stopped | All session resources released |
//! | Failed | Terminal; recover with a fresh `start()` |
//!
//! The frame queue accepts pushes only while `Running`; every other push is
//! a silent, non-fatal drop.
//!
//! ## Input modes
//!
//! | Mode | Path | Color format |
//! |---------|--------------------------------------------|---------------------|
//! | Surface | Caller renders into an encoder surface | Opaque surface |
//! | Buffer | Caller pushes owned pixel buffers | Semi-planar YUV |
//!
//! In surface mode the registered surface-ready callback receives the
//! drawing surface exactly once per successful start, before the encoder
//! accepts data.
//!
//! # Example
//!
//! ```rust,ignore
//! let processor = EncodeProcessor::new(Box::new(|| Box::new(FfmpegEncoder::new())));
//!
//! processor.set_output_callback(|unit| {
//!     // runs on the worker thread for every completed unit; hand the bytes
//!     // to a muxer, do not block here
//!     muxer.write(&unit.data, unit.pts_us, unit.keyframe);
//! });
//!
//! processor.start(
//!     EncodeSessionConfig::new(1920, 1080).set_input_mode(InputMode::Buffer),
//! )?;
//!
//! processor.push_frame(RawFrame::new(pixels, PixelFormat::Nv12, 1920, 1080));
//!
//! processor.stop();
//! ```

pub mod config;
pub mod encoder;
pub mod frame;
pub mod frame_queue;
pub mod policy;
pub mod processor;
pub(crate) mod worker;

pub use worker::SessionState;
