use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Error type for encode pipeline operations.
///
/// Configuration errors (`InvalidDimensions`, `MissingSurfaceCallback`,
/// `UnsupportedFormat`, `WorkerSpawn`) are returned synchronously from
/// [`start`](crate::encode::processor::EncodeProcessor::start) and leave the
/// session in `Idle`. Encoder failures after the session has been handed to
/// the worker thread are never thrown across the thread boundary; they are
/// delivered asynchronously as a [`SessionEvent::Failed`](crate::encode::processor::SessionEvent)
/// notification.
#[derive(Error, Debug)]
pub enum Error {
    /// Width or height was zero. Dimensions must be positive pixel counts.
    #[error("invalid encode dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Surface input mode was requested but no surface-ready callback is
    /// registered, so the caller could never receive the drawing surface.
    #[error("surface input mode requires a surface-ready callback")]
    MissingSurfaceCallback,

    /// The backend rejected the requested output format.
    #[error("unsupported encode format: {0}")]
    UnsupportedFormat(String),

    /// The hardware encoder rejected its configuration or failed to start.
    /// Not retried automatically; hardware encoders tend to fail
    /// deterministically for a given configuration.
    #[error("encoder start failed: {0}")]
    EncoderStart(#[source] EncoderError),

    /// A submit or drain call failed persistently mid-session.
    #[error("encoder runtime failure: {0}")]
    EncoderRuntime(#[source] EncoderError),

    /// An error during stop/release. Logged by the worker, never propagated
    /// to the caller; the session counts as stopped regardless.
    #[error("encoder teardown failed: {0}")]
    Teardown(#[source] EncoderError),

    /// The dedicated encode worker thread could not be spawned.
    #[error("failed to spawn encode worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Error type at the hardware encoder boundary.
///
/// Backends return `Again` for per-call conditions that are expected to clear
/// on retry (input port momentarily full, output not ready). The worker loop
/// tolerates transient errors up to a consecutive-failure cap; everything
/// else escalates the session to `Failed`.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Transient backpressure; the call may succeed if retried.
    #[error("encoder busy, try again")]
    Again,

    /// The backend cannot satisfy the requested configuration.
    #[error("unsupported encoder configuration: {0}")]
    Unsupported(String),

    /// A session call was made before `configure` succeeded.
    #[error("encoder session not configured")]
    NotConfigured,

    /// The underlying device or codec session failed.
    #[error("encoder device error: {0}")]
    Device(String),
}

impl EncoderError {
    /// Whether the worker loop should tolerate this error and keep running.
    pub fn is_transient(&self) -> bool {
        matches!(self, EncoderError::Again)
    }
}
