use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info};

use crate::encode::config::{EncodeSessionConfig, InputMode};
use crate::encode::encoder::{Codec, EncoderFactory, SurfaceHandle};
use crate::encode::frame::{EncodedUnit, RawFrame};
use crate::encode::frame_queue::{FrameQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::encode::policy;
use crate::encode::worker::{self, SessionContext, SessionState, StateCell};
use crate::error::{Error, Result};

/// Capacity of the session event channel. Events are lifecycle-rate, not
/// frame-rate; a receiver that falls this far behind loses the oldest news.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Immutable per-processor constants, replacing what the original design
/// kept as process-wide statics so the component stays testable in
/// isolation.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Codec requested from the encoder backend.
    pub codec: Codec,
    /// Frame rate used when neither config nor a pending override names one.
    pub default_frame_rate: u32,
    /// Frame queue bound (buffer input mode).
    pub queue_capacity: usize,
    /// What happens to frames arriving at a full queue.
    pub overflow_policy: OverflowPolicy,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        ProcessorOptions {
            codec: Codec::H264,
            default_frame_rate: policy::DEFAULT_FRAME_RATE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Asynchronous session notifications delivered on the channel returned by
/// [`EncodeProcessor::events`].
///
/// `Failed` is the session-error path: errors that happen after `start()`
/// has returned are never thrown across the worker thread boundary, they
/// arrive here. A failed session yields no further encoded units and
/// requires an explicit new `start()`; there is no silent resurrection.
#[derive(Debug)]
pub enum SessionEvent {
    /// The hardware encoder is configured, started, and accepting input.
    Started,
    /// The session moved to `Failed`, either during startup
    /// ([`Error::EncoderStart`]) or mid-loop ([`Error::EncoderRuntime`]).
    Failed(Error),
    /// `stop()` completed and all session resources are released.
    Stopped,
}

type SurfaceReadyCallback = Box<dyn FnMut(SurfaceHandle) + Send>;
type OutputCallback = Box<dyn FnMut(EncodedUnit) + Send>;

/// Single-slot callback registrations shared with the worker thread.
///
/// Each slot holds at most one callback; registering again replaces the
/// previous one (last-writer-wins, no fan-out).
#[derive(Default)]
pub(crate) struct CallbackSlots {
    pub(crate) surface_ready: Mutex<Option<SurfaceReadyCallback>>,
    pub(crate) output: Mutex<Option<OutputCallback>>,
}

#[derive(Default)]
struct PendingRates {
    bitrate: Option<u32>,
    frame_rate: Option<u32>,
}

/// Public-facing orchestrator for one hardware encode stream.
///
/// Owns the frame queue and the per-session worker thread, and exposes the
/// lifecycle API: [`start`](Self::start), [`stop`](Self::stop),
/// [`push_frame`](Self::push_frame), [`acquire_draw_surface`](Self::acquire_draw_surface),
/// [`set_encode_rate`](Self::set_encode_rate). All methods are callable from
/// any thread, concurrently with the encode loop.
///
/// The hardware encoder itself is created through the factory passed at
/// construction, once per `start()`: a failed hardware session is never
/// reused.
///
/// # Example
///
/// ```rust,ignore
/// let processor = EncodeProcessor::new(Box::new(|| Box::new(FfmpegEncoder::new())));
/// processor.set_output_callback(|unit| muxer.write(unit));
/// processor.start(
///     EncodeSessionConfig::new(1920, 1080).set_input_mode(InputMode::Buffer),
/// )?;
/// processor.push_frame(frame);
/// processor.stop();
/// ```
pub struct EncodeProcessor {
    options: ProcessorOptions,
    factory: EncoderFactory,
    state: Arc<StateCell>,
    queue: Arc<FrameQueue>,
    callbacks: Arc<CallbackSlots>,
    surface: Arc<Mutex<Option<SurfaceHandle>>>,
    session_mode: Mutex<Option<InputMode>>,
    pending_rates: Mutex<PendingRates>,
    worker: Mutex<Option<JoinHandle<()>>>,
    events_tx: crossbeam_channel::Sender<SessionEvent>,
    events_rx: crossbeam_channel::Receiver<SessionEvent>,
}

impl EncodeProcessor {
    /// Create a processor with default [`ProcessorOptions`].
    pub fn new(factory: EncoderFactory) -> EncodeProcessor {
        Self::with_options(factory, ProcessorOptions::default())
    }

    pub fn with_options(factory: EncoderFactory, options: ProcessorOptions) -> EncodeProcessor {
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        EncodeProcessor {
            queue: Arc::new(FrameQueue::new(
                options.queue_capacity,
                options.overflow_policy,
            )),
            options,
            factory,
            state: Arc::new(StateCell::new(SessionState::Idle)),
            callbacks: Arc::new(CallbackSlots::default()),
            surface: Arc::new(Mutex::new(None)),
            session_mode: Mutex::new(None),
            pending_rates: Mutex::new(PendingRates::default()),
            worker: Mutex::new(None),
            events_tx,
            events_rx,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// A receiver for asynchronous [`SessionEvent`] notifications.
    pub fn events(&self) -> crossbeam_channel::Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Register the surface-ready sink. Surface input mode only; invoked
    /// exactly once per successful `start()`, before the encoder begins
    /// accepting data. Registering again replaces the previous callback.
    pub fn set_surface_ready_callback(
        &self,
        callback: impl FnMut(SurfaceHandle) + Send + 'static,
    ) {
        *self.callbacks.surface_ready.lock().unwrap() = Some(Box::new(callback));
    }

    /// Register the encoded-unit output sink, replacing any previous one.
    ///
    /// The callback runs inline on the worker thread for every completed
    /// unit; a consumer that blocks here stalls the encode loop.
    pub fn set_output_callback(&self, callback: impl FnMut(EncodedUnit) + Send + 'static) {
        *self.callbacks.output.lock().unwrap() = Some(Box::new(callback));
    }

    /// Stash bitrate/frame-rate overrides for the *next* session.
    ///
    /// A live session is never reconfigured; the stored values replace any
    /// previously stashed pair and are applied when `start()` next resolves
    /// its configuration.
    pub fn set_encode_rate(&self, bitrate: Option<u32>, frame_rate: Option<u32>) {
        let mut pending = self.pending_rates.lock().unwrap();
        pending.bitrate = bitrate;
        pending.frame_rate = frame_rate;
    }

    /// Start an encode session.
    ///
    /// Synchronous failures (invalid dimensions, surface mode without a
    /// surface-ready callback, worker spawn failure) are returned directly
    /// and leave no session behind. Hardware configure/start failures are
    /// asynchronous: `start` returns `Ok` and the session later reports
    /// [`SessionEvent::Failed`] and settles in `Failed`.
    ///
    /// Idempotent: calling `start` while a session is starting or running is
    /// a no-op and creates no second encoder session.
    pub fn start(&self, config: EncodeSessionConfig) -> Result<()> {
        match self.state.load() {
            SessionState::Starting | SessionState::Running => {
                debug!("start ignored, session already active");
                return Ok(());
            }
            _ => {}
        }

        config.validate()?;
        if config.input_mode == InputMode::Surface
            && self.callbacks.surface_ready.lock().unwrap().is_none()
        {
            return Err(Error::MissingSurfaceCallback);
        }

        // Claim the session slot; a concurrent start() loses quietly.
        let claimed = [
            SessionState::Idle,
            SessionState::Stopped,
            SessionState::Failed,
        ]
        .iter()
        .any(|&from| self.state.transition(from, SessionState::Starting));
        if !claimed {
            debug!("start ignored, lost the claim to a concurrent caller");
            return Ok(());
        }

        // A previous worker (stopped or failed) has exited its loop by now;
        // reap the handle before spawning a fresh one.
        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                error!("previous encode worker thread panicked");
            }
        }

        let (pending_bitrate, pending_frame_rate) = {
            let pending = self.pending_rates.lock().unwrap();
            (pending.bitrate, pending.frame_rate)
        };
        let format = config.resolve(
            self.options.codec,
            self.options.default_frame_rate,
            pending_bitrate,
            pending_frame_rate,
        );
        info!(
            "starting encode session: {}x{}, {:?} input, {} b/s target",
            format.width, format.height, config.input_mode, format.bitrate
        );

        *self.session_mode.lock().unwrap() = Some(config.input_mode);
        *self.surface.lock().unwrap() = None;

        let ctx = SessionContext {
            encoder: (self.factory)(),
            format,
            state: self.state.clone(),
            queue: self.queue.clone(),
            callbacks: self.callbacks.clone(),
            surface: self.surface.clone(),
            events: self.events_tx.clone(),
        };
        match worker::spawn(ctx) {
            Ok(handle) => {
                *self.worker.lock().unwrap() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.store(SessionState::Idle);
                *self.session_mode.lock().unwrap() = None;
                Err(Error::WorkerSpawn(e))
            }
        }
    }

    /// Stop the session and release every resource, best-effort.
    ///
    /// Always completes: teardown errors are logged by the worker and never
    /// surface here. A no-op when no session exists. After `stop` returns
    /// the queue is empty and pushes are no-ops until a new `start()`
    /// succeeds.
    pub fn stop(&self) {
        match self.state.load() {
            SessionState::Idle | SessionState::Stopped => return,
            _ => {}
        }

        // Flip the flag first so the loop observes it promptly, then wake
        // any drain blocked on the empty queue.
        self.state
            .transition(SessionState::Starting, SessionState::Stopping);
        self.state
            .transition(SessionState::Running, SessionState::Stopping);
        self.queue.close();

        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                error!("encode worker thread panicked during stop");
            }
        }
        // The worker cleared on its way out; cover the path where it never
        // got to run.
        self.queue.clear();

        *self.session_mode.lock().unwrap() = None;
        *self.surface.lock().unwrap() = None;

        // A failed session stays failed; everything else is now stopped.
        if self
            .state
            .transition(SessionState::Stopping, SessionState::Stopped)
        {
            if let Err(e) = self.events_tx.try_send(SessionEvent::Stopped) {
                debug!("session event dropped, receiver not keeping up: {e}");
            }
            info!("encode session stopped");
        }
    }

    /// Push one raw frame for encoding. Buffer input mode only.
    ///
    /// Returns whether the frame entered the queue. A `false` is a silent
    /// no-op, not an error: surface-mode sessions, missing sessions, and
    /// sessions that are not `Running` all drop the frame. The caller does
    /// not need to track encoder lifecycle to feed frames.
    pub fn push_frame(&self, frame: RawFrame) -> bool {
        match *self.session_mode.lock().unwrap() {
            Some(InputMode::Buffer) => {}
            _ => return false,
        }
        self.queue.push(frame)
    }

    /// The drawing surface supplied by the most recent successful `start()`.
    ///
    /// Surface input mode only; `None` before the surface-ready callback has
    /// fired, in buffer mode, and after `stop()`.
    pub fn acquire_draw_surface(&self) -> Option<SurfaceHandle> {
        self.surface.lock().unwrap().clone()
    }

    /// Frames dropped so far by the queue gate or overflow policy.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped_frames()
    }
}

impl Drop for EncodeProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}
