// src/encode/worker.rs - Encode session worker
//
// One dedicated thread per active session (1:1 with the hardware encoder).
// The worker owns the encoder handle for the session's lifetime and runs:
// configure -> start -> drain/submit/poll loop -> stop -> release.
//
// The session flag is flipped before any hardware teardown happens, closing
// the window where a late push could reach an already-released encoder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::encode::encoder::{ColorFormat, EncoderFormat, HardwareEncoder, SurfaceHandle};
use crate::encode::frame_queue::FrameQueue;
use crate::encode::processor::{CallbackSlots, SessionEvent};
use crate::error::{EncoderError, Error};

/// How long a single drain wait on an empty queue lasts before the loop
/// re-checks session state.
const DRAIN_WAIT: Duration = Duration::from_millis(10);

/// Output-port poll timeout. Short so teardown latency stays bounded.
const OUTPUT_POLL_WAIT: Duration = Duration::from_millis(10);

/// Consecutive transient failures tolerated before the session is declared
/// failed.
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

const WORKER_THREAD_NAME: &str = "hwenc-session-worker";

/// Lifecycle state of one encode session.
///
/// `Failed` is terminal for the session; the processor recovers by creating
/// a fresh encoder instance on the next `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

const STATE_IDLE: usize = 0;
const STATE_STARTING: usize = 1;
const STATE_RUNNING: usize = 2;
const STATE_STOPPING: usize = 3;
const STATE_STOPPED: usize = 4;
const STATE_FAILED: usize = 5;

impl SessionState {
    fn as_usize(self) -> usize {
        match self {
            SessionState::Idle => STATE_IDLE,
            SessionState::Starting => STATE_STARTING,
            SessionState::Running => STATE_RUNNING,
            SessionState::Stopping => STATE_STOPPING,
            SessionState::Stopped => STATE_STOPPED,
            SessionState::Failed => STATE_FAILED,
        }
    }

    fn from_usize(value: usize) -> SessionState {
        match value {
            STATE_IDLE => SessionState::Idle,
            STATE_STARTING => SessionState::Starting,
            STATE_RUNNING => SessionState::Running,
            STATE_STOPPING => SessionState::Stopping,
            STATE_STOPPED => SessionState::Stopped,
            _ => SessionState::Failed,
        }
    }
}

/// Atomic session state shared between the public API and the worker thread.
pub(crate) struct StateCell(AtomicUsize);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> StateCell {
        StateCell(AtomicUsize::new(state.as_usize()))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_usize(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: SessionState) {
        self.0.store(state.as_usize(), Ordering::Release);
    }

    /// Transition `from -> to`; returns whether this call won the transition.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(
                from.as_usize(),
                to.as_usize(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Monotonic presentation-timestamp source.
///
/// Timestamps are microseconds from a monotonic clock, not from frame
/// capture time, and are strictly increasing: a call landing inside the same
/// microsecond as the previous one is bumped by one.
pub(crate) struct PtsClock {
    origin: Instant,
    last: i64,
}

impl PtsClock {
    pub(crate) fn new() -> PtsClock {
        PtsClock {
            origin: Instant::now(),
            last: -1,
        }
    }

    pub(crate) fn next_us(&mut self) -> i64 {
        let now = self.origin.elapsed().as_micros() as i64;
        let pts = if now <= self.last { self.last + 1 } else { now };
        self.last = pts;
        pts
    }
}

/// Everything one session worker owns or shares with the processor.
pub(crate) struct SessionContext {
    pub encoder: Box<dyn HardwareEncoder>,
    pub format: EncoderFormat,
    pub state: Arc<StateCell>,
    pub queue: Arc<FrameQueue>,
    pub callbacks: Arc<CallbackSlots>,
    pub surface: Arc<Mutex<Option<SurfaceHandle>>>,
    pub events: crossbeam_channel::Sender<SessionEvent>,
}

/// Spawn the dedicated worker thread for one session.
pub(crate) fn spawn(ctx: SessionContext) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || run_session(ctx))
}

fn run_session(mut ctx: SessionContext) {
    if let Err(e) = configure_and_start(&mut ctx) {
        error!("encoder session failed to start: {e}");
        ctx.state.store(SessionState::Failed);
        release_encoder(&mut ctx);
        ctx.queue.close();
        ctx.queue.clear();
        send_event(&ctx.events, SessionEvent::Failed(Error::EncoderStart(e)));
        return;
    }

    // stop() may have been requested while we were configuring; in that case
    // never enter the loop, just release what was acquired.
    if !ctx
        .state
        .transition(SessionState::Starting, SessionState::Running)
    {
        debug!("stop requested during session startup, releasing encoder");
        release_encoder(&mut ctx);
        ctx.queue.clear();
        return;
    }

    if ctx.format.color == ColorFormat::SemiPlanarYuv {
        ctx.queue.open();
    }
    info!(
        "encode session running: {}x{} @{} fps, {} b/s, keyframe every {}s",
        ctx.format.width,
        ctx.format.height,
        ctx.format.frame_rate,
        ctx.format.bitrate,
        ctx.format.keyframe_interval_secs
    );
    send_event(&ctx.events, SessionEvent::Started);

    encode_loop(&mut ctx);

    // Flag already left Running (Stopping or Failed); hardware goes down
    // next, pending buffers last.
    release_encoder(&mut ctx);
    ctx.queue.close();
    ctx.queue.clear();
    debug!("encode session worker exited");
}

fn configure_and_start(ctx: &mut SessionContext) -> Result<(), EncoderError> {
    let surface = ctx.encoder.configure(&ctx.format)?;
    if ctx.format.color == ColorFormat::Surface {
        let handle = surface.ok_or_else(|| {
            EncoderError::Unsupported("backend produced no drawing surface".into())
        })?;
        *ctx.surface.lock().unwrap() = Some(handle.clone());
        // Exactly once per successful start, before the encoder accepts data
        if let Some(cb) = ctx.callbacks.surface_ready.lock().unwrap().as_mut() {
            cb(handle);
        }
    }
    ctx.encoder.start()
}

fn encode_loop(ctx: &mut SessionContext) {
    let mut clock = PtsClock::new();
    let mut last_pts: Option<i64> = None;
    let mut consecutive_failures: u32 = 0;
    let buffer_mode = ctx.format.color == ColorFormat::SemiPlanarYuv;

    while ctx.state.load() == SessionState::Running {
        if buffer_mode {
            if let Some(frame) = ctx.queue.drain(DRAIN_WAIT) {
                let pts = clock.next_us();
                match ctx.encoder.submit_frame(&frame, pts) {
                    Ok(()) => consecutive_failures = 0,
                    Err(e) if e.is_transient() => {
                        consecutive_failures += 1;
                        warn!(
                            "frame submit rejected ({e}), consecutive failures: {consecutive_failures}"
                        );
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            fail_session(ctx, e);
                            return;
                        }
                    }
                    Err(e) => {
                        error!("frame submit failed: {e}");
                        fail_session(ctx, e);
                        return;
                    }
                }
            }
        }

        match drain_output(ctx, &mut last_pts) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                consecutive_failures += 1;
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    fail_session(ctx, e);
                    return;
                }
            }
            Err(e) => {
                error!("output poll failed: {e}");
                fail_session(ctx, e);
                return;
            }
        }
    }
}

/// Pull every completed unit currently available and hand each to the output
/// sink, enforcing strictly increasing presentation timestamps.
fn drain_output(ctx: &mut SessionContext, last_pts: &mut Option<i64>) -> Result<(), EncoderError> {
    while let Some(mut unit) = ctx.encoder.poll_output(OUTPUT_POLL_WAIT)? {
        if let Some(last) = *last_pts {
            if unit.pts_us <= last {
                unit.pts_us = last + 1;
            }
        }
        *last_pts = Some(unit.pts_us);
        if let Some(cb) = ctx.callbacks.output.lock().unwrap().as_mut() {
            cb(unit);
        }
    }
    Ok(())
}

fn fail_session(ctx: &mut SessionContext, err: EncoderError) {
    // stop() may have raced us; Stopping wins and downgrades this to a quiet
    // teardown without a failure notification.
    if ctx
        .state
        .transition(SessionState::Running, SessionState::Failed)
    {
        send_event(&ctx.events, SessionEvent::Failed(Error::EncoderRuntime(err)));
    }
}

/// Stop and release the hardware session. Best-effort: errors are logged and
/// swallowed, the session counts as stopped regardless.
fn release_encoder(ctx: &mut SessionContext) {
    if let Err(e) = ctx.encoder.stop() {
        warn!("{}", Error::Teardown(e));
    }
}

fn send_event(sender: &crossbeam_channel::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = sender.try_send(event) {
        debug!("session event dropped, receiver not keeping up: {e}");
    }
}
