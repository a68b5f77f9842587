use std::io::Read;
use std::thread;

use plotbridge_frame::{Frame, FrameError, FrameReader};
use plotbridge_protocol::{classify, is_header_frame, ProtocolError, ProtocolRevision, Tag};
use tracing::{debug, info, warn};

use crate::accumulator::CommandAccumulator;
use crate::config::BridgeConfig;
use crate::dispatcher::{DispatchResult, Dispatcher, Evaluator, Renderer, ReturnChannel};
use crate::error::{BridgeError, Result};
use crate::lifecycle::{Lifecycle, StopReason};
use crate::queue::{DispatchQueue, Pop};

/// Where the receive loop gets frames from.
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` if nothing arrived within the poll interval.
    /// A closed source reports `BridgeError::Disconnected`.
    fn poll_frame(&mut self) -> Result<Option<Frame>>;
}

impl<R: Read + Send> FrameSource for FrameReader<R> {
    fn poll_frame(&mut self) -> Result<Option<Frame>> {
        match FrameReader::poll_frame(self) {
            Ok(frame) => Ok(frame),
            Err(FrameError::ConnectionClosed) => {
                Err(BridgeError::Disconnected("producer closed the connection".into()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The bridge was asked to stop.
    Stopped(StopReason),
    /// The producer disconnected; every frame it sent was processed.
    Disconnected,
    /// The frame source failed.
    Failed(BridgeError),
}

/// Per-session counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub discarded: u64,
    /// Frames still queued when a stop was observed.
    pub dropped: u64,
}

/// What the processing loop should do after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The payload of a rejected header was dropped.
    Skipped,
    Dispatched(DispatchResult),
    Exit,
}

/// The processing side of a session: classifies frames and feeds the
/// accumulator and dispatcher. Single-threaded; owns the open cycle.
#[derive(Debug, Default)]
pub struct Processor {
    revision: ProtocolRevision,
    accumulator: CommandAccumulator,
    /// A header was rejected; its payload frame is still on the way.
    skip_payload: bool,
}

impl Processor {
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            accumulator: CommandAccumulator::new(),
            skip_payload: false,
        }
    }

    /// Handle one frame.
    ///
    /// A malformed frame discards the open cycle and surfaces the decode
    /// error; the processor stays usable. When the rejected frame is a data
    /// header that announces a payload, the next frame is dropped unread.
    pub fn handle<E: Evaluator, R: Renderer>(
        &mut self,
        frame: &[u8],
        dispatcher: &mut Dispatcher<E, R>,
        returns: &mut dyn ReturnChannel,
    ) -> std::result::Result<Step, ProtocolError> {
        self.step(frame, dispatcher, returns).inspect_err(|err| {
            warn!(error = %err, "malformed frame; discarding cycle");
            self.accumulator.reset();
        })
    }

    fn step<E: Evaluator, R: Renderer>(
        &mut self,
        frame: &[u8],
        dispatcher: &mut Dispatcher<E, R>,
        returns: &mut dyn ReturnChannel,
    ) -> std::result::Result<Step, ProtocolError> {
        if std::mem::take(&mut self.skip_payload) {
            debug!(len = frame.len(), "dropping payload of rejected header");
            return Ok(Step::Skipped);
        }

        if self.accumulator.awaiting_payload() {
            self.accumulator.on_payload(frame)?;
            return Ok(Step::Continue);
        }

        let tag = classify(frame).inspect_err(|_| self.skip_payload = is_header_frame(frame))?;
        match tag {
            Tag::DataHeader(_) => match tag.header(self.revision) {
                Some(Ok(header)) => {
                    self.accumulator.on_header(header);
                    Ok(Step::Continue)
                }
                Some(Err(err)) => {
                    self.skip_payload = tag.payload_follows();
                    Err(err)
                }
                None => Ok(Step::Continue),
            },
            Tag::CommandText(text) => {
                self.accumulator.on_command_text(text);
                Ok(Step::Continue)
            }
            Tag::Finalize => {
                let cycle = self.accumulator.take_cycle_for_dispatch();
                Ok(Step::Dispatched(dispatcher.dispatch(cycle, returns)))
            }
            Tag::Exit => Ok(Step::Exit),
        }
    }

    pub fn accumulator(&self) -> &CommandAccumulator {
        &self.accumulator
    }
}

enum ReceiveEnd {
    Stopped,
    Disconnected,
    Failed(BridgeError),
}

/// Relay frames from `source` into `queue` until stopped or disconnected.
/// Always closes the queue on the way out.
fn receive_loop<S: FrameSource + ?Sized>(
    source: &mut S,
    queue: &DispatchQueue<Frame>,
    lifecycle: &Lifecycle,
) -> ReceiveEnd {
    let end = loop {
        if lifecycle.is_stopping() {
            break ReceiveEnd::Stopped;
        }
        match source.poll_frame() {
            Ok(Some(frame)) => queue.push(frame),
            Ok(None) => {}
            Err(BridgeError::Disconnected(reason)) => {
                debug!(%reason, "receive loop: source closed");
                break ReceiveEnd::Disconnected;
            }
            Err(err) => break ReceiveEnd::Failed(err),
        }
    };
    queue.close();
    end
}

/// Run one producer session: a receive thread relays frames, the calling
/// thread processes them.
///
/// An `exit` frame stops `lifecycle`; frames queued behind it are dropped.
pub fn run_session<S, E, R>(
    source: &mut S,
    returns: &mut dyn ReturnChannel,
    dispatcher: &mut Dispatcher<E, R>,
    lifecycle: &Lifecycle,
    config: &BridgeConfig,
) -> (SessionEnd, SessionStats)
where
    S: FrameSource,
    E: Evaluator,
    R: Renderer,
{
    let queue = DispatchQueue::new();
    let mut processor = Processor::new(config.revision);
    let mut stats = SessionStats::default();

    thread::scope(|scope| {
        let receiver = scope.spawn(|| receive_loop(source, &queue, lifecycle));

        let end = loop {
            if lifecycle.is_stopping() {
                break None;
            }
            let frame = match queue.pop_timeout(config.poll_interval) {
                Pop::Item(frame) => frame,
                Pop::Empty => continue,
                Pop::Closed => break Some(SessionEnd::Disconnected),
            };
            stats.frames += 1;
            debug!(seq = stats.frames, len = frame.payload().len(), "frame");
            match processor.handle(frame.payload(), dispatcher, returns) {
                Ok(Step::Continue) => {}
                Ok(Step::Skipped) => stats.discarded += 1,
                Ok(Step::Dispatched(result)) => match result {
                    DispatchResult::NoCommand => {}
                    DispatchResult::Evaluated { .. } => stats.dispatched += 1,
                    DispatchResult::EvaluationFailed(_) => stats.failed += 1,
                },
                Ok(Step::Exit) => {
                    lifecycle.request_stop(StopReason::ExitFrame);
                    break None;
                }
                Err(_) => stats.discarded += 1,
            }
        };

        let received = receiver.join();
        stats.dropped = queue.clear() as u64;
        if stats.dropped > 0 {
            debug!(dropped = stats.dropped, "dropped frames queued after stop");
        }

        let stopped = || SessionEnd::Stopped(lifecycle.reason().unwrap_or(StopReason::Interrupted));
        let end = match received {
            Ok(ReceiveEnd::Failed(err)) => SessionEnd::Failed(err),
            Ok(ReceiveEnd::Stopped | ReceiveEnd::Disconnected) => end.unwrap_or_else(stopped),
            Err(_) => {
                warn!("receive loop panicked");
                end.unwrap_or_else(stopped)
            }
        };
        info!(?end, frames = stats.frames, dispatched = stats.dispatched, "session ended");
        (end, stats)
    })
}
