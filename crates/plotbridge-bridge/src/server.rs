use std::path::Path;

use plotbridge_frame::{FrameReader, FrameWriter};
use plotbridge_transport::{BridgeSocket, TransportError};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::dispatcher::{Dispatcher, Evaluator, Renderer};
use crate::error::Result;
use crate::lifecycle::{Lifecycle, StopReason};
use crate::session::{run_session, SessionEnd, SessionStats};

/// Consumer side of the bridge: accepts producers one at a time and runs a
/// session for each.
///
/// The dispatcher, and with it the persistent binding set, outlives
/// individual producer connections.
pub struct Bridge<E, R> {
    socket: BridgeSocket,
    config: BridgeConfig,
    dispatcher: Dispatcher<E, R>,
    lifecycle: Lifecycle,
    totals: SessionStats,
    sessions: u64,
}

impl<E: Evaluator, R: Renderer> Bridge<E, R> {
    /// Bind to a Unix domain socket path.
    pub fn bind(
        path: impl AsRef<Path>,
        config: BridgeConfig,
        dispatcher: Dispatcher<E, R>,
    ) -> Result<Self> {
        let socket = BridgeSocket::bind(path)?;
        Ok(Self {
            socket,
            config,
            dispatcher,
            lifecycle: Lifecycle::new(),
            totals: SessionStats::default(),
            sessions: 0,
        })
    }

    /// Share an existing lifecycle, e.g. one a signal handler already holds.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Handle for stopping the bridge from another thread or a signal
    /// handler.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn dispatcher(&self) -> &Dispatcher<E, R> {
        &self.dispatcher
    }

    /// Counters summed over all finished sessions.
    pub fn totals(&self) -> SessionStats {
        self.totals
    }

    /// Serve producers until an `exit` frame or an interrupt.
    ///
    /// Returns the stop reason. A session that fails on the transport ends
    /// with an error; a producer that simply disconnects does not.
    pub fn serve(&mut self) -> Result<StopReason> {
        let result = self.serve_inner();
        self.lifecycle.mark_stopped();
        result
    }

    fn serve_inner(&mut self) -> Result<StopReason> {
        loop {
            let stream = match self
                .socket
                .accept_until(self.lifecycle.stop_flag(), self.config.poll_interval)
            {
                Ok(stream) => stream,
                Err(TransportError::Shutdown) => {
                    return Ok(self.lifecycle.reason().unwrap_or(StopReason::Interrupted));
                }
                Err(err) => return Err(err.into()),
            };

            self.sessions += 1;
            let session = self.sessions;
            match stream.peer_credentials() {
                Some((uid, gid, pid)) => info!(session, pid, uid, gid, "producer connected"),
                None => info!(session, "producer connected"),
            }

            let frame_config = self.config.frame_config();
            let mut writer = FrameWriter::for_socket(stream.try_clone()?, frame_config.clone())?;
            let mut reader = FrameReader::for_socket(stream, frame_config)?;

            let (end, stats) = run_session(
                &mut reader,
                &mut writer,
                &mut self.dispatcher,
                &self.lifecycle,
                &self.config,
            );
            self.add_totals(stats);

            if let Err(err) = reader.get_ref().shutdown() {
                debug!(session, error = %err, "socket shutdown failed");
            }

            match end {
                SessionEnd::Stopped(reason) => return Ok(reason),
                SessionEnd::Disconnected => info!(session, "producer disconnected"),
                SessionEnd::Failed(err) => {
                    warn!(session, error = %err, "session failed");
                    return Err(err);
                }
            }
        }
    }

    fn add_totals(&mut self, stats: SessionStats) {
        self.totals.frames += stats.frames;
        self.totals.dispatched += stats.dispatched;
        self.totals.failed += stats.failed;
        self.totals.discarded += stats.discarded;
        self.totals.dropped += stats.dropped;
    }
}
