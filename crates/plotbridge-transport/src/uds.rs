use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SocketStream;

/// Listening endpoint of the plotting consumer.
///
/// Binds a filesystem-path Unix domain socket and hands out one
/// [`SocketStream`] per connecting producer. The socket file is removed on
/// drop, unless someone replaced it in the meantime.
pub struct BridgeSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: Option<(u64, u64)>,
}

impl BridgeSocket {
    /// Permission mode applied to the socket file.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// `sockaddr_un.sun_path` capacity.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `path`, replacing a stale socket left by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |path: &Path, source: std::io::Error| TransportError::Bind {
            path: path.to_path_buf(),
            source,
        };

        // Only ever remove sockets; a regular file at the path is an operator mistake.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(
                    &path,
                    std::io::Error::new(ErrorKind::AlreadyExists, "existing path is not a unix socket"),
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| bind_err(&path, e))?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| bind_err(&path, e))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE))
            .map_err(|e| bind_err(&path, e))?;
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| bind_err(&path, e))?;

        info!(?path, "plot bridge listening");

        Ok(Self {
            listener,
            path,
            identity: Some((metadata.dev(), metadata.ino())),
        })
    }

    /// Block until a producer connects.
    pub fn accept(&self) -> Result<SocketStream> {
        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("producer connected");
        Ok(SocketStream::from_unix(stream))
    }

    /// Wait for a producer, checking `stop` every `poll_interval`.
    ///
    /// Returns `Err(TransportError::Shutdown)` once `stop` is set.
    pub fn accept_until(&self, stop: &AtomicBool, poll_interval: Duration) -> Result<SocketStream> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;

        loop {
            if stop.load(Ordering::SeqCst) {
                return Err(TransportError::Shutdown);
            }
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    // Accepted sockets inherit O_NONBLOCK on some platforms.
                    stream.set_nonblocking(false)?;
                    debug!("producer connected");
                    return Ok(SocketStream::from_unix(stream));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(poll_interval);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    /// Connect to a listening bridge.
    pub fn connect(path: impl AsRef<Path>) -> Result<SocketStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to plot bridge");
        Ok(SocketStream::from_unix(stream))
    }

    /// Keep trying to connect until `timeout` elapses. The consumer is often
    /// started right next to the producer and may not be listening yet.
    pub fn connect_with_retry(path: impl AsRef<Path>, timeout: Duration) -> Result<SocketStream> {
        let path = path.as_ref();
        let deadline = Instant::now() + timeout;
        loop {
            match Self::connect(path) {
                Ok(stream) => return Ok(stream),
                Err(err) if Instant::now() >= deadline => return Err(err),
                Err(_) => std::thread::sleep(Duration::from_millis(25)),
            }
        }
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BridgeSocket {
    fn drop(&mut self) {
        let Some((dev, ino)) = self.identity else {
            return;
        };
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path was replaced; leaving it alone");
        }
    }
}
