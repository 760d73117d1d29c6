use std::net::TcpListener;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// Listening side of a transport endpoint.
///
/// The chat client itself only connects; listeners exist for local relays,
/// fixtures and tests that stand in for the chat server.
pub struct Listener {
    inner: ListenerInner,
    endpoint: Endpoint,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixSocketGuard),
}

impl Listener {
    /// Bind and listen on an endpoint.
    ///
    /// For `tcp://host:0` the OS picks the port; [`Listener::endpoint`]
    /// reports the resolved address.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener =
                    TcpListener::bind(addr.as_str()).map_err(|source| TransportError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                let local = listener.local_addr()?;
                let endpoint = Endpoint::Tcp(local.to_string());
                info!(%endpoint, "listening");
                Ok(Self {
                    inner: ListenerInner::Tcp(listener),
                    endpoint,
                })
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let guard = UnixSocketGuard::bind(path.clone())?;
                info!(%endpoint, "listening");
                Ok(Self {
                    inner: ListenerInner::Unix(guard),
                    endpoint: endpoint.clone(),
                })
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("ipc")),
        }
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        let stream = match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                Stream::from(stream)
            }
            #[cfg(unix)]
            ListenerInner::Unix(guard) => {
                let (stream, _addr) = guard.listener.accept().map_err(TransportError::Accept)?;
                Stream::from(stream)
            }
        };
        debug!(endpoint = %self.endpoint, "accepted connection");
        Ok(stream)
    }

    /// The endpoint this listener is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Owns a filesystem socket path and removes it on drop, but only if the path
/// still refers to the socket this process created.
#[cfg(unix)]
struct UnixSocketGuard {
    listener: std::os::unix::net::UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

#[cfg(unix)]
impl UnixSocketGuard {
    /// Unix `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    fn bind(path: PathBuf) -> Result<Self> {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};

        let bind_err = |path: &PathBuf, source| TransportError::Bind {
            endpoint: format!("ipc://{}", path.display()),
            source,
        };

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove a stale socket, but never anything that is not a socket.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| bind_err(&path, e))?;
        }

        let listener =
            std::os::unix::net::UnixListener::bind(&path).map_err(|e| bind_err(&path, e))?;
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| bind_err(&path, e))?;

        Ok(Self {
            listener,
            created_inode: (metadata.dev(), metadata.ino()),
            path,
        })
    }
}

#[cfg(unix)]
impl Drop for UnixSocketGuard {
    fn drop(&mut self) {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};

        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket()
            && (metadata.dev(), metadata.ino()) == self.created_inode
        {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "murmur-transport-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tcp_bind_resolves_ephemeral_port() {
        let listener = Listener::bind(&Endpoint::tcp("127.0.0.1", 0)).unwrap();
        let endpoint = listener.endpoint().clone();
        assert!(!endpoint.to_string().ends_with(":0"));

        let handle = std::thread::spawn(move || {
            let mut client = Stream::connect(&endpoint).unwrap();
            client.write_all(b"ping").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        handle.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn unix_bind_accept_connect_and_cleanup() {
        let dir = unique_dir("uds");
        let sock_path = dir.join("test.sock");
        let endpoint = Endpoint::unix(&sock_path);

        let listener = Listener::bind(&endpoint).unwrap();
        assert!(sock_path.exists());

        let client_endpoint = endpoint.clone();
        let handle = std::thread::spawn(move || {
            let mut client = Stream::connect(&client_endpoint).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        handle.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn unix_bind_rejects_regular_file() {
        let dir = unique_dir("not-socket");
        let path = dir.join("plain.sock");
        std::fs::write(&path, b"regular-file").unwrap();

        let result = Listener::bind(&Endpoint::unix(&path));
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn unix_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = Listener::bind(&Endpoint::unix(long_path));
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }
}
