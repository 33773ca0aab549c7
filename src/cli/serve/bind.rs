//! HTTP server binding.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tiny_http::Server;

/// The HTTP server could not be started.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("failed to bind {host}:{port}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to start server on {host}:{port}: {message}")]
    Other {
        host: String,
        port: u16,
        message: String,
    },
}

/// Bind `host:port`. No retry: a taken port is reported to the caller.
pub fn bind(host: &str, port: u16) -> Result<(Server, Option<SocketAddr>), ServeError> {
    match Server::http((host, port)) {
        Ok(server) => {
            let addr = server.server_addr().to_ip();
            Ok((server, addr))
        }
        Err(err) => Err(match err.downcast::<io::Error>() {
            Ok(e) if e.kind() == io::ErrorKind::AddrInUse => ServeError::PortInUse { port },
            Ok(e) => ServeError::Bind {
                host: host.to_string(),
                port,
                source: *e,
            },
            Err(e) => ServeError::Other {
                host: host.to_string(),
                port,
                message: e.to_string(),
            },
        }),
    }
}
