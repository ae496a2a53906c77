//! Inbound request listener.
//!
//! One accept loop, one task per connection. A connection may carry many
//! requests; responses go back in request order. The execute and validate
//! verbs bridge the controller's callback contract onto the synchronous
//! request/response framing with a one-shot channel per request.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use super::codec::{self, SentinelRequest, SentinelResponse, WireError};
use crate::controller::{Controller, SentinelApi};

/// Handle to a running listener.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: watch::Sender<bool>,
}

impl ServerHandle {
    /// The address the listener actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections. Connections already open run their
    /// in-flight requests to completion.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// Binds `addr` and spawns the accept loop.
pub async fn spawn(controller: Arc<Controller>, addr: &str) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (stop, mut stopped) = watch::channel(false);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let controller = Arc::clone(&controller);
                        tokio::spawn(async move {
                            handle_connection(controller, stream, remote).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                },
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(addr = %local_addr, "request listener stopped");
    });

    Ok(ServerHandle { local_addr, stop })
}

async fn handle_connection(controller: Arc<Controller>, mut stream: TcpStream, remote: SocketAddr) {
    loop {
        let request: SentinelRequest = match codec::read_frame(&mut stream).await {
            Ok(request) => request,
            Err(WireError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return,
            Err(e) => {
                debug!(%remote, error = %e, "dropping connection on bad frame");
                return;
            }
        };

        let response = match request {
            SentinelRequest::Ping => SentinelResponse::Pong,
            SentinelRequest::Attest(ctx) => {
                SentinelResponse::Attest(controller.attest_compact(ctx).await)
            }
            SentinelRequest::Execute(tx) => {
                let (slot, result) = oneshot::channel();
                let accepted = controller
                    .execute_transaction(
                        tx,
                        Box::new(move |outcome| {
                            let _ = slot.send(outcome);
                        }),
                    )
                    .await;
                if !accepted {
                    debug!(%remote, "refusing execute on uninitialized sentinel");
                    return;
                }
                match result.await {
                    Ok(outcome) => SentinelResponse::Execute(outcome),
                    Err(_) => return,
                }
            }
            SentinelRequest::Validate(tx) => {
                let (slot, result) = oneshot::channel();
                controller
                    .validate_transaction(
                        tx,
                        Box::new(move |outcome| {
                            let _ = slot.send(outcome);
                        }),
                    )
                    .await;
                match result.await {
                    Ok(outcome) => SentinelResponse::Validate(outcome),
                    Err(_) => return,
                }
            }
        };

        if let Err(e) = codec::write_frame(&mut stream, &response).await {
            debug!(%remote, error = %e, "dropping connection on failed write");
            return;
        }
    }
}
