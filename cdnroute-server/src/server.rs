//! Server module for accepting connections and answering with routing decisions.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::router::RequestRouter;

/// Pause after a failed accept, so persistent errors such as fd exhaustion do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serves HTTP/1.1 on `listener` until `shutdown` is cancelled.
///
/// Each connection runs on its own task; requests on it are answered by `router`.
/// Connections already accepted are left to finish on their own.
pub async fn serve(listener: TcpListener, router: Arc<RequestRouter>, shutdown: CancellationToken) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "Listening"),
        Err(e) => warn!(error = %e, "Listening on unknown address"),
    }

    loop {
        let (stream, remote) = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Server shutting down");
                return;
            }

            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    back_off(&e).await;
                    continue;
                }
            },
        };

        let router = Arc::clone(&router);
        tokio::task::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |request| {
                let response = router.handle(&request, remote);
                async move { Ok::<_, Infallible>(response) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote, error = %err, "Error serving connection");
            }
        });
    }
}

async fn back_off(err: &io::Error) {
    warn!(error = %err, backoff = ?ACCEPT_BACKOFF, "Accept failed");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
