use llamasync::{api, config, logging, sync::FileSyncService};
use std::io;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ports tried in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();
    let service = FileSyncService::from_config().expect("Failed to build LlamaCloud client");
    if !llamasync::sync::is_remote_configured() {
        tracing::warn!(
            "LLAMA_CLOUD_API_KEY is not set; LlamaCloud routes will respond with 404"
        );
    }
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let listener = bind_listener(config.server_port, FALLBACK_PORTS)
        .await
        .expect("Failed to bind listener");
    let address = listener.local_addr().expect("Listener has no local address");
    tracing::info!(
        %address,
        cache_dir = %config.cache_dir.display(),
        "Sync server listening"
    );
    axum::serve(listener, app).await.expect("Server terminated");
}

/// Bind the explicit port when given, otherwise the first free port of `fallback`.
async fn bind_listener(
    preferred: Option<u16>,
    fallback: RangeInclusive<u16>,
) -> io::Result<TcpListener> {
    if let Some(port) = preferred {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await;
    }

    let (first, last) = (*fallback.start(), *fallback.end());
    for port in fallback {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port busy");
            }
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no free port between {first} and {last}"),
    ))
}
