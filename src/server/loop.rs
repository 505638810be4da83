// Server loop module
// Accepts connections until shutdown, then drains in-flight ones

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until `shutdown` resolves
///
/// After shutdown the listener is closed and open connections get up to
/// `performance.write_timeout` seconds to finish.
pub async fn serve<S>(listener: TcpListener, state: Arc<AppState>, shutdown: S)
where
    S: Future<Output = &'static str>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => {
                    accept_connection(stream, peer_addr, &state, &active_connections);
                }
                Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
            },
            reason = &mut shutdown => {
                logger::log_shutdown(reason);
                break;
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.write_timeout);
    drain(&active_connections, grace).await;
}

async fn drain(active: &AtomicUsize, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    while active.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "{} connection(s) still open after {}s, exiting anyway",
                active.load(Ordering::SeqCst),
                grace.as_secs()
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    logger::log_info("All connections closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KvBackend;
    use crate::config::Config;
    use crate::kv::MemoryKv;
    use crate::server::create_reusable_listener;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut config = Config::defaults();
        config.logging.access_log = false;
        config.performance.read_timeout = 2;
        config.performance.write_timeout = 2;
        let backend = Arc::new(KvBackend::new(
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryKv::new()),
        ));
        let state = Arc::new(AppState::from_parts(config, backend, None));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state, async move {
            let _ = stop_rx.await;
            "test shutdown"
        }));

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{addr}/list-files"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["files"], serde_json::json!([]));

        let resp = client
            .get(format!("http://{addr}/unknown-path"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.text().await.unwrap(), "404 Not Found");

        drop(client);
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_oversized_upload_gets_json_413() {
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut config = Config::defaults();
        config.logging.access_log = false;
        config.http.max_body_size = 16;
        config.performance.read_timeout = 2;
        config.performance.write_timeout = 2;
        let backend = Arc::new(KvBackend::new(
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryKv::new()),
        ));
        let state = Arc::new(AppState::from_parts(config, backend, None));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state, async move {
            let _ = stop_rx.await;
            "test shutdown"
        }));

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://{addr}/upload-file"))
            .body(vec![b'x'; 64])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 413);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "❌ Request body too large.");

        drop(client);
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_drain_returns_when_idle() {
        let active = AtomicUsize::new(0);
        tokio::time::timeout(Duration::from_secs(1), drain(&active, Duration::from_secs(30)))
            .await
            .unwrap();
    }
}
