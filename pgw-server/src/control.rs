//! HTTP control plane.
//!
//! `GET /check_subscriber?imsi=<id>` reports whether a session is active and
//! `GET /stop` acknowledges at once, then raises the stop signal after
//! [`STOP_DELAY`] so the reply leaves before the server starts winding down.

use crate::session::SessionControl;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub const STOP_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct ControlState {
    sessions: Arc<dyn SessionControl>,
    stop: Arc<watch::Sender<bool>>,
}

/// Resolves once `/stop` has fired.
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub async fn stopped(mut self) {
        // An error means every sender is gone, which is as final as a stop.
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Build the shared handler state and the signal `/stop` raises.
pub fn channel(sessions: Arc<dyn SessionControl>) -> (ControlState, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (
        ControlState {
            sessions,
            stop: Arc::new(tx),
        },
        StopSignal(rx),
    )
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/check_subscriber", get(check_subscriber))
        .route("/stop", get(stop))
        .with_state(state)
}

/// Serve the control plane on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ControlState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("[http] control plane listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("[http] control plane stopped");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SubscriberQuery {
    imsi: Option<String>,
}

/// GET /check_subscriber?imsi=...
async fn check_subscriber(
    State(st): State<ControlState>,
    Query(q): Query<SubscriberQuery>,
) -> (StatusCode, &'static str) {
    match q.imsi.as_deref() {
        None | Some("") => (StatusCode::BAD_REQUEST, "Missing IMSI parameter"),
        Some(imsi) if st.sessions.has_session(imsi) => (StatusCode::OK, "active"),
        Some(_) => (StatusCode::OK, "not active"),
    }
}

/// GET /stop
async fn stop(State(st): State<ControlState>) -> &'static str {
    log::info!("[http] stop requested");
    let stop = Arc::clone(&st.stop);
    tokio::spawn(async move {
        tokio::time::sleep(STOP_DELAY).await;
        stop.send_replace(true);
    });
    "Stopping server..."
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Fixed(HashSet<String>);

    impl SessionControl for Fixed {
        fn create_session(&self, _imsi: &str) -> bool {
            false
        }
        fn has_session(&self, imsi: &str) -> bool {
            self.0.contains(imsi)
        }
    }

    async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();

        let text = String::from_utf8(raw).unwrap();
        let status = text[9..12].parse().unwrap();
        let body = text.split_once("\r\n\r\n").unwrap().1.to_string();
        (status, body)
    }

    async fn spawn_control() -> (
        SocketAddr,
        StopSignal,
        tokio::task::JoinHandle<std::io::Result<()>>,
    ) {
        let sessions = Arc::new(Fixed(HashSet::from(["001010123456789".to_string()])));
        let (state, signal) = channel(sessions);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(serve(listener, state, signal.clone().stopped()));
        (addr, signal, handle)
    }

    #[tokio::test]
    async fn check_subscriber_reports_state() {
        let (addr, _signal, _server) = spawn_control().await;

        let (status, body) = get(addr, "/check_subscriber?imsi=001010123456789").await;
        assert_eq!(status, 200);
        assert_eq!(body, "active");

        let (status, body) = get(addr, "/check_subscriber?imsi=001010000000000").await;
        assert_eq!(status, 200);
        assert_eq!(body, "not active");
    }

    #[tokio::test]
    async fn check_subscriber_requires_imsi() {
        let (addr, _signal, _server) = spawn_control().await;

        for path in ["/check_subscriber", "/check_subscriber?imsi="] {
            let (status, body) = get(addr, path).await;
            assert_eq!(status, 400);
            assert_eq!(body, "Missing IMSI parameter");
        }
    }

    #[tokio::test]
    async fn stop_acknowledges_then_shuts_down() {
        let (addr, signal, server) = spawn_control().await;

        let (status, body) = get(addr, "/stop").await;
        assert_eq!(status, 200);
        assert_eq!(body, "Stopping server...");

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("control plane did not stop")
            .unwrap()
            .unwrap();
        assert!(signal.is_stopped());
    }
}
