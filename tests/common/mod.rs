#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use webprinter_link::config::DiscoveryConfig;
use webprinter_link::server::{self, StubOptions, StubState};

/// Start a stub helper on an ephemeral loopback port.
pub async fn stub(options: StubOptions) -> (u16, StubState) {
    let state = StubState::new(options);
    let addr = server::spawn_stub("127.0.0.1:0", state.clone())
        .await
        .expect("bind stub");
    (addr.port(), state)
}

/// Serve an arbitrary router on an ephemeral loopback port.
pub async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    port
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

pub fn loopback_config(ports: Vec<u16>) -> DiscoveryConfig {
    DiscoveryConfig {
        ports,
        hosts: vec!["127.0.0.1".into()],
        timeout: Duration::from_millis(500),
        max_attempts: 2,
        backoff_base: Duration::from_millis(10),
        ..Default::default()
    }
}
