//! Prometheus scrape endpoint.
//!
//! A plain blocking `tiny_http` server on its own thread; every request gets
//! the current gauge snapshot in text exposition format. The receive loop
//! polls with a timeout so the shutdown flag is honored within half a second.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{info, warn};
use tiny_http::{Response, Server};

use super::metrics::{SharedMetrics, lock};

pub fn spawn_metrics_server(
    addr: &str,
    metrics: SharedMetrics,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let server = Server::http(addr).map_err(|e| anyhow!("binding metrics server: {e}"))?;
    info!("[Monitor] metrics exposed on http://{addr}/metrics");

    Ok(thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match server.recv_timeout(Duration::from_millis(500)) {
                Ok(Some(request)) => {
                    let body = lock(&metrics).render();
                    if let Err(e) = request.respond(Response::from_string(body)) {
                        warn!("[Monitor] failed to answer scrape: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("[Monitor] receive error: {e}");
                }
            }
        }
        info!("[Monitor] metrics server stopped");
    }))
}
