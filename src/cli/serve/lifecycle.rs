//! Server lifecycle: binding and Ctrl+C shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow};
use tiny_http::Server;

use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Install the global Ctrl+C handler. Call once, before anything blocks.
///
/// Before a server is registered the process exits right away; afterwards
/// the server is unblocked and the request loop winds down.
pub fn setup_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
        match SERVER.get() {
            Some(server) => {
                log!("serve"; "shutting down...");
                server.unblock();
            }
            None => std::process::exit(0),
        }
    })
    .map_err(|e| anyhow!("failed to set Ctrl+C handler: {e}"))
}

/// Register the HTTP server so Ctrl+C can unblock it.
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

#[inline]
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Bind to `interface:base_port`, moving up one port at a time while the
/// port is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {base_port} in use, using {port} instead");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "failed to bind after {MAX_PORT_RETRIES} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
