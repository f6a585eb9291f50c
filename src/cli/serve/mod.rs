//! Development server with live reload support.
//!
//! Serves the output directory and rebuilds on file changes. Pages get a
//! small script that listens on [`EVENTS_PATH`] for the URLs of rebuilt
//! artifacts.

mod lifecycle;
mod response;
mod watch;

pub use lifecycle::{is_shutdown, setup_shutdown_handler};
pub use response::EVENTS_PATH;

use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use tiny_http::{Request, Server};

use crate::build::{Builder, ChangeHub, CliReporter};
use crate::cli::Cli;
use crate::cli::build::build_site;
use crate::config::SiteConfig;
use crate::env::Environment;
use crate::log;

/// Entry point for `folio serve`: build once, then serve until Ctrl+C.
pub fn run_serve(config: &SiteConfig, cli: &'static Cli) -> Result<()> {
    let builder = Builder::new(Environment::new(config.clone()))?;
    match build_site(&builder, &CliReporter::new()) {
        Ok(summary) if !summary.is_success() => {
            log!("serve"; "{} artifact(s) failed, serving anyway", summary.failed_artifacts.len());
        }
        Ok(_) => {}
        Err(e) => log!("error"; "initial build failed: {e:#}"),
    }

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    lifecycle::register_server(Arc::clone(&server));
    log!("serve"; "http://{addr}");

    let hub = ChangeHub::new();
    let watcher = if config.serve.watch {
        Some(watch::spawn(builder, Arc::clone(&hub), cli)?)
    } else {
        drop(builder);
        None
    };

    run_request_loop(&server, config, &hub)?;
    if let Some(watcher) = watcher {
        watcher.shutdown();
    }
    Ok(())
}

fn run_request_loop(server: &Server, config: &SiteConfig, hub: &Arc<ChangeHub>) -> Result<()> {
    // File requests are short; event streams block and get their own thread.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .map_err(|e| anyhow!("failed to create thread pool: {e}"))?;

    let output = Arc::new(config.build.output.clone());
    let live_reload = config.serve.watch;
    for request in server.incoming_requests() {
        if live_reload && request.url().starts_with(EVENTS_PATH) {
            let hub = Arc::clone(hub);
            thread::spawn(move || {
                if let Err(e) = response::respond_events(request, &hub) {
                    crate::debug!("serve"; "event stream closed: {e}");
                }
            });
            continue;
        }
        let output = Arc::clone(&output);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &output, live_reload) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(request: Request, output: &Path, live_reload: bool) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }
    match response::resolve_file(request.url(), output) {
        Some(path) => response::respond_file(request, &path, live_reload),
        None => response::respond_not_found(request, output, live_reload),
    }
}
