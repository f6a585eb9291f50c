//! HTTP responses: output files, 404s and the live-reload event stream.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::lifecycle::is_shutdown;
use crate::build::{ChangeHub, StreamEvent};
use crate::utils::html::inject_before_body_end;
use crate::utils::mime::{self, types::{HTML, PLAIN}};

/// Path of the server-sent-events endpoint.
pub const EVENTS_PATH: &str = "/__folio/events";

const HEARTBEAT: Duration = Duration::from_secs(15);

/// Reloads on a change to the current page or to anything that is not a
/// page (stylesheets, images).
const LIVE_RELOAD_SCRIPT: &str = r#"<script>
(function(){
  var events = new EventSource("/__folio/events");
  events.onmessage = function(e) {
    var page = /\/$|\.html$/.test(e.data);
    if (!page || e.data === location.pathname) location.reload();
  };
})();
</script>"#;

/// Map a request URL onto a file below `root`.
///
/// Directories resolve to their `index.html`. Anything escaping `root`,
/// through `..` or a symlink, is rejected.
pub fn resolve_file(url: &str, root: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let rel = decoded.trim_matches('/');
    if rel.split('/').any(|segment| segment == "..") {
        return None;
    }

    let root = root.canonicalize().ok()?;
    let target = root.join(rel).canonicalize().ok()?;
    if !target.starts_with(&root) {
        return None;
    }

    if target.is_dir() {
        let index = target.join("index.html");
        return index.is_file().then_some(index);
    }
    target.is_file().then_some(target)
}

pub fn respond_file(request: Request, path: &Path, live_reload: bool) -> Result<()> {
    let content_type = mime::from_path(path);
    if request.method() == &Method::Head {
        return send_head(request, 200, content_type);
    }
    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, with_live_reload(body, content_type, live_reload))
}

/// Respond with the site's `404.html` when it has one.
pub fn respond_not_found(request: Request, output: &Path, live_reload: bool) -> Result<()> {
    let custom = output.join("404.html");
    if request.method() == &Method::Head {
        let mime = if custom.is_file() { HTML } else { PLAIN };
        return send_head(request, 404, mime);
    }
    match fs::read(&custom) {
        Ok(body) => send_body(request, 404, HTML, with_live_reload(body, HTML, live_reload)),
        Err(_) => send_body(request, 404, PLAIN, b"404 Not Found".to_vec()),
    }
}

pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// Stream changed URLs to the client until it disconnects or the server
/// shuts down. Blocks the calling thread.
pub fn respond_events(request: Request, hub: &Arc<ChangeHub>) -> Result<()> {
    let stream = hub.subscribe();
    let mut writer = request.into_writer();
    writer.write_all(
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: text/event-stream\r\n\
          Cache-Control: no-cache\r\n\
          Connection: keep-alive\r\n\r\n",
    )?;
    writer.flush()?;

    while !is_shutdown() {
        let frame: Cow<'static, str> = match stream.next_event(HEARTBEAT) {
            Some(StreamEvent::Change(url)) => format!("data: {url}\n\n").into(),
            Some(StreamEvent::Heartbeat) => ": heartbeat\n\n".into(),
            None => break,
        };
        // A failed write means the client went away.
        if writer.write_all(frame.as_bytes()).and_then(|()| writer.flush()).is_err() {
            break;
        }
    }
    Ok(())
}

fn with_live_reload(body: Vec<u8>, content_type: &str, live_reload: bool) -> Vec<u8> {
    if !live_reload || content_type != HTML {
        return body;
    }
    match String::from_utf8(body) {
        Ok(html) => inject_before_body_end(&html, LIVE_RELOAD_SCRIPT).into_bytes(),
        Err(err) => err.into_bytes(),
    }
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let response = Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).map_err(|()| anyhow!("invalid header `{key}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("blog/hello world")).unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::write(dir.path().join("blog/hello world/index.html"), "post").unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();
        dir
    }

    #[test]
    fn test_resolve_file() {
        let dir = output();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(resolve_file("/", dir.path()), Some(root.join("index.html")));
        assert_eq!(
            resolve_file("/blog/hello%20world/?x=1#top", dir.path()),
            Some(root.join("blog/hello world/index.html"))
        );
        assert_eq!(resolve_file("/style.css", dir.path()), Some(root.join("style.css")));
        assert_eq!(resolve_file("/blog/", dir.path()), None);
        assert_eq!(resolve_file("/missing.css", dir.path()), None);
        assert_eq!(resolve_file("/blog/../../etc/passwd", dir.path()), None);
    }

    #[test]
    fn test_live_reload_only_in_html() {
        let html = with_live_reload(b"<body>hi</body>".to_vec(), HTML, true);
        let html = String::from_utf8(html).unwrap();
        assert!(html.starts_with("<body>hi<script>"), "{html}");
        assert!(html.contains(EVENTS_PATH));
        assert!(html.ends_with("</body>"));

        let css = with_live_reload(b"body {}".to_vec(), mime::types::CSS, true);
        assert_eq!(css, b"body {}");
        let off = with_live_reload(b"<body></body>".to_vec(), HTML, false);
        assert_eq!(off, b"<body></body>");
    }
}
