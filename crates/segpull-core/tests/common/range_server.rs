//! Minimal HTTP/1.1 server for integration tests: per-path bodies, HEAD,
//! Range GET with 206/416, plus knobs for misbehaving origins (ranges
//! ignored, forced statuses, transient 500s).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// Force this status (with empty body) for every GET.
    pub always_status: Option<u16>,
    /// The first N GETs fail with 500 before the server behaves.
    pub fail_first: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            head_allowed: true,
            always_status: None,
            fail_first: 0,
        }
    }
}

/// Running server handle. The listener thread lives until process exit.
pub struct RangeServer {
    base_url: String,
    get_hits: Arc<AtomicUsize>,
}

impl RangeServer {
    /// Base URL, e.g. `http://127.0.0.1:12345/`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Number of GET requests served so far (all paths).
    pub fn get_hits(&self) -> usize {
        self.get_hits.load(Ordering::Relaxed)
    }
}

/// Serve one body at every path.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(vec![("seg.ts".to_string(), body)], RangeServerOptions::default())
}

/// Serve per-path bodies with the given behavior knobs. Unknown paths get 404.
pub fn start_with_options(
    bodies: Vec<(String, Vec<u8>)>,
    opts: RangeServerOptions,
) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let bodies: Arc<HashMap<String, Vec<u8>>> = Arc::new(
        bodies
            .into_iter()
            .map(|(p, b)| (format!("/{}", p.trim_start_matches('/')), b))
            .collect(),
    );
    let get_hits = Arc::new(AtomicUsize::new(0));
    let failures_left = Arc::new(AtomicUsize::new(opts.fail_first));
    {
        let get_hits = Arc::clone(&get_hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let bodies = Arc::clone(&bodies);
                let get_hits = Arc::clone(&get_hits);
                let failures_left = Arc::clone(&failures_left);
                thread::spawn(move || handle(stream, &bodies, opts, &get_hits, &failures_left));
            }
        });
    }
    RangeServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        get_hits,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    bodies: &HashMap<String, Vec<u8>>,
    opts: RangeServerOptions,
    get_hits: &AtomicUsize,
    failures_left: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, path, range) = parse_request(request);

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let Some(body) = bodies.get(path) else {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
            return;
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    get_hits.fetch_add(1, Ordering::Relaxed);

    if let Some(status) = opts.always_status {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n",
            status,
            reason(status)
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if failures_left
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
        .is_ok()
    {
        let _ = stream.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let Some(body) = bodies.get(path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    let total = body.len() as u64;
    let (status_line, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl || start >= total {
                let _ = stream.write_all(
                    format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n\r\n",
                        total
                    )
                    .as_bytes(),
                );
                return;
            }
            let slice = &body[start as usize..=end_incl as usize];
            (
                "206 Partial Content",
                Some(format!("bytes {}-{}/{}", start, end_incl, total)),
                slice,
            )
        }
        None => ("200 OK", None, &body[..]),
    };

    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n",
        status_line,
        slice.len()
    );
    if let Some(cr) = content_range {
        response.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

fn reason(status: u16) -> &'static str {
    match status {
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Returns (method, path, optional (start, end_inclusive)) for the request.
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    let path = path.split('?').next().unwrap_or(path);

    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end_incl = if b.trim().is_empty() {
                            u64::MAX
                        } else {
                            b.trim().parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, path, range)
}
