//! Single-segment HTTP GET with resume negotiation.
//!
//! Issues one curl GET (with a `Range` header when a partial file exists)
//! and resolves the server's answer: 206 appends to the partial file, 200
//! restarts from zero, 416 finalizes an already-complete partial file, 404
//! is fatal, anything else is raised for retry classification.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use curl::easy::{Easy, List};

use crate::retry::{classify_curl_error, classify_http_status, TransferError};
use crate::task::SegmentTask;

use super::headers::browser_headers;
use super::sink::SegmentSink;
use super::throttle::SpeedLimiter;
use super::{temp_path, TransferOptions, TransferOutcome};

pub(super) fn fetch_segment(
    task: &SegmentTask,
    opts: &TransferOptions,
    limiter: Option<&SpeedLimiter>,
    stop: &AtomicBool,
    progress: &dyn Fn(u64, u64, f64),
) -> Result<TransferOutcome, TransferError> {
    let temp = temp_path(&task.destination);
    let resume_from = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(0);
    if resume_from > 0 {
        tracing::debug!(path = %temp.display(), offset = resume_from, "resuming partial segment");
    }

    let mut easy = Easy::new();
    configure(&mut easy, task, opts, resume_from).map_err(|e| classify_curl_error(&e))?;

    let state = FetchState {
        task,
        opts,
        limiter,
        stop,
        progress,
        temp: &temp,
        status: Cell::new(0),
        content_length: Cell::new(None),
        resumed_from: Cell::new(resume_from),
        bytes: Cell::new(0),
        sink: RefCell::new(None),
        io_error: RefCell::new(None),
        aborted: Cell::new(false),
        started: Instant::now(),
        last_progress: Cell::new(Instant::now()),
    };

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                state.on_header(line);
                true
            })
            .map_err(|e| classify_curl_error(&e))?;
        transfer
            .write_function(|data| Ok(state.on_body(data)))
            .map_err(|e| classify_curl_error(&e))?;
        transfer.perform()
    };

    state.resolve(perform_result, &mut easy, &temp, &task.destination)
}

fn configure(
    easy: &mut Easy,
    task: &SegmentTask,
    opts: &TransferOptions,
    resume_from: u64,
) -> Result<(), curl::Error> {
    easy.url(&task.url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    // Non-2xx responses fail the perform; the status code is read afterwards.
    easy.fail_on_error(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // Read timeout as a stall detector rather than a wall clock, so large
    // segments on slow links are not killed mid-stream.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(opts.read_timeout)?;

    let mut list = List::new();
    for (name, value) in browser_headers(&task.url) {
        list.append(&format!("{}: {}", name, value))?;
    }
    easy.http_headers(list)?;

    if resume_from > 0 {
        easy.range(&format!("{}-", resume_from))?;
    }
    Ok(())
}

/// Mutable transfer state shared by the curl header and body callbacks.
struct FetchState<'a> {
    task: &'a SegmentTask,
    opts: &'a TransferOptions,
    limiter: Option<&'a SpeedLimiter>,
    stop: &'a AtomicBool,
    progress: &'a dyn Fn(u64, u64, f64),
    temp: &'a Path,
    /// Status of the current response block (redirect blocks reset it).
    status: Cell<u32>,
    content_length: Cell<Option<u64>>,
    resumed_from: Cell<u64>,
    /// Body bytes received in this response.
    bytes: Cell<u64>,
    sink: RefCell<Option<SegmentSink>>,
    io_error: RefCell<Option<io::Error>>,
    aborted: Cell<bool>,
    started: Instant,
    last_progress: Cell<Instant>,
}

impl FetchState<'_> {
    fn on_header(&self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            return;
        };
        let line = line.trim();
        if line.starts_with("HTTP/") {
            let code = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);
            self.status.set(code);
            self.content_length.set(None);
        } else if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                self.content_length.set(value.trim().parse::<u64>().ok());
            }
        }
    }

    /// Body callback. Returning less than `data.len()` aborts the transfer;
    /// the cause (stop request or I/O failure) is recorded for `resolve`.
    fn on_body(&self, data: &[u8]) -> usize {
        if self.stop.load(Ordering::Relaxed) {
            self.aborted.set(true);
            return 0;
        }
        if self.io_error.borrow().is_some() {
            return 0;
        }
        if self.sink.borrow().is_none() {
            if let Err(e) = self.open_sink() {
                self.io_error.replace(Some(e));
                return 0;
            }
        }
        if let Some(limiter) = self.limiter {
            limiter.throttle(data.len());
        }
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            if let Err(e) = sink.write(data) {
                self.io_error.replace(Some(e));
                return 0;
            }
        }
        self.bytes.set(self.bytes.get() + data.len() as u64);
        self.report_progress(false);
        data.len()
    }

    /// First body chunk: decide append-vs-truncate from the status line.
    fn open_sink(&self) -> io::Result<()> {
        let status = self.status.get();
        if status == 200 && self.resumed_from.get() > 0 {
            tracing::warn!(
                url = %self.task.url,
                discarded = self.resumed_from.get(),
                "server ignored byte range; restarting segment from zero"
            );
            self.resumed_from.set(0);
        }
        let append = status == 206 && self.resumed_from.get() > 0;
        let buffered = self.task.large_object_mode
            && self
                .expected_total()
                .is_some_and(|t| t > self.opts.large_object_threshold);
        let sink = SegmentSink::open(self.temp, append, buffered, self.task.chunk_size)?;
        self.sink.replace(Some(sink));
        Ok(())
    }

    /// Total asset-side size: Content-Length of this response plus any
    /// honored resume offset (a 206's Content-Length covers the remainder).
    fn expected_total(&self) -> Option<u64> {
        self.content_length
            .get()
            .map(|cl| cl + self.resumed_from.get())
    }

    fn downloaded(&self) -> u64 {
        self.resumed_from.get() + self.bytes.get()
    }

    fn report_progress(&self, force: bool) {
        let now = Instant::now();
        if !force && now.duration_since(self.last_progress.get()) < self.opts.progress_interval {
            return;
        }
        self.last_progress.set(now);
        let done = self.downloaded();
        let total = self.expected_total().unwrap_or(0);
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
        (self.progress)(done, total, speed);
    }

    /// Turn the perform result into a transfer outcome or classified error.
    fn resolve(
        self,
        perform_result: Result<(), curl::Error>,
        easy: &mut Easy,
        temp: &Path,
        destination: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        // Close the temp file before any rename.
        let sink = self.sink.borrow_mut().take();

        if self.aborted.get() {
            return Err(TransferError::Aborted);
        }
        if let Some(e) = self.io_error.borrow_mut().take() {
            return Err(TransferError::LocalIo(e));
        }

        match perform_result {
            Ok(()) => {
                match sink {
                    Some(sink) => sink.finish().map_err(TransferError::LocalIo)?,
                    // Zero-length body: make sure the temp file exists, but
                    // never truncate a resumed partial that is already whole.
                    None if !temp.exists() => {
                        std::fs::File::create(temp).map_err(TransferError::LocalIo)?;
                    }
                    None => {}
                }
                std::fs::rename(temp, destination).map_err(TransferError::LocalIo)?;
                let downloaded = self.downloaded();
                let total = self
                    .expected_total()
                    .filter(|t| *t > 0)
                    .unwrap_or(downloaded);
                self.report_progress(true);
                Ok(TransferOutcome {
                    bytes_downloaded: downloaded,
                    bytes_total: total,
                })
            }
            Err(e) if e.is_http_returned_error() => {
                drop(sink);
                let code = easy.response_code().unwrap_or(0);
                if code == 416 {
                    // The requested range starts past the end: the partial
                    // file is already the whole segment.
                    if let Ok(meta) = std::fs::metadata(temp) {
                        if meta.len() > 0 {
                            std::fs::rename(temp, destination)
                                .map_err(TransferError::LocalIo)?;
                            let size = meta.len();
                            tracing::info!(
                                path = %destination.display(),
                                size,
                                "partial file was already complete (416)"
                            );
                            return Ok(TransferOutcome {
                                bytes_downloaded: size,
                                bytes_total: size,
                            });
                        }
                    }
                }
                Err(classify_http_status(code))
            }
            Err(e) => Err(classify_curl_error(&e)),
        }
    }
}
