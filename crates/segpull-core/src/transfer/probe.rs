//! Remote size probing: HEAD first, ranged-GET fallback.
//!
//! Some origins block HEAD; for those, a one-byte `Range: bytes=0-0` GET
//! exposes the full size in `Content-Range`.

use std::cell::Cell;
use std::time::Duration;

use curl::easy::{Easy, List};

use crate::retry::{classify_curl_error, TransferError};

use super::headers::browser_headers;
use super::TransferOptions;

/// Probe the remote resource size. Returns `None` when the server reports
/// no usable length either way.
pub fn probe_size(url: &str, opts: &TransferOptions) -> Result<Option<u64>, TransferError> {
    match head_probe(url, opts) {
        Ok(size @ Some(_)) => Ok(size),
        // HEAD refused or unhelpful: fall back to a 1-byte ranged GET.
        _ => range_probe(url, opts),
    }
}

fn configure(easy: &mut Easy, url: &str, opts: &TransferOptions) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.fail_on_error(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(Duration::from_secs(30))?;
    let mut list = List::new();
    for (name, value) in browser_headers(url) {
        list.append(&format!("{}: {}", name, value))?;
    }
    easy.http_headers(list)?;
    Ok(())
}

fn head_probe(url: &str, opts: &TransferOptions) -> Result<Option<u64>, TransferError> {
    let mut easy = Easy::new();
    configure(&mut easy, url, opts).map_err(|e| classify_curl_error(&e))?;
    easy.nobody(true).map_err(|e| classify_curl_error(&e))?;

    let content_length = Cell::new(None::<u64>);
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(v) = header_value(line, "content-length") {
                    content_length.set(v.parse::<u64>().ok());
                }
                true
            })
            .map_err(|e| classify_curl_error(&e))?;
        transfer
            .perform()
            .map_err(|e| classify_curl_error(&e))?;
    }
    Ok(content_length.get())
}

fn range_probe(url: &str, opts: &TransferOptions) -> Result<Option<u64>, TransferError> {
    let mut easy = Easy::new();
    configure(&mut easy, url, opts).map_err(|e| classify_curl_error(&e))?;
    easy.range("0-0").map_err(|e| classify_curl_error(&e))?;

    let total = Cell::new(None::<u64>);
    let content_length = Cell::new(None::<u64>);
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(v) = header_value(line, "content-range") {
                    total.set(parse_content_range_total(&v));
                } else if let Some(v) = header_value(line, "content-length") {
                    content_length.set(v.parse::<u64>().ok());
                }
                true
            })
            .map_err(|e| classify_curl_error(&e))?;
        transfer
            .write_function(|data| Ok(data.len()))
            .map_err(|e| classify_curl_error(&e))?;
        transfer
            .perform()
            .map_err(|e| classify_curl_error(&e))?;
    }
    // Servers ignoring the range answer 200 with the full Content-Length.
    Ok(total.get().or(content_length.get()))
}

fn header_value(line: &[u8], name: &str) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?;
    let (k, v) = line.split_once(':')?;
    k.trim()
        .eq_ignore_ascii_case(name)
        .then(|| v.trim().to_string())
}

/// Parse the total out of `bytes 0-0/12345` (or `bytes */12345`).
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_parses() {
        assert_eq!(parse_content_range_total("bytes 0-0/8192"), Some(8192));
        assert_eq!(parse_content_range_total("bytes */500"), Some(500));
        assert_eq!(parse_content_range_total("bytes 0-0"), None);
        assert_eq!(parse_content_range_total("bytes 0-0/xyz"), None);
    }

    #[test]
    fn header_value_is_case_insensitive() {
        assert_eq!(
            header_value(b"Content-Length: 42\r\n", "content-length").as_deref(),
            Some("42")
        );
        assert_eq!(header_value(b"X-Other: 1\r\n", "content-length"), None);
    }
}
