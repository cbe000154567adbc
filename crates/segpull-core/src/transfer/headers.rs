//! Browser-like request headers for segment fetches.
//!
//! Some CDN origins reject bare clients; sending a browser-shaped header
//! set with a Referer derived from the segment URL's parent directory keeps
//! them happy. Accept-Encoding stays `identity`: byte-range resume offsets
//! are only meaningful against the identity coding, and media segments do
//! not compress anyway.

use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Header set for a segment GET, including the derived Referer.
pub fn browser_headers(url: &str) -> Vec<(String, String)> {
    let referer = parent_url(url).unwrap_or_else(|| url.to_string());
    vec![
        ("User-Agent".into(), USER_AGENT.into()),
        ("Accept".into(), "*/*".into()),
        ("Accept-Language".into(), "en-US,en;q=0.9".into()),
        ("Accept-Encoding".into(), "identity".into()),
        ("Referer".into(), referer),
        ("Connection".into(), "keep-alive".into()),
    ]
}

/// Parent directory of the URL's path, query and fragment stripped, with a
/// trailing slash (e.g. `https://h/a/seg1.ts?x=1` → `https://h/a/`).
fn parent_url(url: &str) -> Option<String> {
    let mut u = Url::parse(url).ok()?;
    u.path_segments_mut().ok()?.pop();
    if !u.path().ends_with('/') {
        let p = format!("{}/", u.path());
        u.set_path(&p);
    }
    u.set_query(None);
    u.set_fragment(None);
    Some(u.to_string())
}
