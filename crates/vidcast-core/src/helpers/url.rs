// crates/vidcast-core/src/helpers/url.rs
//
// Sink URL allocation and rewriting.
//
// Generated URLs take their stream number from one process-wide counter that
// starts at 1 and is never reset, so two sessions created in the same process
// never share a path even after rows are removed.

use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

/// Builds `rtsp://{host}:{port}/{prefix}/{n}` URLs.
#[derive(Clone, Debug)]
pub struct StreamUrls {
    pub host:   String,
    pub port:   u16,
    pub prefix: String,
}

impl StreamUrls {
    pub fn new(host: impl Into<String>, port: u16, prefix: impl Into<String>) -> Self {
        Self { host: host.into(), port, prefix: prefix.into() }
    }

    /// Allocate the next stream number and format its URL.
    pub fn next_url(&self) -> String {
        let n      = NEXT_STREAM.fetch_add(1, Ordering::Relaxed);
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("rtsp://{}:{}/{n}", self.host, self.port)
        } else {
            format!("rtsp://{}:{}/{prefix}/{n}", self.host, self.port)
        }
    }
}

impl Default for StreamUrls {
    fn default() -> Self {
        Self::new("127.0.0.1", 8554, "stream")
    }
}

/// Re-point `sink_url` at another host, keeping scheme, port and path.
pub fn with_host(sink_url: &str, host: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(sink_url)?;
    url.set_host(Some(host))?;
    Ok(url.to_string())
}

/// libav muxer name for a sink URL, chosen by scheme. `None` lets libav guess.
pub fn sink_format(sink_url: &str) -> Option<&'static str> {
    let scheme = Url::parse(sink_url).ok()?.scheme().to_ascii_lowercase();
    match scheme.as_str() {
        "rtsp" | "rtsps"        => Some("rtsp"),
        "rtmp" | "rtmps"        => Some("flv"),
        "srt" | "udp" | "tcp"   => Some("mpegts"),
        _                       => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_urls_are_unique() {
        let urls = StreamUrls::default();
        let a = urls.next_url();
        let b = urls.next_url();
        assert_ne!(a, b);
        assert!(a.starts_with("rtsp://127.0.0.1:8554/stream/"));
    }

    #[test]
    fn counter_is_shared_between_allocators() {
        let a = StreamUrls::new("10.0.0.2", 8554, "live").next_url();
        let b = StreamUrls::new("10.0.0.2", 8554, "live").next_url();
        assert_ne!(a, b);
    }

    #[test]
    fn host_swap_keeps_port_and_path() {
        let out = with_host("rtsp://192.168.3.52:8554/stream/1", "10.1.1.7").unwrap();
        assert_eq!(out, "rtsp://10.1.1.7:8554/stream/1");
    }

    #[test]
    fn format_follows_scheme() {
        assert_eq!(sink_format("rtsp://h:8554/s/1"), Some("rtsp"));
        assert_eq!(sink_format("RTMP://h/live/key"), Some("flv"));
        assert_eq!(sink_format("udp://239.0.0.1:1234"), Some("mpegts"));
        assert_eq!(sink_format("/tmp/out.ts"), None);
    }
}
