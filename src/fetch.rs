//! Mirror-fallback artifact fetcher.
//!
//! Installer binaries are served from several mirrors for regional
//! reachability; the fetcher walks the list in order and only fails once
//! every mirror has failed. Transfers stream to disk and report progress
//! through the run's log at most once per second.

use crate::events::EventSender;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Errors from fetching an artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// HTTP-level failure: connection, TLS, or a non-2xx status.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Data stopped arriving mid-transfer.
    ///
    /// Distinct from a connection error: the server accepted the request
    /// and sent bytes, then went quiet for longer than the stall timeout.
    #[error("transfer stalled: no data for {0:?}")]
    Stalled(Duration),

    /// Filesystem error writing the destination.
    #[error("i/o error writing download: {0}")]
    Io(#[from] std::io::Error),

    /// Every mirror in the list failed.
    #[error("all {attempts} mirrors failed, last error: {last}")]
    Exhausted {
        /// Number of mirrors tried.
        attempts: usize,
        /// The failure from the final mirror.
        last: Box<FetchError>,
    },

    /// The mirror list was empty.
    #[error("no mirror urls provided")]
    NoMirrors,

    /// The fetch was cancelled.
    #[error("download cancelled")]
    Cancelled,
}

/// Options controlling transfer behavior.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Abort a transfer when no bytes arrive for this long after the
    /// first byte. Default: 30 seconds.
    pub stall_timeout: Duration,

    /// Connection timeout for each mirror attempt. Default: 10 seconds.
    pub connect_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Build the HTTP client used for artifact downloads.
pub(crate) fn http_client(options: &FetchOptions) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .connect_timeout(options.connect_timeout)
        .user_agent(concat!("claude-provision/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Download an artifact, trying each mirror in order.
///
/// Each mirror failure is logged and the next mirror tried; only when the
/// list is exhausted does the fetch fail, wrapping the last error. The
/// destination file is written incrementally and a partial file is left in
/// place on failure; cleanup is the caller's concern.
pub(crate) async fn fetch(
    client: &Client,
    urls: &[&str],
    dest: &Path,
    options: &FetchOptions,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    if urls.is_empty() {
        return Err(FetchError::NoMirrors);
    }

    let mut last: Option<FetchError> = None;
    for (index, url) in urls.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        events.log(format!(
            "downloading from mirror {} of {}: {url}",
            index + 1,
            urls.len()
        ));
        match fetch_one(client, url, dest, options, events, cancel).await {
            Ok(()) => return Ok(()),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(error) => {
                events.log(format!("mirror {} failed: {error}", index + 1));
                last = Some(error);
            }
        }
    }

    Err(FetchError::Exhausted {
        attempts: urls.len(),
        last: Box::new(last.unwrap_or(FetchError::NoMirrors)),
    })
}

async fn fetch_one(
    client: &Client,
    url: &str,
    dest: &Path,
    options: &FetchOptions,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length();
    if let Some(total) = total {
        events.log(format!("file size: {}", format_size(total)));
    }

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();

    let started = Instant::now();
    let mut downloaded: u64 = 0;
    let mut last_log = started;
    let mut last_bytes: u64 = 0;

    loop {
        // The stall timer only arms once data has started flowing; before
        // the first byte, connect/response failures already cover us.
        let next = if downloaded == 0 {
            stream.next().await
        } else {
            match timeout(options.stall_timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => return Err(FetchError::Stalled(options.stall_timeout)),
            }
        };

        let Some(chunk) = next else { break };
        let chunk = chunk?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if last_log.elapsed() >= Duration::from_secs(1) {
            events.log(progress_line(
                downloaded,
                total,
                last_bytes,
                last_log.elapsed(),
                started.elapsed(),
            ));
            last_bytes = downloaded;
            last_log = Instant::now();
        }
    }

    file.flush().await?;
    events.log(format!("download complete: {}", format_size(downloaded)));
    Ok(())
}

/// One progress log line: percent, instantaneous rate, and an ETA from the
/// cumulative average rate (the average keeps the estimate from swinging
/// with every burst).
fn progress_line(
    downloaded: u64,
    total: Option<u64>,
    last_bytes: u64,
    since_last: Duration,
    elapsed: Duration,
) -> String {
    let instant_rate = if since_last.as_secs_f64() > 0.0 {
        (downloaded - last_bytes) as f64 / since_last.as_secs_f64()
    } else {
        0.0
    };

    match total {
        Some(total) if total > 0 => {
            let percent = downloaded as f64 * 100.0 / total as f64;
            let average_rate = if elapsed.as_secs_f64() > 0.0 {
                downloaded as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            };
            let eta = if average_rate > 0.0 {
                format_eta((total.saturating_sub(downloaded)) as f64 / average_rate)
            } else {
                "estimating".to_string()
            };
            format!(
                "progress: {percent:.1}% ({} / {}) {}/s, ETA {eta}",
                format_size(downloaded),
                format_size(total),
                format_size(instant_rate as u64),
            )
        }
        _ => format!(
            "downloaded {} ({}/s)",
            format_size(downloaded),
            format_size(instant_rate as u64)
        ),
    }
}

/// Format bytes as human readable.
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_eta(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.0}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn test_events() -> (EventSender, crate::events::LogSink) {
        let sink = Arc::new(Mutex::new(Vec::new()));
        (EventSender::sink_only(sink.clone(), "download"), sink)
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(42.0), "42s");
        assert_eq!(format_eta(180.0), "3m");
        assert_eq!(format_eta(5400.0), "1.5h");
    }

    #[tokio::test]
    async fn test_fetch_empty_mirror_list() {
        let (events, _sink) = test_events();
        let client = http_client(&FetchOptions::default()).unwrap();
        let dest = tempfile::tempdir().unwrap().path().join("out.bin");

        let result = fetch(
            &client,
            &[],
            &dest,
            &FetchOptions::default(),
            &events,
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::NoMirrors)));
    }

    #[tokio::test]
    async fn test_fetch_single_mirror_success() {
        let mut server = mockito::Server::new_async().await;
        let body = b"installer bytes".to_vec();
        let mock = server
            .mock("GET", "/node.msi")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let (events, _sink) = test_events();
        let client = http_client(&FetchOptions::default()).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("node.msi");

        let url = format!("{}/node.msi", server.url());
        fetch(
            &client,
            &[url.as_str()],
            &dest,
            &FetchOptions::default(),
            &events,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_falls_through_to_working_mirror() {
        let mut server = mockito::Server::new_async().await;
        let bad = server
            .mock("GET", "/bad")
            .with_status(503)
            .create_async()
            .await;
        let good = server
            .mock("GET", "/good")
            .with_status(200)
            .with_body("payload from the good mirror")
            .create_async()
            .await;

        let (events, sink) = test_events();
        let client = http_client(&FetchOptions::default()).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("artifact");

        let bad_url = format!("{}/bad", server.url());
        // A mirror with nothing listening, then a 503, then success.
        let refused = "http://127.0.0.1:1/refused";
        let good_url = format!("{}/good", server.url());

        fetch(
            &client,
            &[refused, bad_url.as_str(), good_url.as_str()],
            &dest,
            &FetchOptions::default(),
            &events,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        bad.assert_async().await;
        good.assert_async().await;
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "payload from the good mirror"
        );
        // Every superseded attempt stays in the durable log.
        let logs = sink.lock().unwrap().clone();
        assert!(logs.iter().any(|l| l.contains("mirror 1 failed")));
        assert!(logs.iter().any(|l| l.contains("mirror 2 failed")));
    }

    #[tokio::test]
    async fn test_fetch_all_mirrors_failing_reports_last_error() {
        let mut server = mockito::Server::new_async().await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let (events, _sink) = test_events();
        let client = http_client(&FetchOptions::default()).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("artifact");

        let refused = "http://127.0.0.1:1/refused";
        let gone = format!("{}/gone", server.url());

        let result = fetch(
            &client,
            &[refused, gone.as_str()],
            &dest,
            &FetchOptions::default(),
            &events,
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(FetchError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                // Last failure was the 404, not the refused connection.
                assert!(matches!(*last, FetchError::Http(_)));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_line_contains_percent_and_eta() {
        let line = progress_line(
            50 * 1024 * 1024,
            Some(100 * 1024 * 1024),
            40 * 1024 * 1024,
            Duration::from_secs(1),
            Duration::from_secs(10),
        );
        assert!(line.contains("50.0%"));
        assert!(line.contains("ETA"));
    }

    #[tokio::test]
    async fn test_stalled_transfer_is_distinct_from_connection_error() {
        use tokio::io::AsyncWriteExt as _;

        // A server that sends headers and two bytes of a longer body, then
        // goes quiet without closing the connection.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let response = "HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\nhi";
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let (events, _sink) = test_events();
        let options = FetchOptions {
            stall_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let client = http_client(&options).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("stalled");

        let url = format!("http://{addr}/artifact");
        let result = fetch(
            &client,
            &[url.as_str()],
            &dest,
            &options,
            &events,
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(FetchError::Exhausted { last, .. }) => {
                assert!(matches!(*last, FetchError::Stalled(_)), "got {last:?}");
            }
            other => panic!("expected Exhausted wrapping Stalled, got {other:?}"),
        }
    }
}
