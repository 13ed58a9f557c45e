use crate::error::{Result, ScanError};
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

const USER_AGENT: &str = concat!("dirmirror/", env!("CARGO_PKG_VERSION"));

/// Single-request HTTP access shared by the walker and the downloaders.
///
/// A `Fetcher` never retries. Every failure is handed back to the caller,
/// which decides whether the URL deserves another attempt.
///
/// The timeout bounds connecting and each individual read, so a large file
/// that keeps streaming is never cut off. Listing pages additionally get
/// the timeout as a total deadline.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    chunk_size: usize,
    timeout: Duration,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(self.client.get(url).timeout(self.timeout), url).await?;
        Ok(response.text().await?)
    }

    /// Stream `url` into `destination`, returning the number of bytes written.
    ///
    /// The body goes to `<destination>.part` first and is renamed into place
    /// once fully flushed, so an interrupted transfer never leaves a truncated
    /// file under the final name. Any existing file at `destination` is replaced.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        debug!(url, path = %destination.display(), "fetching");

        let response = self.send(self.client.get(url), url).await?;
        let part = part_path(destination);

        let written = match self.write_stream(response.bytes_stream(), &part).await {
            Ok(written) => written,
            Err(e) => {
                debug!(path = %part.display(), "cleaning up partial file after error");
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&part, destination).await {
            let _ = fs::remove_file(&part).await;
            return Err(ScanError::io(destination, e));
        }

        debug!(url, bytes = written, "fetch complete");
        Ok(written)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Write a body stream to `path` in `chunk_size` pieces.
    async fn write_stream<S, B>(&self, stream: S, path: &Path) -> Result<u64>
    where
        S: Stream<Item = reqwest::Result<B>>,
        B: AsRef<[u8]>,
    {
        let file = File::create(path)
            .await
            .map_err(|e| ScanError::io(path, e))?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = pin!(stream);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let chunk = chunk.as_ref();
            // keep-alive frames carry no payload
            if chunk.is_empty() {
                continue;
            }
            for piece in chunk.chunks(self.chunk_size) {
                writer
                    .write_all(piece)
                    .await
                    .map_err(|e| ScanError::io(path, e))?;
            }
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|e| ScanError::io(path, e))?;
        Ok(written)
    }
}

/// Sibling temp path used while a download is in flight.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
