//! Progressive HTTP download.
//!
//! One download per resolved stream. The output decodes from a blocking
//! reader while bytes are still arriving, and the cache write-behind waits for
//! the finished body instead of fetching the URL a second time.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A reader waits this long for the next chunk before giving up.
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Downloading,
    Finished,
    Failed(String),
    Cancelled,
}

struct Body {
    data: Vec<u8>,
    /// Content-Length, when the server sent one
    total: Option<u64>,
    phase: Phase,
}

struct Inner {
    url: String,
    body: Mutex<Body>,
    grew: Condvar,
    phase_tx: watch::Sender<Phase>,
}

impl Inner {
    fn set_phase(&self, phase: Phase) {
        let mut body = self.body.lock();
        if body.phase != Phase::Downloading {
            return;
        }
        body.phase = phase.clone();
        drop(body);
        self.grew.notify_all();
        let _ = self.phase_tx.send(phase);
    }

    fn append(&self, chunk: &[u8]) {
        self.body.lock().data.extend_from_slice(chunk);
        self.grew.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.body.lock().phase == Phase::Cancelled
    }
}

/// Cloneable handle to one in-flight or finished download.
#[derive(Clone)]
pub struct Download {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.inner.body.lock();
        f.debug_struct("Download")
            .field("url", &self.inner.url)
            .field("received", &body.data.len())
            .field("phase", &body.phase)
            .finish()
    }
}

impl Download {
    /// Begin fetching `url` on the runtime. Returns immediately.
    pub fn start(client: &Client, url: &str) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Downloading);
        let inner = Arc::new(Inner {
            url: url.to_string(),
            body: Mutex::new(Body {
                data: Vec::new(),
                total: None,
                phase: Phase::Downloading,
            }),
            grew: Condvar::new(),
            phase_tx,
        });

        let task = inner.clone();
        let client = client.clone();
        tokio::spawn(async move {
            match fill(&client, &task).await {
                Ok(()) if task.is_cancelled() => debug!(url = %task.url, "download cancelled"),
                Ok(()) => {
                    debug!(url = %task.url, len = task.body.lock().data.len(), "download finished");
                    task.set_phase(Phase::Finished);
                }
                Err(e) => {
                    warn!(url = %task.url, error = %e, "download failed");
                    task.set_phase(Phase::Failed(e.to_string()));
                }
            }
        });

        Self { inner }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Bytes received so far.
    pub fn received(&self) -> usize {
        self.inner.body.lock().data.len()
    }

    /// Stop fetching. Readers and waiters see an error from here on.
    pub fn cancel(&self) {
        self.inner.set_phase(Phase::Cancelled);
    }

    /// Wait for the whole body.
    pub async fn bytes(&self) -> Result<Vec<u8>> {
        let mut rx = self.inner.phase_tx.subscribe();
        let phase = rx
            .wait_for(|p| *p != Phase::Downloading)
            .await
            .map_err(|_| Error::Output("download task vanished".into()))?
            .clone();
        match phase {
            Phase::Finished => Ok(self.inner.body.lock().data.clone()),
            Phase::Failed(msg) => Err(Error::Output(format!("download of {} failed: {}", self.inner.url, msg))),
            Phase::Cancelled => Err(Error::Output("download cancelled".into())),
            Phase::Downloading => Err(Error::Output("download still running".into())),
        }
    }

    /// Blocking reader starting at offset zero. Reads wait for bytes that
    /// have not arrived yet.
    pub fn reader(&self) -> StreamReader {
        StreamReader {
            inner: self.inner.clone(),
            pos: 0,
        }
    }
}

async fn fill(client: &Client, inner: &Inner) -> Result<()> {
    let mut resp = client.get(&inner.url).send().await?.error_for_status()?;
    inner.body.lock().total = resp.content_length();
    while let Some(chunk) = resp.chunk().await? {
        if inner.is_cancelled() {
            return Ok(());
        }
        inner.append(&chunk);
    }
    Ok(())
}

pub struct StreamReader {
    inner: Arc<Inner>,
    pos: u64,
}

impl StreamReader {
    /// Block until `pos` bytes are available (or the body is complete).
    fn wait_until(&self, want: u64) -> io::Result<()> {
        let mut body = self.inner.body.lock();
        loop {
            if body.data.len() as u64 >= want {
                return Ok(());
            }
            match &body.phase {
                Phase::Finished => return Ok(()),
                Phase::Failed(msg) => return Err(io::Error::other(msg.clone())),
                Phase::Cancelled => return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "download cancelled")),
                Phase::Downloading => {}
            }
            if self.inner.grew.wait_for(&mut body, STALL_TIMEOUT).timed_out() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "stream stalled"));
            }
        }
    }

    /// Total length, waiting for the body to finish when the server sent none.
    fn total_len(&self) -> io::Result<u64> {
        if let Some(total) = self.inner.body.lock().total {
            return Ok(total);
        }
        self.wait_until(u64::MAX)?;
        Ok(self.inner.body.lock().data.len() as u64)
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.wait_until(self.pos + 1)?;
        let body = self.inner.body.lock();
        let start = (self.pos as usize).min(body.data.len());
        let n = buf.len().min(body.data.len() - start);
        buf[..n].copy_from_slice(&body.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d) => self.total_len()?.checked_add_signed(d),
        };
        let Some(target) = target else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        };
        self.pos = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Serves `body` once, in two halves with a pause between them.
    async fn serve_slowly(body: Vec<u8>, pause: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut sock, &mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: audio/wav\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            let mid = body.len() / 2;
            sock.write_all(&body[..mid]).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(pause).await;
            sock.write_all(&body[mid..]).await.unwrap();
        });
        format!("http://{}/track", addr)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reader_sees_bytes_before_download_finishes() {
        let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let url = serve_slowly(body.clone(), Duration::from_millis(400)).await;
        let download = Download::start(&Client::new(), &url);

        let mut reader = download.reader();
        let first = tokio::task::spawn_blocking(move || {
            let mut head = [0u8; 16];
            reader.read_exact(&mut head).unwrap();
            head
        })
        .await
        .unwrap();
        assert_eq!(&first[..], &body[..16]);
        assert!(download.received() < body.len());

        let all = download.bytes().await.unwrap();
        assert_eq!(all, body);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_seek_from_end_uses_content_length() {
        let body: Vec<u8> = (0..100u8).collect();
        let url = serve_slowly(body, Duration::from_millis(50)).await;
        let download = Download::start(&Client::new(), &url);

        let mut reader = download.reader();
        let tail = tokio::task::spawn_blocking(move || {
            let at = reader.seek(SeekFrom::End(-4)).unwrap();
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest).unwrap();
            (at, rest)
        })
        .await
        .unwrap();
        assert_eq!(tail, (96, vec![96, 97, 98, 99]));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_waiters() {
        let download = Download::start(&Client::new(), "http://127.0.0.1:1/none");
        assert!(download.bytes().await.is_err());
        let mut reader = download.reader();
        let mut buf = [0u8; 4];
        assert!(reader.read(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_cancel_releases_readers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let download = Download::start(&Client::new(), &format!("http://{}/x", addr));
        download.cancel();
        let err = download.bytes().await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        let mut buf = [0u8; 4];
        assert_eq!(
            download.reader().read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionAborted
        );
    }
}
