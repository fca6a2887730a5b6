//! Cache-backed HTTP data source.
//!
//! Serves reads from the [`DiskCache`] when the requested range is fully
//! cached and otherwise fetches it with a `Range` request, writing what it
//! receives through to the cache. Both the playback engine (via
//! [`MediaByteSource`]) and the prefetch jobs read through one instance, so
//! bytes fetched ahead of time are what playback later finds on disk.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteRange, HttpClient, HttpRequest, HttpStream};
use bridge_traits::playback::MediaByteSource;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use core_runtime::logging::redact_url;
use tracing::{debug, instrument, warn};

use crate::cache::config::DataSourceConfig;
use crate::cache::store::DiskCache;
use crate::error::{PlaybackError, Result};

pub struct CachingDataSource {
    http: Arc<dyn HttpClient>,
    cache: Arc<DiskCache>,
    config: DataSourceConfig,
}

impl CachingDataSource {
    pub fn new(http: Arc<dyn HttpClient>, cache: Arc<DiskCache>, config: DataSourceConfig) -> Self {
        Self {
            http,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Read `[offset, offset + length)` of `url`. The result is shorter than
    /// `length` only at the end of the resource.
    ///
    /// With `ignore_cache_on_error` set, cache failures fall through to the
    /// network and the bytes are still returned.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn read(&self, url: &str, offset: u64, length: u64) -> Result<Bytes> {
        match self.cache.read(url, offset, length).await {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(e) if self.config.ignore_cache_on_error => {
                warn!(error = %e, "Cache read failed, reading from network");
            }
            Err(e) => return Err(e),
        }

        if let Some(total) = self.cache.resource_length(url) {
            if offset >= total {
                return Ok(Bytes::new());
            }
        }

        let mut stream = self.open(url, offset, Some(length)).await?;
        let mut body = Vec::new();
        (&mut stream.body)
            .take(length)
            .read_to_end(&mut body)
            .await
            .map_err(|e| PlaybackError::StreamingFailed(e.to_string()))?;
        let body = Bytes::from(body);

        match self.store(url, offset, body.clone(), stream.total_length).await {
            Ok(()) => {}
            Err(e) if self.config.ignore_cache_on_error => {
                warn!(url = %redact_url(url), error = %e, "Cache write failed, serving uncached");
            }
            Err(e) => return Err(e),
        }
        Ok(body)
    }

    /// Fill the cache with `[start, start + length)` of `url`, or up to the
    /// end of the resource when `length` is `None`.
    ///
    /// Already-cached leading bytes are skipped. Cancellation is checked
    /// before every chunk and never interrupts a cache write, so a cancelled
    /// fill leaves only whole chunks behind. `progress` receives the number
    /// of bytes of the range that are cached so far.
    ///
    /// Returns the number of bytes of the range cached when the fill ended.
    /// A cache write failure ends the fill with that error whatever
    /// `ignore_cache_on_error` says, since a fill exists only to populate the
    /// cache.
    #[instrument(skip(self, url, cancel, progress), fields(url = %redact_url(url)))]
    pub async fn cache_range<F>(
        &self,
        url: &str,
        start: u64,
        length: Option<u64>,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<u64>
    where
        F: Fn(u64) + Send + Sync,
    {
        let known_total = self.cache.resource_length(url);
        let mut end = match (length, known_total) {
            (Some(len), Some(total)) => (start + len).min(total),
            (Some(len), None) => start + len,
            (None, Some(total)) => total,
            (None, None) => u64::MAX,
        };

        let mut position = self.cache.contiguous_end(url, start).min(end);
        progress(position - start);
        if position >= end {
            debug!("Range already cached");
            return Ok(position - start);
        }
        if cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        let request_len = (end != u64::MAX).then(|| end - position);
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
            opened = self.open(url, position, request_len) => opened?,
        };
        if let Some(total) = stream.total_length {
            end = end.min(total);
        }

        let chunk_size = self.config.chunk_size as u64;
        while position < end {
            let want = chunk_size.min(end - position);
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
                read = read_chunk(&mut stream.body, want) => read?,
            };
            if chunk.is_empty() {
                break;
            }

            let len = chunk.len() as u64;
            self.store(url, position, chunk, stream.total_length).await?;
            position += len;
            progress(position - start);
        }

        if end == u64::MAX && stream.total_length.is_none() {
            // Open-ended fill ran to EOF; the length is now known.
            self.cache.set_resource_length(url, position).await?;
        }

        debug!(cached = position - start, "Range fill finished");
        Ok(position - start)
    }

    /// Open `url` at `offset`. A server that ignores `Range` and answers
    /// `200` has the leading `offset` bytes discarded.
    async fn open(&self, url: &str, offset: u64, length: Option<u64>) -> Result<HttpStream> {
        let request = HttpRequest::get(url)
            .range(ByteRange::new(offset, length))
            .timeout(self.config.timeout);

        let mut stream = self.http.download_stream(request).await.map_err(|e| match e {
            BridgeError::Http { status, .. } => PlaybackError::HttpStatus {
                status,
                url: url.to_string(),
            },
            other => PlaybackError::StreamingFailed(other.to_string()),
        })?;

        if !stream.is_success() {
            return Err(PlaybackError::HttpStatus {
                status: stream.status,
                url: url.to_string(),
            });
        }

        if !stream.is_partial() && offset > 0 {
            debug!(url = %redact_url(url), offset, "Server ignored range request, skipping ahead");
            let skipped = tokio::io::copy(&mut (&mut stream.body).take(offset), &mut tokio::io::sink())
                .await
                .map_err(|e| PlaybackError::StreamingFailed(e.to_string()))?;
            if skipped < offset {
                return Ok(HttpStream {
                    status: stream.status,
                    content_length: Some(0),
                    total_length: stream.total_length,
                    body: Box::new(tokio::io::empty()),
                });
            }
        }

        Ok(stream)
    }

    async fn store(&self, url: &str, offset: u64, data: Bytes, total: Option<u64>) -> Result<()> {
        self.cache.write(url, offset, data).await?;
        if let Some(total) = total {
            self.cache.set_resource_length(url, total).await?;
        }
        Ok(())
    }
}

async fn read_chunk<R>(body: &mut R, max: u64) -> Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(max as usize);
    body.take(max)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| PlaybackError::StreamingFailed(e.to_string()))?;
    Ok(Bytes::from(buf))
}

#[async_trait]
impl MediaByteSource for CachingDataSource {
    async fn read_at(&self, uri: &str, offset: u64, length: u64) -> BridgeResult<Bytes> {
        self.read(uri, offset, length)
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))
    }
}
