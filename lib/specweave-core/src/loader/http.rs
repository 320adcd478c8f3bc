use std::error::Error as _;

use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use super::{Fetched, LoadLimits, SourceLoader};
use crate::{BundleError, Cancellation, Source};

/// Loads remote sources with an HTTP GET.
///
/// The body is read chunk by chunk so an oversized response is rejected without being
/// buffered entirely.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    limits: LoadLimits,
}

impl HttpLoader {
    /// Creates an HTTP loader with the given limits.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::FetchError`] if the HTTP client cannot be initialized.
    pub fn new(limits: LoadLimits) -> Result<Self, BundleError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if !limits.timeout.is_zero() {
            builder = builder.timeout(limits.timeout);
        }
        let client = builder.build().map_err(|err| BundleError::FetchError {
            location: String::new(),
            reason: describe(&err),
        })?;

        Ok(Self { client, limits })
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, BundleError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.transport_error(url, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BundleError::FetchError {
                location: url.to_string(),
                reason: format!("HTTP status {status}"),
            });
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok());

        if let Some(length) = response.content_length()
            && self.limits.exceeds(length)
        {
            return Err(self.too_large(url));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| self.transport_error(url, &err))?
        {
            if self.limits.exceeds((bytes.len() + chunk.len()) as u64) {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!(%url, %status, ?media_type, size = bytes.len(), "fetched");

        Ok(Fetched { bytes, media_type })
    }

    fn transport_error(&self, url: &Url, error: &reqwest::Error) -> BundleError {
        if error.is_timeout() {
            BundleError::Timeout {
                location: url.to_string(),
                timeout: self.limits.timeout,
            }
        } else {
            BundleError::FetchError {
                location: url.to_string(),
                reason: describe(error),
            }
        }
    }

    fn too_large(&self, url: &Url) -> BundleError {
        BundleError::TooLarge {
            location: url.to_string(),
            limit: self.limits.max_file_size,
        }
    }
}

impl SourceLoader for HttpLoader {
    async fn load(&self, source: &Source, cancellation: &Cancellation) -> Result<Fetched, BundleError> {
        cancellation.check()?;
        let Source::Url(url) = source else {
            return Err(BundleError::InvalidSource {
                input: source.to_string(),
                reason: "not a remote URL".to_string(),
            });
        };

        tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(BundleError::Cancelled),
            result = self.fetch(url) => result,
        }
    }
}

/// Flattens the error and its sources into one line.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
