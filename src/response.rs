use std::io::Read;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

/// A received HTTP response plus body helpers.
///
/// The body starts out streaming. `text`/`bytes`/`json` buffer it on first
/// use, so the response object stays inspectable afterwards; `save_to`
/// streams straight to disk when the body was not already buffered.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    version: Version,
    elapsed: Duration,
    body: Body,
}

enum Body {
    Streaming(reqwest::blocking::Response),
    Buffered(Vec<u8>),
}

impl Response {
    pub(crate) fn new(inner: reqwest::blocking::Response, elapsed: Duration) -> Response {
        Response {
            status: inner.status(),
            headers: inner.headers().clone(),
            url: inner.url().clone(),
            version: inner.version(),
            elapsed,
            body: Body::Streaming(inner),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The effective URL after any redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Wall-clock time spent in the executor, retries included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Non-2xx as an error, for callers that opt in.
    pub fn error_for_status(self) -> Result<Response> {
        if self.status.is_client_error() || self.status.is_server_error() {
            Err(Error::Status(self.status.as_u16()))
        } else {
            Ok(self)
        }
    }

    /// Read the whole body into memory, once.
    pub fn bytes(&mut self) -> Result<&[u8]> {
        if let Body::Streaming(inner) = &mut self.body {
            let mut buffer = Vec::new();
            inner.read_to_end(&mut buffer)?;
            self.body = Body::Buffered(buffer);
        }
        match &self.body {
            Body::Buffered(buffer) => Ok(buffer),
            Body::Streaming(_) => unreachable!(),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Stream the body to a file. Returns the number of bytes written.
    pub fn save_to(&mut self, path: &Path) -> Result<u64> {
        crate::download::save_body(self, path)
    }

    pub(crate) fn body_reader(&mut self) -> BodyReader<'_> {
        match &mut self.body {
            Body::Streaming(inner) => BodyReader::Streaming(inner),
            Body::Buffered(buffer) => BodyReader::Buffered(buffer.as_slice()),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

pub(crate) enum BodyReader<'a> {
    Streaming(&'a mut reqwest::blocking::Response),
    Buffered(&'a [u8]),
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            BodyReader::Streaming(inner) => inner.read(buf),
            BodyReader::Buffered(slice) => slice.read(buf),
        }
    }
}
