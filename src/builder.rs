use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::options::{Part, RequestOptions, RetryConfig, JSON_CONTENT_TYPE};

/// Fluent construction of a `RequestOptions`, producing the same shape the
/// flag parser does.
///
/// Every mutator returns the builder. Conversion errors (a bad header name,
/// unserializable JSON) are deferred and surface from [`Builder::build`],
/// in the manner of reqwest's request builder.
///
/// A builder is `Clone`, and cloning deep-copies every collection: clone a
/// shared template before mutating it on another thread.
#[derive(Debug, Clone)]
pub struct Builder {
    options: RequestOptions,
    error: Option<String>,
}

impl Builder {
    pub fn new(url: impl Into<String>) -> Builder {
        Builder {
            options: RequestOptions::new(url),
            error: None,
        }
    }

    /// Start from existing options, e.g. ones the flag parser produced.
    pub fn from_options(options: RequestOptions) -> Builder {
        Builder {
            options,
            error: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Builder {
        self.options.url = url.into();
        self
    }

    pub fn method(mut self, method: &str) -> Builder {
        self.options.method = Some(method.to_uppercase());
        self
    }

    /// Append a header. Repeated names keep their order of addition.
    pub fn header(mut self, name: &str, value: &str) -> Builder {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.options.headers.append(name, value);
            }
            _ => self.defer(format!("invalid header {name:?}")),
        }
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Builder {
        self.options
            .query_params
            .push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Builder {
        self.options.body = Some(body.into());
        self
    }

    /// Marshal `value` to JSON, set it as the body, and set
    /// `Content-Type: application/json`.
    pub fn json(mut self, value: &impl Serialize) -> Builder {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.options.body = Some(bytes);
                self.options
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
            Err(err) => self.defer(format!("JSON body: {err}")),
        }
        self
    }

    /// Set URL-encoded form fields. The executor encodes them in insertion
    /// order and applies the form content type.
    pub fn form<I, K, V>(mut self, fields: I) -> Builder
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.form = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Append one multipart part; parts keep insertion order.
    pub fn part(mut self, part: Part) -> Builder {
        self.options.multipart.push(part);
        self
    }

    pub fn basic(mut self, user: impl Into<String>, password: impl Into<String>) -> Builder {
        self.options.basic_auth = Some((user.into(), password.into()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Builder {
        self.options.bearer_token = Some(token.into());
        self
    }

    /// Per-request deadline. The executor derives a scoped context from the
    /// caller's handle at send time; the derived handle is released
    /// automatically when the call returns.
    pub fn with_timeout(mut self, timeout: Duration) -> Builder {
        self.options.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Builder {
        self.options.connect_timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Builder {
        self.options.follow_redirects = follow;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Builder {
        self.options.max_redirects = max;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Builder {
        self.options.insecure = insecure;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Builder {
        self.options.user_agent = Some(agent.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Builder {
        self.options.output_file = Some(path.into());
        self
    }

    pub fn head(mut self) -> Builder {
        self.options.head_only = true;
        self
    }

    pub fn compressed(mut self, compressed: bool) -> Builder {
        self.options.compressed = compressed;
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Builder {
        self.retry_config().max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Builder {
        self.retry_config().delay = delay;
        self
    }

    /// Replace the retryable status set. An empty list means the default
    /// set {408, 429, 500, 502, 503, 504}.
    pub fn retry_on(mut self, statuses: impl Into<Vec<u16>>) -> Builder {
        self.retry_config().retry_on_http = statuses.into();
        self
    }

    pub fn build(self) -> Result<RequestOptions> {
        match self.error {
            Some(reason) => Err(Error::validation("builder", reason)),
            None => Ok(self.options),
        }
    }

    fn retry_config(&mut self) -> &mut RetryConfig {
        self.options.retry.get_or_insert_with(RetryConfig::default)
    }

    fn defer(&mut self, reason: String) {
        if self.error.is_none() {
            self.error = Some(reason);
        }
    }
}
