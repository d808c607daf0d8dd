use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Request;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use url::Url;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::middleware::RequestHook;
use crate::options::{encode_form, encode_multipart, RequestOptions, RetryConfig};
use crate::options::FORM_CONTENT_TYPE;
use crate::response::Response;
use crate::transport::Transport;

/// Status codes retried when `retry_on_http` is empty.
pub const DEFAULT_RETRY_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

fn default_user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

/// Runs validated options against a transport: buffers the body once,
/// sends, classifies the outcome, and retries with backoff within the
/// caller's cancellation window.
pub struct Executor<'a> {
    transport: &'a dyn Transport,
    hooks: Vec<Box<dyn RequestHook + 'a>>,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn Transport) -> Executor<'a> {
        Executor {
            transport,
            hooks: Vec::new(),
        }
    }

    /// Register a request hook. Hooks run in registration order on every
    /// attempt.
    pub fn with(mut self, hook: impl RequestHook + 'a) -> Executor<'a> {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn execute(&self, ctx: &Context, options: &RequestOptions) -> Result<Response> {
        self.process(ctx, options).map(|(response, _)| response)
    }

    /// Validate, resolve the URL, and drive the retry state machine.
    /// Returns the response together with the fully resolved URL.
    pub fn process(&self, ctx: &Context, options: &RequestOptions) -> Result<(Response, Url)> {
        options.validate()?;

        let ctx = if options.timeout > Duration::ZERO {
            ctx.with_timeout(options.timeout)
        } else {
            ctx.clone()
        };

        if let Some(err) = ctx.err() {
            return Err(err);
        }

        // Body buffering: materialize the payload once, before the first
        // attempt. Every attempt replays these exact bytes.
        let mut url = options.parsed_url()?;
        let mut payload = Payload::buffer(options);
        if options.get_with_query {
            if let Some(data) = payload.take_as_query() {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{data}"),
                    _ => data,
                };
                url.set_query(Some(&query));
            }
        }

        let method = Method::from_bytes(options.effective_method().as_bytes())
            .map_err(|_| Error::validation("method", "not a valid HTTP token"))?;

        let max_retries = options.retry.as_ref().map_or(0, |retry| retry.max_retries);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let request = self.build_attempt(&ctx, options, &method, &url, &payload)?;
            log::debug!(
                "attempt {} of {}: {} {}",
                attempt + 1,
                max_retries + 1,
                request.method(),
                request.url()
            );

            let failure = match self.transport.execute(request) {
                Ok(response) => {
                    let retryable = options
                        .retry
                        .as_ref()
                        .is_some_and(|retry| retries_on_status(retry, response.status().as_u16()));
                    if !retryable {
                        let response = Response::new(response, started.elapsed());
                        return Ok((response, url));
                    }
                    Error::Status(response.status().as_u16())
                }
                Err(err) => {
                    // Cancellation during an in-flight send surfaces as the
                    // context error, not as a transport failure.
                    if let Some(ctx_err) = ctx.err() {
                        return Err(ctx_err);
                    }
                    if options.retry.is_none() {
                        return Err(Error::Transport(err));
                    }
                    Error::Transport(err)
                }
            };

            if attempt >= max_retries {
                return Err(Error::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(failure),
                });
            }

            let delay = backoff_delay(options.retry.as_ref(), attempt);
            log::debug!("retryable failure ({failure}), sleeping {delay:?}");
            ctx.sleep(delay)?;
            attempt += 1;
        }
    }

    /// Clone-per-attempt: a fresh request over the buffered payload, with
    /// headers and URL copied from the options every time.
    fn build_attempt(
        &self,
        ctx: &Context,
        options: &RequestOptions,
        method: &Method,
        url: &Url,
        payload: &Payload,
    ) -> Result<Request> {
        let mut request = Request::new(method.clone(), url.clone());
        *request.headers_mut() = options.headers.clone();
        *request.timeout_mut() = ctx.remaining();

        let headers = request.headers_mut();
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        }
        if !headers.contains_key(USER_AGENT) {
            let agent = options.user_agent.as_deref().unwrap_or(default_user_agent());
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(agent)
                    .map_err(|_| Error::validation("user_agent", "not a valid header value"))?,
            );
        }
        if !headers.contains_key(AUTHORIZATION) {
            if let Some((user, password)) = &options.basic_auth {
                let credentials = BASE64.encode(format!("{user}:{password}"));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {credentials}"))
                        .map_err(|_| Error::validation("auth", "not a valid header value"))?,
                );
            } else if let Some(token) = &options.bearer_token {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}"))
                        .map_err(|_| Error::validation("auth", "not a valid header value"))?,
                );
            }
        }

        if let Some(bytes) = &payload.bytes {
            if let (Some(content_type), false) =
                (&payload.content_type, headers.contains_key(CONTENT_TYPE))
            {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_str(content_type)
                        .map_err(|_| Error::validation("headers", "invalid content type"))?,
                );
            }
            // reqwest derives Content-Length from the buffer on every
            // attempt.
            *request.body_mut() = Some(bytes.clone().into());
        }

        for hook in &self.hooks {
            request = hook.transform(request)?;
        }
        Ok(request)
    }
}

/// The buffered request payload plus the content type it implies when the
/// caller didn't set one.
struct Payload {
    bytes: Option<Vec<u8>>,
    content_type: Option<String>,
}

impl Payload {
    fn buffer(options: &RequestOptions) -> Payload {
        if let Some(body) = &options.body {
            // curl convention: -d data is form-encoded unless overridden.
            Payload {
                bytes: Some(body.clone()),
                content_type: Some(FORM_CONTENT_TYPE.to_owned()),
            }
        } else if !options.form.is_empty() {
            Payload {
                bytes: Some(encode_form(&options.form).into_bytes()),
                content_type: Some(FORM_CONTENT_TYPE.to_owned()),
            }
        } else if !options.multipart.is_empty() {
            let (content_type, bytes) = encode_multipart(&options.multipart);
            Payload {
                bytes: Some(bytes),
                content_type: Some(content_type),
            }
        } else {
            Payload {
                bytes: None,
                content_type: None,
            }
        }
    }

    /// For `-G`: hand the payload over for use as a query string. Multipart
    /// payloads stay in the body, as they do for curl.
    fn take_as_query(&mut self) -> Option<String> {
        if self.content_type.as_deref() != Some(FORM_CONTENT_TYPE) {
            return None;
        }
        self.content_type = None;
        self.bytes
            .take()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn retries_on_status(retry: &RetryConfig, status: u16) -> bool {
    if retry.retry_on_http.is_empty() {
        DEFAULT_RETRY_STATUS.contains(&status)
    } else {
        retry.retry_on_http.contains(&status)
    }
}

/// Fixed delay when configured, else exponential 100ms * 2^attempt capped
/// at 5s.
fn backoff_delay(retry: Option<&RetryConfig>, attempt: u32) -> Duration {
    if let Some(retry) = retry {
        if retry.delay > Duration::ZERO {
            return retry.delay;
        }
    }
    BACKOFF_BASE
        .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .min(BACKOFF_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_set() {
        let retry = RetryConfig::default();
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(retries_on_status(&retry, status), "{status} should retry");
        }
        for status in [200, 201, 301, 400, 404, 501] {
            assert!(!retries_on_status(&retry, status), "{status} should not retry");
        }
    }

    #[test]
    fn explicit_retry_set_replaces_default() {
        let retry = RetryConfig {
            retry_on_http: vec![404],
            ..RetryConfig::default()
        };
        assert!(retries_on_status(&retry, 404));
        assert!(!retries_on_status(&retry, 503));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(None, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(None, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(None, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(None, 5), Duration::from_millis(3200));
        assert_eq!(backoff_delay(None, 6), Duration::from_secs(5));
        assert_eq!(backoff_delay(None, 40), Duration::from_secs(5));
    }

    #[test]
    fn fixed_delay_overrides_exponential() {
        let retry = RetryConfig {
            delay: Duration::from_millis(250),
            ..RetryConfig::default()
        };
        assert_eq!(backoff_delay(Some(&retry), 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(Some(&retry), 7), Duration::from_millis(250));
    }

    #[test]
    fn payload_prefers_raw_body() {
        let mut options = RequestOptions::new("https://e.test");
        options.body = Some(b"a=1".to_vec());
        let payload = Payload::buffer(&options);
        assert_eq!(payload.bytes.as_deref(), Some(b"a=1".as_slice()));
        assert_eq!(payload.content_type.as_deref(), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn payload_encodes_form_pairs() {
        let mut options = RequestOptions::new("https://e.test");
        options.form.push(("a".into(), "1".into()));
        options.form.push(("b".into(), "2 3".into()));
        let payload = Payload::buffer(&options);
        assert_eq!(payload.bytes.as_deref(), Some(b"a=1&b=2+3".as_slice()));
    }

    #[test]
    fn query_takeover_clears_payload() {
        let mut options = RequestOptions::new("https://e.test");
        options.body = Some(b"a=1&b=2".to_vec());
        let mut payload = Payload::buffer(&options);
        assert_eq!(payload.take_as_query().as_deref(), Some("a=1&b=2"));
        assert!(payload.bytes.is_none());
        assert!(payload.take_as_query().is_none());
    }
}
