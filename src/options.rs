use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::HeaderMap;
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One entry in a `multipart/form-data` body. `data` is owned bytes so the
/// encoded body can be replayed byte-identically across retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Retry behavior for one request. An empty `retry_on_http` list means the
/// default retryable set {408, 429, 500, 502, 503, 504}. A zero `delay`
/// selects exponential backoff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay: Duration,
    pub retry_on_http: Vec<u16>,
}

/// Output hints the CLI consumes. The core stores them and acts on none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub verbose: bool,
    pub include_headers: bool,
    pub silent: bool,
    pub write_out: Option<String>,
}

/// The typed request description produced by the flag parser or the
/// builder.
///
/// Logically immutable once validated. All container fields are owned, so
/// `Clone` is a deep copy; clone a shared template before mutating it from
/// another thread.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub url: String,
    /// Explicit method from `-X`. When unset the effective method is GET,
    /// or POST once a body-bearing flag was seen, or HEAD under `-I`.
    pub method: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub form: Vec<(String, String)>,
    pub multipart: Vec<Part>,
    pub query_params: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub bearer_token: Option<String>,
    /// Zero means no explicit timeout.
    pub timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub insecure: bool,
    pub user_agent: Option<String>,
    /// Where the caller wants the body streamed. The executor never opens
    /// this path.
    pub output_file: Option<PathBuf>,
    /// `-O`: derive the output filename from the URL path.
    pub remote_name: bool,
    pub head_only: bool,
    /// `-G`: append data to the query string and send GET.
    pub get_with_query: bool,
    pub compressed: bool,
    pub retry: Option<RetryConfig>,
    pub presentation: Presentation,
}

impl Default for RequestOptions {
    fn default() -> RequestOptions {
        RequestOptions {
            url: String::new(),
            method: None,
            headers: HeaderMap::new(),
            body: None,
            form: Vec::new(),
            multipart: Vec::new(),
            query_params: Vec::new(),
            basic_auth: None,
            bearer_token: None,
            timeout: Duration::ZERO,
            connect_timeout: None,
            follow_redirects: false,
            max_redirects: 10,
            insecure: false,
            user_agent: None,
            output_file: None,
            remote_name: false,
            head_only: false,
            get_with_query: false,
            compressed: false,
            retry: None,
            presentation: Presentation::default(),
        }
    }
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> RequestOptions {
        RequestOptions {
            url: url.into(),
            ..RequestOptions::default()
        }
    }

    pub fn has_payload(&self) -> bool {
        self.body.is_some() || !self.form.is_empty() || !self.multipart.is_empty()
    }

    /// The method actually sent, after curl's implication rules.
    pub fn effective_method(&self) -> &str {
        match &self.method {
            Some(method) => method,
            None if self.head_only => "HEAD",
            None if self.has_payload() && !self.get_with_query => "POST",
            None => "GET",
        }
    }

    /// The target URL with `query_params` merged in, preserving insertion
    /// order. Scheme-less input defaults to `http://`, as curl does.
    pub fn parsed_url(&self) -> Result<Url> {
        if self.url.is_empty() {
            return Err(Error::validation("url", "missing URL"));
        }
        let raw = if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("http://{}", self.url)
        };
        let mut url = Url::parse(&raw)
            .map_err(|err| Error::validation("url", format!("{}: {err}", self.url)))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::validation(
                    "url",
                    format!("unsupported scheme {other:?}"),
                ));
            }
        }
        if !self.query_params.is_empty() {
            // Running query_pairs_mut unconditionally would append a bare
            // `?`, hence the emptiness check.
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query_params {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Check every invariant the executor relies on. Total: every options
    /// value either passes or yields a `Validation` error naming a field.
    pub fn validate(&self) -> Result<()> {
        self.parsed_url()?;

        if let Some(method) = &self.method {
            if method.is_empty() {
                return Err(Error::validation("method", "empty method"));
            }
            if !method.chars().all(is_token_char) {
                return Err(Error::validation(
                    "method",
                    format!("{method:?} is not a valid HTTP token"),
                ));
            }
        }

        if self.body.is_some() && !self.form.is_empty() {
            return Err(Error::validation("body", "body and form are mutually exclusive"));
        }
        if self.body.is_some() && !self.multipart.is_empty() {
            return Err(Error::validation(
                "body",
                "body and multipart are mutually exclusive",
            ));
        }
        if !self.form.is_empty() && !self.multipart.is_empty() {
            return Err(Error::validation(
                "form",
                "form and multipart are mutually exclusive",
            ));
        }

        if self.basic_auth.is_some() && self.bearer_token.is_some() {
            return Err(Error::validation(
                "auth",
                "basic credentials and bearer token are mutually exclusive",
            ));
        }

        Ok(())
    }
}

// RFC 9110 token characters, the set valid in a method name.
fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(ch)
}

/// Encode `form` pairs as `application/x-www-form-urlencoded`, preserving
/// insertion order.
pub(crate) fn encode_form(form: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in form {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

/// Encode multipart parts with a generated boundary. Returns the
/// `Content-Type` value and the full body bytes. Parts keep insertion
/// order.
pub(crate) fn encode_multipart(parts: &[Part]) -> (String, Vec<u8>) {
    let boundary = format!("rurl-boundary-{}", Uuid::new_v4().simple());
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        body.extend_from_slice(escape_quoted(&part.name).as_bytes());
        body.extend_from_slice(b"\"");
        if let Some(filename) = &part.filename {
            body.extend_from_slice(b"; filename=\"");
            body.extend_from_slice(escape_quoted(filename).as_bytes());
            body.extend_from_slice(b"\"");
        }
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(b"Content-Type: ");
            body.extend_from_slice(content_type.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"--");
    body.extend_from_slice(boundary.as_bytes());
    body.extend_from_slice(b"--\r\n");

    let content_type = format!("multipart/form-data; boundary={boundary}");
    (content_type, body)
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    #[test]
    fn method_implication() {
        let mut options = RequestOptions::new("https://e.test");
        assert_eq!(options.effective_method(), "GET");

        options.body = Some(b"x=1".to_vec());
        assert_eq!(options.effective_method(), "POST");

        options.get_with_query = true;
        assert_eq!(options.effective_method(), "GET");

        options.get_with_query = false;
        options.method = Some("PATCH".into());
        assert_eq!(options.effective_method(), "PATCH");

        let mut options = RequestOptions::new("https://e.test");
        options.head_only = true;
        assert_eq!(options.effective_method(), "HEAD");
    }

    #[test]
    fn url_validation() {
        assert!(matches!(
            RequestOptions::default().validate(),
            Err(Error::Validation { field: "url", .. })
        ));
        assert!(matches!(
            RequestOptions::new("ftp://e.test").validate(),
            Err(Error::Validation { field: "url", .. })
        ));
        assert!(RequestOptions::new("https://e.test/a").validate().is_ok());
    }

    #[test]
    fn scheme_less_url_defaults_to_http() {
        let options = RequestOptions::new("example.test/path");
        assert_eq!(
            options.parsed_url().unwrap().as_str(),
            "http://example.test/path"
        );
    }

    #[test]
    fn query_params_merge_in_order() {
        let mut options = RequestOptions::new("https://e.test/p?a=0");
        options.query_params.push(("b".into(), "1".into()));
        options.query_params.push(("a".into(), "2".into()));
        assert_eq!(
            options.parsed_url().unwrap().as_str(),
            "https://e.test/p?a=0&b=1&a=2"
        );
    }

    #[test]
    fn method_token_validation() {
        let mut options = RequestOptions::new("https://e.test");
        options.method = Some("GE T".into());
        assert!(matches!(
            options.validate(),
            Err(Error::Validation { field: "method", .. })
        ));
        options.method = Some("PURGE".into());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn body_exclusivity() {
        let mut options = RequestOptions::new("https://e.test");
        options.body = Some(b"raw".to_vec());
        options.form.push(("a".into(), "b".into()));
        assert!(matches!(
            options.validate(),
            Err(Error::Validation { field: "body", .. })
        ));

        let mut options = RequestOptions::new("https://e.test");
        options.body = Some(b"raw".to_vec());
        options.multipart.push(Part {
            name: "f".into(),
            filename: None,
            content_type: None,
            data: vec![],
        });
        assert!(matches!(
            options.validate(),
            Err(Error::Validation { field: "body", .. })
        ));
    }

    #[test]
    fn auth_exclusivity() {
        let mut options = RequestOptions::new("https://e.test");
        options.basic_auth = Some(("u".into(), "p".into()));
        options.bearer_token = Some("t".into());
        assert!(matches!(
            options.validate(),
            Err(Error::Validation { field: "auth", .. })
        ));
    }

    #[test]
    fn clone_shares_nothing() {
        let mut original = RequestOptions::new("https://e.test");
        original.headers.insert(
            HeaderName::from_static("x-one"),
            HeaderValue::from_static("1"),
        );
        original.form.push(("k".into(), "v".into()));
        original.query_params.push(("q".into(), "1".into()));

        let mut clone = original.clone();
        clone.headers.insert(
            HeaderName::from_static("x-two"),
            HeaderValue::from_static("2"),
        );
        clone.form.push(("k2".into(), "v2".into()));
        clone.query_params.clear();
        clone.url.push_str("/changed");

        assert_eq!(original.headers.len(), 1);
        assert_eq!(original.form.len(), 1);
        assert_eq!(original.query_params.len(), 1);
        assert_eq!(original.url, "https://e.test");
    }

    #[test]
    fn form_encoding_preserves_order() {
        let form = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1 2".to_string()),
        ];
        assert_eq!(encode_form(&form), "b=2&a=1+2");
    }

    #[test]
    fn multipart_encoding_shape() {
        let parts = vec![
            Part {
                name: "field".into(),
                filename: None,
                content_type: None,
                data: b"value".to_vec(),
            },
            Part {
                name: "upload".into(),
                filename: Some("notes.txt".into()),
                content_type: Some("text/plain".into()),
                data: b"hello".to_vec(),
            },
        ];
        let (content_type, body) = encode_multipart(&parts);
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
        assert!(text.contains(
            "Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n"
        ));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn multipart_boundaries_are_unique() {
        let (a, _) = encode_multipart(&[]);
        let (b, _) = encode_multipart(&[]);
        assert_ne!(a, b);
    }
}
