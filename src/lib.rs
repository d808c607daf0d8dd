//! Run shell-style curl command lines as HTTP requests.
//!
//! A command arrives as a single string, an argv-like slice, or a
//! programmatically built [`RequestOptions`]; it is parsed, interpolated,
//! validated, and executed over a blocking transport with optional retries.
//!
//! ```no_run
//! use rurl::Context;
//!
//! let ctx = Context::background();
//! let (body, response) =
//!     rurl::curl_string(&ctx, "curl -H 'Accept: application/json' https://example.com")?;
//! assert!(response.status().is_success());
//! println!("{body}");
//! # Ok::<(), rurl::Error>(())
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod executor;
pub mod flags;
pub mod interpolate;
pub mod middleware;
pub mod options;
pub mod response;
pub mod to_curl;
pub mod tokenizer;
pub mod transport;

mod download;
mod pool;

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use url::Url;

pub use crate::builder::Builder;
pub use crate::context::Context;
pub use crate::error::{Error, Result};
pub use crate::executor::Executor;
pub use crate::middleware::RequestHook;
pub use crate::options::{Part, Presentation, RequestOptions, RetryConfig};
pub use crate::response::Response;
pub use crate::transport::Transport;

use crate::interpolate::Resolver;

/// Parse a command string into options, resolving `$VAR` references from
/// the process environment.
pub fn parse(command: &str) -> Result<RequestOptions> {
    parse_resolved(command, Resolver::Environment)
}

/// Parse a command string, resolving `$VAR` references from `vars` only.
/// The process environment is never consulted.
pub fn parse_with_vars(command: &str, vars: &HashMap<String, String>) -> Result<RequestOptions> {
    parse_resolved(command, Resolver::Vars(vars))
}

fn parse_resolved(command: &str, resolver: Resolver) -> Result<RequestOptions> {
    let normalized = tokenizer::preprocess(command)?;
    let words = tokenizer::tokenize(&normalized)?;
    let tokens = interpolate::resolve(words, resolver);
    flags::parse_tokens(tokens, true)
}

/// Execute a pre-tokenized argv, e.g. the CLI's trailing arguments. No
/// quote handling and no variable interpolation are applied.
pub fn curl_args<S: AsRef<str>>(ctx: &Context, args: &[S]) -> Result<Response> {
    let options = flags::parse_argv(args)?;
    execute(ctx, &options)
}

/// Run a command string and read the body as text.
pub fn curl_string(ctx: &Context, command: &str) -> Result<(String, Response)> {
    let options = parse(command)?;
    let mut response = execute(ctx, &options)?;
    let body = response.text()?;
    Ok((body, response))
}

pub fn curl_string_with_vars(
    ctx: &Context,
    vars: &HashMap<String, String>,
    command: &str,
) -> Result<(String, Response)> {
    let options = parse_with_vars(command, vars)?;
    let mut response = execute(ctx, &options)?;
    let body = response.text()?;
    Ok((body, response))
}

/// Run a command string and read the body as raw bytes.
pub fn curl_bytes(ctx: &Context, command: &str) -> Result<(Vec<u8>, Response)> {
    let options = parse(command)?;
    let mut response = execute(ctx, &options)?;
    let bytes = response.bytes()?.to_vec();
    Ok((bytes, response))
}

pub fn curl_bytes_with_vars(
    ctx: &Context,
    vars: &HashMap<String, String>,
    command: &str,
) -> Result<(Vec<u8>, Response)> {
    let options = parse_with_vars(command, vars)?;
    let mut response = execute(ctx, &options)?;
    let bytes = response.bytes()?.to_vec();
    Ok((bytes, response))
}

/// Run a command string and decode the JSON body.
pub fn curl_json<T: DeserializeOwned>(ctx: &Context, command: &str) -> Result<(T, Response)> {
    let options = parse(command)?;
    let mut response = execute(ctx, &options)?;
    let value = response.json()?;
    Ok((value, response))
}

pub fn curl_json_with_vars<T: DeserializeOwned>(
    ctx: &Context,
    vars: &HashMap<String, String>,
    command: &str,
) -> Result<(T, Response)> {
    let options = parse_with_vars(command, vars)?;
    let mut response = execute(ctx, &options)?;
    let value = response.json()?;
    Ok((value, response))
}

/// Run a command string and stream the body to `path`. Returns the number
/// of bytes written.
pub fn curl_download(ctx: &Context, path: &Path, command: &str) -> Result<(u64, Response)> {
    let options = parse(command)?;
    let mut response = execute(ctx, &options)?;
    let written = response.save_to(path)?;
    Ok((written, response))
}

pub fn curl_download_with_vars(
    ctx: &Context,
    vars: &HashMap<String, String>,
    path: &Path,
    command: &str,
) -> Result<(u64, Response)> {
    let options = parse_with_vars(command, vars)?;
    let mut response = execute(ctx, &options)?;
    let written = response.save_to(path)?;
    Ok((written, response))
}

/// Validate and execute an options record over a default client built from
/// its transport settings.
pub fn execute(ctx: &Context, options: &RequestOptions) -> Result<Response> {
    process(ctx, options).map(|(response, _)| response)
}

/// Like [`execute`], but over a caller-supplied transport.
pub fn execute_with(
    ctx: &Context,
    options: &RequestOptions,
    transport: &dyn Transport,
) -> Result<Response> {
    Executor::new(transport)
        .process(ctx, options)
        .map(|(response, _)| response)
}

/// Lower-level variant of [`execute`] that also exposes the fully resolved
/// URL (query parameters merged, `-G` data applied).
pub fn process(ctx: &Context, options: &RequestOptions) -> Result<(Response, Url)> {
    let client = transport::build_client(options)?;
    let result = Executor::new(&client).process(ctx, options);
    result
}
