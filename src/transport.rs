use reqwest::blocking::{Client, Request, Response};
use reqwest::redirect::Policy;

use crate::error::{Error, Result};
use crate::options::RequestOptions;

/// The injectable HTTP client. The executor never constructs sockets; it
/// hands fully built requests to a `Transport` and classifies the outcome.
/// Implementations must be safe for concurrent use.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;
}

impl Transport for Client {
    fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        Client::execute(self, request)
    }
}

/// Build a reqwest client configured from the options' transport-level
/// settings. Per-request settings (timeout, headers, body) are applied to
/// each attempt by the executor instead.
pub fn build_client(options: &RequestOptions) -> Result<Client> {
    let mut client = Client::builder().redirect(if options.follow_redirects {
        Policy::limited(options.max_redirects)
    } else {
        Policy::none()
    });

    if options.insecure {
        client = client.danger_accept_invalid_certs(true);
    }

    if let Some(connect_timeout) = options.connect_timeout {
        client = client.connect_timeout(connect_timeout);
    }

    // Without --compressed the request advertises no codings and the
    // response arrives verbatim.
    if !options.compressed {
        client = client.no_gzip().no_deflate().no_brotli();
    }

    client.build().map_err(Error::Transport)
}
