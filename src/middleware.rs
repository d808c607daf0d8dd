use reqwest::blocking::Request;

use crate::error::Result;

/// A request hook: receives the request built for one attempt and returns
/// it, possibly transformed. Hooks run in registration order, once per
/// attempt, after the per-attempt clone and before the send. They see the
/// request only; the options record is out of reach and stays untouched.
pub trait RequestHook: Send + Sync {
    fn transform(&self, request: Request) -> Result<Request>;
}

impl<F> RequestHook for F
where
    F: Fn(Request) -> Result<Request> + Send + Sync,
{
    fn transform(&self, request: Request) -> Result<Request> {
        self(request)
    }
}
