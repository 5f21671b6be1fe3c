//! Blocking `reqwest` transport.

use std::io::{self, Read};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::{debug, warn};

use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::{HttpResponse, HttpTransport};

/// Builds the blocking client shared by downloads and uploads.
///
/// `timeout` bounds the whole request including the body transfer.
///
/// # Errors
/// Returns a network error if the client cannot be created.
pub fn build_client(
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: &str,
) -> FetchResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| FetchError::network(format!("failed to create HTTP client: {e}")))
}

/// Opens one blocking GET per fetch.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn open(&self, url: &str) -> FetchResult<HttpResponse> {
        debug!(url, "Opening connection");

        let response = self.client.get(url).send().map_err(|e| {
            warn!(url, error = %e, "Request failed");
            classify(&e)
        })?;

        let status = response.status().as_u16();
        Ok(HttpResponse::new(status, Box::new(ResponseBody(response))))
    }
}

/// Response body whose read timeouts surface as `ErrorKind::TimedOut`.
///
/// The blocking client reports a stalled body as `ErrorKind::Other`
/// wrapping a `reqwest::Error`.
struct ResponseBody(Response);

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(mark_timeout)
    }
}

fn mark_timeout(e: io::Error) -> io::Error {
    let timed_out = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(reqwest::Error::is_timeout);
    if timed_out {
        io::Error::new(io::ErrorKind::TimedOut, e)
    } else {
        e
    }
}

pub(super) fn classify(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::timeout(e.to_string())
    } else if e.is_connect() {
        FetchError::network(format!("failed to connect: {e}"))
    } else {
        FetchError::network(e.to_string())
    }
}
