//! Port for opening streamed HTTP downloads.

use std::io::Read;

use crate::domain::errors::FetchResult;

/// Streamed response of a single request.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body. Dropping it releases the connection.
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: Box<dyn Read + Send>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Port for opening one connection per fetch.
/// Implementations must apply connect and read timeouts.
pub trait HttpTransport: Send + Sync {
    /// Opens a GET request and returns the streamed response.
    ///
    /// # Errors
    /// Returns error if the connection cannot be established.
    fn open(&self, url: &str) -> FetchResult<HttpResponse>;
}
