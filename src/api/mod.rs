//! Control-plane API surface for Cloud.dk cloud servers.
//!
//! The lifecycle manager only depends on the [`ControlPlane`] trait so tests
//! can script responses; [`CloudApi`] is the HTTP implementation used by the
//! driver.

mod client;
mod error;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use client::{ApiSettings, CloudApi, DEFAULT_API_ENDPOINT, RetryPolicy};
pub use error::ApiError;
pub use types::{IpAddressBody, NetworkInterfaceBody, ServerBody, ServerCreateBody};

/// Future returned by control-plane operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Cloud server operations offered by the control plane.
pub trait ControlPlane: Send + Sync {
    /// Issues `POST /cloudservers` and returns the created server.
    fn create_server<'a>(&'a self, body: &'a ServerCreateBody) -> ApiFuture<'a, ServerBody>;

    /// Issues `GET /cloudservers?hostname=<hostname>`.
    ///
    /// The control plane may return partial matches; callers filter.
    fn list_servers<'a>(&'a self, hostname: &'a str) -> ApiFuture<'a, Vec<ServerBody>>;

    /// Issues `GET /cloudservers/<id>`.
    fn get_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ServerBody>;

    /// Issues `DELETE /cloudservers/<id>`, treating an absent server as
    /// already deleted.
    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()>;
}
