#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

//! Authenticated request pipeline for the Rently API.
//!
//! Every call goes through [`ApiClient::execute`]. The client attaches the
//! session token, unwraps the server envelope, and recovers from an expired
//! token with a single shared refresh per cycle.

pub mod client;
pub mod config;
pub mod credentials;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod refresh;
pub mod session;
pub mod transport;

pub use crate::client::ApiClient;
pub use crate::config::ClientConfig;
pub use crate::credentials::CredentialStore;
pub use crate::descriptor::{FormPart, MultipartForm, Payload, RequestDescriptor};
pub use crate::envelope::ResponseEnvelope;
pub use crate::error::{ApiError, RefreshError, TransportError};
pub use crate::refresh::RefreshCoordinator;
pub use crate::session::{SessionEvent, SessionTeardown};
pub use crate::transport::{OutgoingBody, OutgoingRequest, RawResponse, ReqwestTransport, Transport};
