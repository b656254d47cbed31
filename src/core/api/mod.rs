//! Client side of the gateway contract: the transport seam, response
//! normalization, and typed endpoint wrappers.

pub mod envelope;
pub mod error;
pub mod gateway;
pub mod transport;
pub mod types;

pub use envelope::{Payload, normalize};
pub use error::{ApiError, ApiResult};
pub use gateway::Gateway;
pub use transport::{ApiRequest, HttpTransport, Method, Transport};
pub use types::*;
