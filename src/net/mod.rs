//! TCP networking primitives.
//!
//! Provides endpoints, descriptors and the owning socket wrapper the server stores in its maps.

pub mod endpoint;
pub(crate) mod socket;
pub(crate) mod utils;

pub use endpoint::Endpoint;
pub use socket::Descriptor;
