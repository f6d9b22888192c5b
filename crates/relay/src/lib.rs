//! Hotlink-bypass relay for hondana.
//!
//! Image hosts of many sources refuse requests that don't look like they come
//! from the source's own site. [`Relay::fetch`] replays such requests with the
//! source's header policy and streams the origin's response back unchanged.

pub mod error;
mod path;
mod relay;
pub mod transport;

pub use crate::path::{parse_proxy_path, proxy_path};
pub use crate::relay::Relay;
pub use crate::transport::{ByteStream, HttpTransport, Outbound, Transport, TransportHandle, Upstream};
