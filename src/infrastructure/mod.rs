//! 基础设施层：持有 cookie jar 等独占资源，只暴露发请求的能力

pub mod http_transport;
pub mod transport;

pub use http_transport::{HttpTransport, HttpTransportOptions};
pub use transport::{
    Method, PortalRequest, PortalResponse, Transport, TransportFactory, SESSION_COOKIE,
};
