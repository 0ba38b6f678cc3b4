use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

use crate::domains::location::client_ip;

/// Extension key for the caller's public IP address. `None` when only private
/// or unparseable addresses were seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Middleware to extract the client's public IP address from the request
///
/// Priority: X-Forwarded-For (first entry), X-Real-IP, CF-Connecting-IP,
/// X-Client-IP, then the socket address when the server runs with connect info.
pub async fn extract_client_ip(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer);

    request.extensions_mut().insert(ClientIp(ip));

    next.run(request).await
}
