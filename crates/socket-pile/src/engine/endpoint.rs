//! Address resolution for listeners and dialers.
//!
//! Addresses use the `host:port` form, with `[v6]:port` for IPv6 literals and
//! an empty host (`:port`) meaning every interface when binding and the local
//! host when dialing. `unix` addresses are filesystem paths.

use crate::error::AddressError;
use pile_common::{Family, Transport};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Inet(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{}", addr),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Split `host:port` into its parts. Brackets around IPv6 hosts are removed.
pub fn split_host_port(address: &str) -> Result<(&str, u16), AddressError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| AddressError::TooManyColons(address.to_string()))?,
        None if host.contains(':') => {
            return Err(AddressError::TooManyColons(address.to_string()));
        }
        None => host,
    };

    if port.is_empty() {
        return Err(AddressError::MissingPort(address.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| AddressError::InvalidPort(address.to_string()))?;
    Ok((host, port))
}

fn family_matches(family: Family, addr: &SocketAddr) -> bool {
    match family {
        Family::Any => true,
        Family::V4 => addr.is_ipv4(),
        Family::V6 => addr.is_ipv6(),
    }
}

fn unspecified(family: Family) -> IpAddr {
    match family {
        Family::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        Family::Any | Family::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    }
}

fn loopback_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
    }
}

fn unix_endpoint(address: &str) -> Result<Endpoint, AddressError> {
    if cfg!(unix) {
        Ok(Endpoint::Unix(PathBuf::from(address)))
    } else {
        Err(AddressError::UnixUnsupported)
    }
}

async fn lookup(transport: Transport, host: &str, port: u16) -> Result<SocketAddr, AddressError> {
    let family = transport.family();
    let address = format!("{}:{}", host, port);

    if let Ok(ip) = host.parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, port);
        return if family_matches(family, &addr) {
            Ok(addr)
        } else {
            Err(AddressError::NoMatchingAddress { transport, address })
        };
    }

    let mut candidates = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| AddressError::Lookup {
            address: address.clone(),
            source,
        })?;
    candidates
        .find(|addr| family_matches(family, addr))
        .ok_or(AddressError::NoMatchingAddress { transport, address })
}

/// Resolve the address the acceptor binds to.
pub async fn resolve_bind(transport: Transport, address: &str) -> Result<Endpoint, AddressError> {
    if transport == Transport::Unix {
        return unix_endpoint(address);
    }
    let (host, port) = split_host_port(address)?;
    if host.is_empty() {
        return Ok(Endpoint::Inet(SocketAddr::new(
            unspecified(transport.family()),
            port,
        )));
    }
    lookup(transport, host, port).await.map(Endpoint::Inet)
}

/// Resolve the address workers dial when no local acceptor is bound.
pub async fn resolve_dial(transport: Transport, address: &str) -> Result<Endpoint, AddressError> {
    resolve_bind(transport, address).await.map(|e| dial_target(&e))
}

/// Turn a bound endpoint into something a client can connect to.
///
/// An unspecified IP (`0.0.0.0` or `::`) becomes the loopback address of the
/// same family. Everything else is returned unchanged.
pub fn dial_target(bound: &Endpoint) -> Endpoint {
    match bound {
        Endpoint::Inet(addr) if addr.ip().is_unspecified() => {
            Endpoint::Inet(SocketAddr::new(loopback_for(addr.ip()), addr.port()))
        }
        other => other.clone(),
    }
}
