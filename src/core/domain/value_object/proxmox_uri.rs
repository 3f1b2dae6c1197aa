use crate::core::domain::{
    error::{ControlPlaneResult, ValidationError},
    value_object::{
        proxmox_host::ProxmoxHost,
        proxmox_port::{DEFAULT_PROXMOX_PORT, ProxmoxPort},
    },
};
use std::net::IpAddr;
use url::Url;

const ALLOWED_SCHEMES: [&str; 2] = ["https", "http"];
const MAX_URL_LENGTH: usize = 2083; // RFC 7230
const API_PREFIX: &str = "api2/json";

/// Represents a validated Proxmox API base URL
///
/// The value always ends with a trailing slash and carries no path,
/// e.g. `https://pve.example.com:8006/`. Endpoints are derived from it
/// with [`ProxmoxUrl::endpoint`].
///
/// # Examples
///
/// ```
/// use leeca_control_plane::ProxmoxUrl;
///
/// let url = ProxmoxUrl::from_cluster_host("pve.example.com").unwrap();
/// assert_eq!(url.as_str(), "https://pve.example.com:8006/");
/// assert_eq!(
///     url.endpoint("nodes"),
///     "https://pve.example.com:8006/api2/json/nodes"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUrl(Url);

impl ProxmoxUrl {
    /// Builds the base URL from its validated parts.
    pub fn new(host: &ProxmoxHost, port: &ProxmoxPort, secure: bool) -> ControlPlaneResult<Self> {
        let scheme = if secure { "https" } else { "http" };
        let url = format!("{}://{}:{}/", scheme, host.as_authority(), port.get());
        validate_url(&url)?;
        let parsed = Url::parse(&url)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        Ok(Self(parsed))
    }

    /// Interprets the `host` column stored on a cluster.
    ///
    /// Accepted forms are `hostname`, `hostname:port`, `[v6addr]:port`
    /// (all HTTPS) and a full `http(s)://` URL, which keeps its scheme.
    /// The port is 8006 whenever none is written out.
    pub fn from_cluster_host(raw: &str) -> ControlPlaneResult<Self> {
        let raw = raw.trim();

        if raw.contains("://") {
            validate_url(raw)?;
            let parsed = Url::parse(raw)
                .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
            let host = parsed.host_str().ok_or_else(|| ValidationError::Field {
                field: "host".to_string(),
                message: "URL has no host".to_string(),
            })?;
            let host = ProxmoxHost::new(host.trim_start_matches('[').trim_end_matches(']'))?;
            // `Url` drops a port equal to the scheme default, so look at the text
            let port = match parsed.port_or_known_default() {
                Some(port) if has_explicit_port(raw) => port,
                _ => DEFAULT_PROXMOX_PORT,
            };
            let port = ProxmoxPort::new(port)?;
            return Self::new(&host, &port, parsed.scheme() == "https");
        }

        let (host, port) = split_host_port(raw)?;
        Self::new(&ProxmoxHost::new(host)?, &ProxmoxPort::new(port)?, true)
    }

    /// Creates a URL without validation. The value must be absolute.
    #[cfg(test)]
    pub(crate) fn new_unchecked(value: &str) -> Self {
        let value = if value.ends_with('/') {
            value.to_string()
        } else {
            format!("{}/", value)
        };
        Self(Url::parse(&value).expect("test URL must be absolute"))
    }

    /// Returns the base URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the full JSON API URL for `path` (relative to `/api2/json`).
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.0.as_str().trim_end_matches('/'),
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }
}

fn split_host_port(raw: &str) -> Result<(&str, u16), ValidationError> {
    if raw.parse::<IpAddr>().is_ok() {
        return Ok((raw, DEFAULT_PROXMOX_PORT));
    }

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            ValidationError::Format(format!("Unterminated IPv6 literal in {:?}", raw))
        })?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, parse_port(port)?)),
            None if tail.is_empty() => Ok((host, DEFAULT_PROXMOX_PORT)),
            None => Err(ValidationError::Format(format!(
                "Unexpected text after IPv6 literal in {:?}",
                raw
            ))),
        };
    }

    match raw.split_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((raw, DEFAULT_PROXMOX_PORT)),
    }
}

/// Whether the authority of an absolute URL carries a `:port`.
fn has_explicit_port(raw: &str) -> bool {
    let authority = raw
        .split_once("://")
        .map_or(raw, |(_, rest)| rest)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let after_host = host_port.rsplit_once(']').map_or(host_port, |(_, tail)| tail);
    after_host.contains(':')
}

fn parse_port(port: &str) -> Result<u16, ValidationError> {
    port.parse::<u16>().map_err(|_| ValidationError::Field {
        field: "port".to_string(),
        message: format!("Invalid port {:?}", port),
    })
}

/// Validates an absolute API URL.
pub(crate) fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::Field {
            field: "url".to_string(),
            message: "URL cannot be empty".to_string(),
        });
    }

    if url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::Format(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        )));
    }

    let parsed =
        Url::parse(url).map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ValidationError::ConstraintViolation(format!(
            "Invalid scheme. Must be one of: {}",
            ALLOWED_SCHEMES.join(", ")
        )));
    }

    Ok(())
}
