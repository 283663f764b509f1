use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid user id: {0}")]
pub struct InvalidUserId(String);

/// Fully-qualified Matrix user identifier, `@localpart:domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId {
    localpart: String,
    domain: String,
}

impl UserId {
    pub fn new(localpart: &str, domain: &str) -> Result<Self, InvalidUserId> {
        validate_localpart(localpart)?;
        validate_server_name(domain)?;
        Ok(Self {
            localpart: localpart.to_string(),
            domain: domain.to_string(),
        })
    }

    pub fn localpart(&self) -> &str {
        &self.localpart
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Localparts are limited to `a-z`, `0-9` and `._=-+`, and may not be a
/// dot segment.
pub fn validate_localpart(localpart: &str) -> Result<(), InvalidUserId> {
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._=-+".contains(c);
    if localpart.is_empty()
        || matches!(localpart, "." | "..")
        || !localpart.chars().all(allowed)
    {
        return Err(InvalidUserId(format!(
            "localpart {localpart:?} must be non-empty and use only a-z, 0-9 and ._=-+"
        )));
    }
    Ok(())
}

/// Server names are a DNS name, an IPv4 literal or a bracketed IPv6
/// literal, with an optional `:port`.
pub fn validate_server_name(name: &str) -> Result<(), InvalidUserId> {
    let invalid = || InvalidUserId(format!("{name:?} is not a valid server name"));

    let (host, port) = if let Some(rest) = name.strip_prefix('[') {
        let (literal, rest) = rest.split_once(']').ok_or_else(invalid)?;
        literal.parse::<Ipv6Addr>().map_err(|_| invalid())?;
        match rest {
            "" => (None, None),
            _ => (None, Some(rest.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match name.rsplit_once(':') {
            Some((host, port)) => (Some(host), Some(port)),
            None => (Some(name), None),
        }
    };

    if let Some(host) = host {
        let dns_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '.';
        if host.is_empty()
            || host.len() > 255
            || host.chars().all(|c| c == '.')
            || !host.chars().all(dns_char)
        {
            return Err(invalid());
        }
    }
    if let Some(port) = port {
        if port.is_empty() || port.len() > 5 || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    Ok(())
}

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| InvalidUserId(format!("{s:?} does not start with '@'")))?;
        // Domains may carry a port, localparts never contain ':'
        let (localpart, domain) = rest
            .split_once(':')
            .ok_or_else(|| InvalidUserId(format!("{s:?} has no ':domain' part")))?;
        Self::new(localpart, domain)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{}", self.localpart, self.domain)
    }
}
