use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Network location a finding was observed at.
///
/// Everything except the host is optional, which mirrors what scanners
/// actually emit: some report full URLs, some only `host:port`, some a bare
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo: Option<String>,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Path without the leading slash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

/// One comparable part of an [`Endpoint`].
///
/// Deduplication compares endpoints only on a configured subset of fields,
/// so e.g. the same vulnerability found on two ports can be treated as one
/// finding by dropping `Port` from the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointField {
    Protocol,
    Userinfo,
    Host,
    Port,
    Path,
    Query,
    Fragment,
}

impl EndpointField {
    /// The full field set: endpoints must agree on every part.
    pub const ALL: [EndpointField; 7] = [
        EndpointField::Protocol,
        EndpointField::Userinfo,
        EndpointField::Host,
        EndpointField::Port,
        EndpointField::Path,
        EndpointField::Query,
        EndpointField::Fragment,
    ];
}

impl fmt::Display for EndpointField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointField::Protocol => "protocol",
            EndpointField::Userinfo => "userinfo",
            EndpointField::Host => "host",
            EndpointField::Port => "port",
            EndpointField::Path => "path",
            EndpointField::Query => "query",
            EndpointField::Fragment => "fragment",
        };
        f.write_str(s)
    }
}

impl FromStr for EndpointField {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "protocol" | "scheme" => Ok(EndpointField::Protocol),
            "userinfo" => Ok(EndpointField::Userinfo),
            "host" => Ok(EndpointField::Host),
            "port" => Ok(EndpointField::Port),
            "path" => Ok(EndpointField::Path),
            "query" => Ok(EndpointField::Query),
            "fragment" => Ok(EndpointField::Fragment),
            other => Err(ModelError::UnknownEndpointField(other.to_string())),
        }
    }
}

impl Endpoint {
    /// Create an endpoint from a bare host.
    pub fn from_host(host: impl Into<String>) -> Self {
        Self {
            protocol: None,
            userinfo: None,
            host: host.into(),
            port: None,
            path: None,
            query: None,
            fragment: None,
        }
    }

    /// Compare two endpoints on the given fields only.
    ///
    /// An empty field list disables endpoint comparison entirely: any two
    /// endpoints are considered equal. Callers that want full equality pass
    /// [`EndpointField::ALL`].
    pub fn matches_on(&self, other: &Endpoint, fields: &[EndpointField]) -> bool {
        fields.iter().all(|field| match field {
            EndpointField::Protocol => self.protocol == other.protocol,
            EndpointField::Userinfo => self.userinfo == other.userinfo,
            EndpointField::Host => self.host == other.host,
            EndpointField::Port => self.port == other.port,
            EndpointField::Path => self.path == other.path,
            EndpointField::Query => self.query == other.query,
            EndpointField::Fragment => self.fragment == other.fragment,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(protocol) = &self.protocol {
            write!(f, "{protocol}://")?;
        }
        if let Some(userinfo) = &self.userinfo {
            write!(f, "{userinfo}@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = ModelError;

    /// Parse a URL-ish endpoint string.
    ///
    /// Accepts full URLs (`https://user@host:8443/a/b?q=1#frag`), bare
    /// `host:port` pairs and bare hosts. A trailing port is only treated as
    /// such when it is all digits, so IPv6-style text stays in the host.
    fn from_str(s: &str) -> ModelResult<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ModelError::InvalidEndpoint("empty endpoint".to_string()));
        }

        let (protocol, rest) = match raw.split_once("://") {
            Some((p, r)) if !p.is_empty() => (Some(p.to_string()), r),
            Some((_, r)) => (None, r),
            None => (None, raw),
        };

        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r, some_nonempty(f)),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, some_nonempty(q)),
            None => (rest, None),
        };
        let (authority, path) = match rest.split_once('/') {
            Some((a, p)) => (a, some_nonempty(p)),
            None => (rest, None),
        };

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((u, h)) => (some_nonempty(u), h),
            None => (None, authority),
        };

        let (host, port) = match hostport.rsplit_once(':') {
            Some((h, p))
                if !p.is_empty() && !h.ends_with(':') && p.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let port = p
                    .parse::<u16>()
                    .map_err(|_| ModelError::InvalidEndpoint(format!("port out of range: {p}")))?;
                (h, Some(port))
            }
            _ => (hostport, None),
        };

        if host.is_empty() {
            return Err(ModelError::InvalidEndpoint(format!("no host in: {raw}")));
        }

        Ok(Endpoint {
            protocol,
            userinfo,
            host: host.to_string(),
            port,
            path,
            query,
            fragment,
        })
    }
}

fn some_nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
