use std::{
    fmt::Display,
    net::{IpAddr, SocketAddr},
};

use serde_yaml::{Mapping, Value};

use crate::{error::NodeRejection, resolver::HostResolver};

/// Fields every node record must carry, checked in this order.
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "server", "port", "type"];

/// Protocol tag of the TLS-obfuscation variant that needs extra checks.
const REALITY_TYPE: &str = "vless";
const REALITY_OPTS: &str = "reality-opts";
const REALITY_SHORT_ID: &str = "short-id";

/// Network identity used to detect duplicates within a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedIdentity {
    pub ip: IpAddr,
    pub port: u16,
}

impl Display for ResolvedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

/// One validated node of a subscription.
///
/// The essential fields are extracted for the pipeline, while `raw` keeps the
/// record exactly as received so it can be written back out untouched.
#[derive(Debug, Clone)]
pub struct ProxyNode {
    name: String,
    server: String,
    port: u16,
    kind: String,
    raw: Mapping,
    resolved_ip: Option<IpAddr>, // Cached for the lifetime of this node only.
}

impl ProxyNode {
    /// Validates a raw record taken from a `proxies` list.
    ///
    /// # Arguments
    ///
    /// * `raw`: Any YAML value; only mappings can become nodes.
    ///
    /// # Returns
    ///
    /// The validated node, or the reason it was rejected.
    pub fn from_value(raw: Value) -> Result<Self, NodeRejection> {
        match raw {
            Value::Mapping(mapping) => Self::from_mapping(mapping),
            Value::Tagged(tagged) => Self::from_value(tagged.value),
            _ => Err(NodeRejection::NotAMapping),
        }
    }

    /// Validates a raw node mapping.
    pub fn from_mapping(raw: Mapping) -> Result<Self, NodeRejection> {
        if let Some(field) = REQUIRED_FIELDS.iter().find(|field| !raw.contains_key(**field)) {
            return Err(NodeRejection::MissingField(*field));
        }

        let name = field_string(&raw, "name")?;
        let server = field_string(&raw, "server")?;
        let kind = field_string(&raw, "type")?;
        let port = raw
            .get("port")
            .and_then(port_number)
            .ok_or(NodeRejection::InvalidField("port"))?;

        if kind.eq_ignore_ascii_case(REALITY_TYPE) {
            if let Some(opts) = raw.get(REALITY_OPTS) {
                check_reality_opts(opts)?;
            }
        }

        Ok(Self {
            name,
            server,
            port,
            kind,
            raw,
            resolved_ip: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Protocol tag, as found in the record's `type` field.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn raw(&self) -> &Mapping {
        &self.raw
    }

    pub fn into_raw(self) -> Mapping {
        self.raw
    }

    /// Resolves the node's host to a single address.
    ///
    /// A successful answer is remembered by this node, so asking twice costs one
    /// lookup. Failures are not remembered and yield `None`.
    ///
    /// # Arguments
    ///
    /// * `resolver`: The resolver performing the lookup.
    pub async fn resolve_ip(&mut self, resolver: &dyn HostResolver) -> Option<IpAddr> {
        if let Some(ip) = self.resolved_ip {
            return Some(ip);
        }

        match resolver.resolve(&self.server).await {
            Ok(ip) => {
                self.resolved_ip = Some(ip);
                Some(ip)
            }
            Err(_e) => {
                #[cfg(feature = "log")]
                log::debug!("{}: {}", self, _e);
                None
            }
        }
    }

    /// Resolves the `(ip, port)` pair that identifies this node on the network.
    pub async fn identity(&mut self, resolver: &dyn HostResolver) -> Option<ResolvedIdentity> {
        let port = self.port;
        self.resolve_ip(resolver)
            .await
            .map(|ip| ResolvedIdentity { ip, port })
    }
}

impl Display for ProxyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Node {} {}:{}>", self.name, self.server, self.port)
    }
}

fn field_string(raw: &Mapping, field: &'static str) -> Result<String, NodeRejection> {
    raw.get(field)
        .and_then(scalar_string)
        .ok_or(NodeRejection::InvalidField(field))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}

fn port_number(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|port| u16::try_from(port).ok()),
        Value::String(s) => s.trim().parse().ok(),
        Value::Tagged(tagged) => port_number(&tagged.value),
        _ => None,
    }
}

fn check_reality_opts(opts: &Value) -> Result<(), NodeRejection> {
    let Value::Mapping(opts) = opts else {
        return Err(NodeRejection::InvalidProtocolOptions("reality-opts is not a mapping"));
    };
    match opts.get(REALITY_SHORT_ID) {
        Some(short_id) if is_present(short_id) => Ok(()),
        _ => Err(NodeRejection::InvalidProtocolOptions("missing or empty short-id")),
    }
}

/// Whether a value counts as "set": not null, empty, zero or false.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_present(&tagged.value),
    }
}
