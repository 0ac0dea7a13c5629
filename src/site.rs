//! Site configuration model
//!
//! The site file is the durable source of truth: it is loaded once, filled in
//! by the completion engine, and written back to the same path before any
//! descriptor file is rendered. Parsing goes through a raw serde mirror of
//! the YAML document so every validation failure can name the offending field
//! (`hosts/alice/publicAddress`). Absent and empty-string values normalize to
//! `None`; nothing is silently defaulted.

use std::net::IpAddr;
use std::path::Path;

use indexmap::IndexMap;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::Key;
use crate::mesh::MeshKeyTable;

/// A fully typed site definition
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Mesh subnet that tunnel addresses are allocated from
    pub subnet: IpNet,

    /// WireGuard listen port, shared by every host
    pub port: u16,

    /// Hosts in file order; order drives allocation and output determinism
    pub hosts: IndexMap<String, HostEntry>,

    /// Pairwise pre-shared secrets
    pub mesh_keys: MeshKeyTable,
}

/// One host of the mesh
#[derive(Debug, Clone)]
pub struct HostEntry {
    /// Routable address peers connect to
    pub public_addr: IpAddr,

    /// Address on the mesh interface, assigned during completion if unset
    pub tunnel_addr: Option<IpAddr>,

    pub public_key: Option<Key>,
    pub private_key: Option<Key>,
}

impl HostEntry {
    /// Both halves present; completion regenerates the pair as a unit otherwise
    pub fn has_keypair(&self) -> bool {
        self.public_key.is_some() && self.private_key.is_some()
    }
}

// Raw mirror of the YAML document. Fields stay strings here so validation
// errors can carry the exact path and offending value.

#[derive(Serialize, Deserialize)]
struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<RawNetwork>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hosts: Option<IndexMap<String, RawHost>>,

    #[serde(
        rename = "meshKeys",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    mesh_keys: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
struct RawNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<i64>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawHost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tunnel_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

/// Treat empty and whitespace-only values as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_address(path: &str, value: &str) -> Result<IpAddr> {
    value.trim().parse().map_err(|_| Error::InvalidAddress {
        path: path.to_string(),
        value: value.to_string(),
    })
}

fn parse_key(path: &str, value: &str) -> Result<Key> {
    Key::from_base64(value).map_err(|source| Error::InvalidKey {
        path: path.to_string(),
        value: value.to_string(),
        source,
    })
}

impl SiteConfig {
    /// Load and validate a site file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let raw: RawDocument = serde_yaml::from_str(&content).map_err(|e| Error::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    /// Parse a site definition from a YAML string
    pub fn parse_str(content: &str) -> Result<Self> {
        let raw: RawDocument = serde_yaml::from_str(content).map_err(|e| Error::Yaml {
            path: "<inline>".into(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    /// Write the site definition back as YAML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml_string()?).map_err(|e| Error::io(path, e))
    }

    /// Render the site definition as YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.to_raw()).map_err(|e| Error::Yaml {
            path: "<inline>".into(),
            source: e,
        })
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let network = raw.network.ok_or(Error::MissingSection("network"))?;

        let subnet_raw = network.subnet.ok_or(Error::MissingField {
            section: "network",
            field: "subnet",
        })?;
        let subnet: IpNet = subnet_raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidSubnet(subnet_raw.clone()))?;

        let port_raw = network.port.ok_or(Error::MissingField {
            section: "network",
            field: "port",
        })?;
        if !(1..=65535).contains(&port_raw) {
            return Err(Error::InvalidPort(port_raw));
        }
        let port = port_raw as u16;

        let hosts_raw = raw.hosts.ok_or(Error::MissingSection("hosts"))?;
        if hosts_raw.is_empty() {
            return Err(Error::NoHosts);
        }

        let mut hosts = IndexMap::with_capacity(hosts_raw.len());
        for (hostname, host) in hosts_raw {
            let public_raw = non_empty(host.public_address)
                .ok_or_else(|| Error::MissingPublicAddress(hostname.clone()))?;
            let public_addr =
                parse_address(&format!("hosts/{hostname}/publicAddress"), &public_raw)?;

            let tunnel_addr = non_empty(host.tunnel_address)
                .map(|v| parse_address(&format!("hosts/{hostname}/tunnelAddress"), &v))
                .transpose()?;
            let public_key = non_empty(host.public_key)
                .map(|v| parse_key(&format!("hosts/{hostname}/publicKey"), &v))
                .transpose()?;
            let private_key = non_empty(host.private_key)
                .map(|v| parse_key(&format!("hosts/{hostname}/privateKey"), &v))
                .transpose()?;

            hosts.insert(
                hostname,
                HostEntry {
                    public_addr,
                    tunnel_addr,
                    public_key,
                    private_key,
                },
            );
        }

        let mut mesh_keys = MeshKeyTable::new();
        for (host, peers) in raw.mesh_keys {
            for (peer, value) in peers {
                let key = parse_key(&format!("meshKeys/{host}/{peer}"), &value)?;
                mesh_keys.insert(&host, &peer, key);
            }
        }

        Ok(Self {
            subnet,
            port,
            hosts,
            mesh_keys,
        })
    }

    fn to_raw(&self) -> RawDocument {
        let hosts = self
            .hosts
            .iter()
            .map(|(name, host)| {
                (
                    name.clone(),
                    RawHost {
                        public_address: Some(host.public_addr.to_string()),
                        tunnel_address: host.tunnel_addr.map(|a| a.to_string()),
                        public_key: host.public_key.as_ref().map(Key::to_base64),
                        private_key: host.private_key.as_ref().map(Key::to_base64),
                    },
                )
            })
            .collect();

        let mut mesh_keys: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        for ((a, b), key) in self.mesh_keys.iter() {
            mesh_keys
                .entry(a.clone())
                .or_default()
                .insert(b.clone(), key.to_base64());
        }

        RawDocument {
            network: Some(RawNetwork {
                subnet: Some(self.subnet.to_string()),
                port: Some(i64::from(self.port)),
            }),
            hosts: Some(hosts),
            mesh_keys,
        }
    }
}
