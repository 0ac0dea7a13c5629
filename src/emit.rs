//! Descriptor rendering
//!
//! Renders a completed host into the two systemd-networkd files that bring
//! the mesh interface up: `wg0.network` (interface match, own address, mesh
//! route) and `wg0.netdev` (device, private key, one peer block per other
//! host). Sections are either single-record or repeated-record; one renderer
//! handles both.

use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::keys::Key;
use crate::site::{HostEntry, SiteConfig};

/// Mesh interface name used in every descriptor
pub const INTERFACE: &str = "wg0";

/// Keepalive interval for every peer, in seconds
const KEEPALIVE_SECS: u32 = 25;

type Fields = Vec<(&'static str, String)>;

/// One INI section of a descriptor
#[derive(Debug, Clone)]
pub enum Section {
    /// Renders exactly once
    Single { name: &'static str, fields: Fields },

    /// Renders once per record, list order preserved
    Repeated {
        name: &'static str,
        records: Vec<Fields>,
    },
}

/// An ordered list of sections, rendered to flat INI text
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    sections: Vec<Section>,
}

impl Descriptor {
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Render all sections, each record followed by a blank line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match section {
                Section::Single { name, fields } => render_record(&mut out, name, fields),
                Section::Repeated { name, records } => {
                    for fields in records {
                        render_record(&mut out, name, fields);
                    }
                }
            }
        }
        out
    }
}

fn render_record(out: &mut String, name: &str, fields: &[(&'static str, String)]) {
    // String formatting cannot fail
    let _ = writeln!(out, "[{name}]");
    for (key, value) in fields {
        let _ = writeln!(out, "{key} = {value}");
    }
    out.push('\n');
}

fn completed_host<'a>(site: &'a SiteConfig, hostname: &str) -> Result<&'a HostEntry> {
    site.hosts
        .get(hostname)
        .ok_or_else(|| Error::Internal(format!("unknown host {hostname}")))
}

fn tunnel_addr(hostname: &str, host: &HostEntry) -> Result<std::net::IpAddr> {
    host.tunnel_addr
        .ok_or_else(|| Error::Internal(format!("host {hostname} has no tunnel address")))
}

fn key_of<'a>(hostname: &str, field: &str, key: &'a Option<Key>) -> Result<&'a Key> {
    key.as_ref()
        .ok_or_else(|| Error::Internal(format!("host {hostname} has no {field}")))
}

/// Build the interface descriptor (`wg0.network`) for one host
pub fn interface_descriptor(site: &SiteConfig, hostname: &str) -> Result<Descriptor> {
    let host = completed_host(site, hostname)?;
    let addr = tunnel_addr(hostname, host)?;

    let mut doc = Descriptor::default();
    doc.push(Section::Single {
        name: "Match",
        fields: vec![("Name", INTERFACE.to_string())],
    });
    doc.push(Section::Single {
        name: "Network",
        fields: vec![("Address", format!("{addr}/32"))],
    });
    doc.push(Section::Single {
        name: "Route",
        fields: vec![("Destination", site.subnet.to_string())],
    });
    Ok(doc)
}

/// Build the device descriptor (`wg0.netdev`) for one host
pub fn device_descriptor(site: &SiteConfig, hostname: &str) -> Result<Descriptor> {
    let host = completed_host(site, hostname)?;
    let private_key = key_of(hostname, "private key", &host.private_key)?;

    let mut doc = Descriptor::default();
    doc.push(Section::Single {
        name: "NetDev",
        fields: vec![
            ("Name", INTERFACE.to_string()),
            ("Kind", "wireguard".to_string()),
            ("Description", format!("wg server {}", site.subnet)),
        ],
    });
    doc.push(Section::Single {
        name: "WireGuard",
        fields: vec![
            ("ListenPort", site.port.to_string()),
            ("PrivateKey", private_key.to_base64()),
        ],
    });

    let mut peers = Vec::new();
    for (peer_name, peer) in &site.hosts {
        if peer_name == hostname {
            continue;
        }
        let peer_key = key_of(peer_name, "public key", &peer.public_key)?;
        let psk = site.mesh_keys.lookup(hostname, peer_name)?;
        let peer_addr = tunnel_addr(peer_name, peer)?;

        peers.push(vec![
            ("PublicKey", peer_key.to_base64()),
            ("PresharedKey", psk.to_base64()),
            ("AllowedIPs", format!("{peer_addr}/32")),
            ("Endpoint", format!("{}:{}", peer.public_addr, site.port)),
            ("PersistentKeepalive", KEEPALIVE_SECS.to_string()),
        ]);
    }
    doc.push(Section::Repeated {
        name: "WireGuardPeer",
        records: peers,
    });
    Ok(doc)
}

/// Write both descriptor files for one host under `<out_root>/<hostname>/`
pub fn write_host(site: &SiteConfig, hostname: &str, out_root: &Path) -> Result<()> {
    let network = interface_descriptor(site, hostname)?;
    let netdev = device_descriptor(site, hostname)?;

    let dir = out_root.join(hostname);
    std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    let network_path = dir.join(format!("{INTERFACE}.network"));
    std::fs::write(&network_path, network.render()).map_err(|e| Error::io(&network_path, e))?;

    let netdev_path = dir.join(format!("{INTERFACE}.netdev"));
    std::fs::write(&netdev_path, netdev.render()).map_err(|e| Error::io(&netdev_path, e))?;

    debug!("wrote descriptors for {} to {:?}", hostname, dir);
    Ok(())
}

/// Write descriptor files for every host, in site file order
pub fn write_all(site: &SiteConfig, out_root: &Path) -> Result<()> {
    for hostname in site.hosts.keys() {
        write_host(site, hostname, out_root)?;
    }
    info!(
        "wrote descriptors for {} hosts to {:?}",
        site.hosts.len(),
        out_root
    );
    Ok(())
}
