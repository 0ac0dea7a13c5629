//! Completion engine
//!
//! Brings a partially specified site to a fully specified one in two passes:
//! per-host fill (tunnel address, keypair) then pairwise fill (pre-shared
//! secrets). Every fill is gated on the value being unset, which makes
//! completion idempotent: re-running it on an already-complete site changes
//! nothing, and adding a host later generates exactly what that host needs.

use tracing::{debug, info};

use crate::alloc::AddressPool;
use crate::error::Result;
use crate::keys::{Key, KeyPair};
use crate::site::SiteConfig;

/// What a completion run actually generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionSummary {
    pub addresses_assigned: usize,
    pub keypairs_generated: usize,
    pub secrets_generated: usize,
}

impl CompletionSummary {
    /// True when the run changed nothing
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Fill every absent field of the site, in host file order
pub fn complete(site: &mut SiteConfig) -> Result<CompletionSummary> {
    let mut pool = AddressPool::new(site.subnet);
    let mut summary = CompletionSummary::default();

    // Seed the pool with addresses the site file already carries. A
    // duplicate or out-of-subnet address in the file is fatal here, before
    // anything is generated.
    for host in site.hosts.values() {
        if let Some(addr) = host.tunnel_addr {
            pool.register(addr)?;
        }
    }

    // Pass 1: per-host fill
    for (hostname, host) in site.hosts.iter_mut() {
        if host.tunnel_addr.is_none() {
            let addr = pool.assign()?;
            debug!("assigned tunnel address {} to {}", addr, hostname);
            host.tunnel_addr = Some(addr);
            summary.addresses_assigned += 1;
        }

        // A keypair is one unit: if either half is unset, both are replaced
        if !host.has_keypair() {
            debug!("generating keypair for {}", hostname);
            let pair = KeyPair::generate();
            host.private_key = Some(pair.private);
            host.public_key = Some(pair.public);
            summary.keypairs_generated += 1;
        }
    }

    // Pass 2: pairwise fill
    let names: Vec<String> = site.hosts.keys().cloned().collect();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            if site.mesh_keys.get(a, b).is_none() {
                debug!("generating preshared key for {} <> {}", a, b);
                site.mesh_keys.insert(a, b, Key::generate());
                summary.secrets_generated += 1;
            }
        }
    }

    info!(
        "completion: {} addresses, {} keypairs, {} preshared keys generated",
        summary.addresses_assigned, summary.keypairs_generated, summary.secrets_generated
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;

    fn site(yaml: &str) -> SiteConfig {
        SiteConfig::parse_str(yaml).unwrap()
    }

    fn four_hosts() -> SiteConfig {
        site(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
  bravo:
    publicAddress: 192.0.2.20
  charlie:
    publicAddress: 192.0.2.30
  delta:
    publicAddress: 192.0.2.40
",
        )
    }

    #[test]
    fn test_every_host_fully_specified() {
        let mut site = four_hosts();
        complete(&mut site).unwrap();

        for host in site.hosts.values() {
            assert!(host.tunnel_addr.is_some());
            assert!(host.has_keypair());
        }
    }

    #[test]
    fn test_pair_count_is_n_choose_2() {
        let mut site = four_hosts();
        let summary = complete(&mut site).unwrap();

        assert_eq!(summary.secrets_generated, 6); // 4 * 3 / 2
        assert_eq!(site.mesh_keys.len(), 6);
        for (a, b) in [("alpha", "delta"), ("charlie", "bravo")] {
            assert!(site.mesh_keys.get(a, b).is_some());
            assert!(site.mesh_keys.get(b, a).is_some());
        }
    }

    #[test]
    fn test_addresses_distinct_and_inside_subnet() {
        let mut site = four_hosts();
        complete(&mut site).unwrap();

        let mut seen = HashSet::new();
        for host in site.hosts.values() {
            let addr = host.tunnel_addr.unwrap();
            assert!(site.subnet.contains(&addr));
            assert_ne!(addr.to_string(), "10.11.0.0");
            assert_ne!(addr.to_string(), "10.11.0.255");
            assert!(seen.insert(addr), "duplicate address {addr}");
        }
    }

    #[test]
    fn test_allocation_follows_host_order() {
        let mut site = four_hosts();
        complete(&mut site).unwrap();

        let addrs: Vec<String> = site
            .hosts
            .values()
            .map(|h| h.tunnel_addr.unwrap().to_string())
            .collect();
        assert_eq!(addrs, vec!["10.11.0.1", "10.11.0.2", "10.11.0.3", "10.11.0.4"]);
    }

    #[test]
    fn test_idempotent() {
        let mut site = four_hosts();
        complete(&mut site).unwrap();

        let before: Vec<_> = site
            .hosts
            .values()
            .map(|h| (h.tunnel_addr, h.public_key.clone(), h.private_key.clone()))
            .collect();
        let psk_before = site.mesh_keys.get("alpha", "bravo").cloned();

        let second = complete(&mut site).unwrap();
        assert!(second.is_noop());

        let after: Vec<_> = site
            .hosts
            .values()
            .map(|h| (h.tunnel_addr, h.public_key.clone(), h.private_key.clone()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(site.mesh_keys.get("alpha", "bravo").cloned(), psk_before);
    }

    #[test]
    fn test_preset_fields_untouched_only_gaps_filled() {
        let key = crate::keys::KeyPair::generate();
        let yaml = format!(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
    tunnelAddress: 10.11.0.9
    publicKey: {pubkey}
    privateKey: {privkey}
  bravo:
    publicAddress: 192.0.2.20
",
            pubkey = key.public.to_base64(),
            privkey = key.private.to_base64(),
        );
        let mut site = site(&yaml);
        let summary = complete(&mut site).unwrap();

        // alpha keeps everything it had; only the missing secret and bravo's
        // fields are generated
        let alpha = &site.hosts["alpha"];
        assert_eq!(alpha.tunnel_addr.unwrap().to_string(), "10.11.0.9");
        assert_eq!(alpha.public_key.as_ref().unwrap(), &key.public);
        assert_eq!(alpha.private_key.as_ref().unwrap(), &key.private);

        assert_eq!(summary.addresses_assigned, 1);
        assert_eq!(summary.keypairs_generated, 1);
        assert_eq!(summary.secrets_generated, 1);
    }

    #[test]
    fn test_half_keypair_regenerated_as_unit() {
        let key = crate::keys::KeyPair::generate();
        let yaml = format!(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
    publicKey: {}
",
            key.public.to_base64()
        );
        let mut site = site(&yaml);
        complete(&mut site).unwrap();

        let alpha = &site.hosts["alpha"];
        assert!(alpha.has_keypair());
        // the orphaned public half must not survive
        assert_ne!(alpha.public_key.as_ref().unwrap(), &key.public);
    }

    #[test]
    fn test_adding_host_generates_only_its_needs() {
        let mut site = four_hosts();
        complete(&mut site).unwrap();
        let alpha_addr = site.hosts["alpha"].tunnel_addr;

        // grow the site by one host, as an edit-and-rerun would
        let mut grown = SiteConfig::parse_str(&site.to_yaml_string().unwrap()).unwrap();
        grown.hosts.insert(
            "echo".into(),
            crate::site::HostEntry {
                public_addr: "192.0.2.50".parse().unwrap(),
                tunnel_addr: None,
                public_key: None,
                private_key: None,
            },
        );
        let summary = complete(&mut grown).unwrap();

        assert_eq!(summary.addresses_assigned, 1);
        assert_eq!(summary.keypairs_generated, 1);
        assert_eq!(summary.secrets_generated, 4); // one per existing host
        assert_eq!(grown.hosts["alpha"].tunnel_addr, alpha_addr);
        assert_eq!(grown.mesh_keys.len(), 10); // 5 * 4 / 2
    }

    #[test]
    fn test_subnet_exhaustion_is_fatal() {
        // a /31 pool holds two addresses, the third host cannot be placed
        let mut site = site(
            "
network:
  subnet: 10.11.0.0/31
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
  bravo:
    publicAddress: 192.0.2.20
  charlie:
    publicAddress: 192.0.2.30
",
        );
        let err = complete(&mut site).unwrap_err();
        assert!(matches!(err, Error::SubnetExhausted(_)));
    }

    #[test]
    fn test_duplicate_preset_addresses_fatal_before_generation() {
        let mut site = site(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
    tunnelAddress: 10.11.0.5
  bravo:
    publicAddress: 192.0.2.20
    tunnelAddress: 10.11.0.5
",
        );
        let err = complete(&mut site).unwrap_err();
        assert!(matches!(err, Error::DoubleAssigned { .. }));
        // nothing was generated for either host
        assert!(!site.hosts["alpha"].has_keypair());
        assert!(site.mesh_keys.is_empty());
    }

    #[test]
    fn test_preset_address_outside_subnet_fatal() {
        let mut site = site(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
    tunnelAddress: 10.99.0.5
",
        );
        let err = complete(&mut site).unwrap_err();
        assert!(matches!(err, Error::AddressOutsideSubnet { .. }));
    }

    #[test]
    fn test_single_host_needs_no_secrets() {
        let mut site = site(
            "
network:
  subnet: 10.11.0.0/24
  port: 51820
hosts:
  alpha:
    publicAddress: 192.0.2.10
",
        );
        let summary = complete(&mut site).unwrap();
        assert_eq!(summary.secrets_generated, 0);
        assert!(site.mesh_keys.is_empty());
    }
}
