//! Tunnel address allocation
//!
//! An `AddressPool` hands out the lowest free host address of the mesh
//! subnet. It never returns a duplicate; a duplicate registration therefore
//! means the caller (or the site file) is broken and is treated as fatal.

use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::{Error, Result};

/// Tracks which tunnel addresses of a subnet are taken
#[derive(Debug, Clone)]
pub struct AddressPool {
    subnet: IpNet,
    assigned: BTreeSet<IpAddr>,
}

impl AddressPool {
    pub fn new(subnet: IpNet) -> Self {
        Self {
            subnet,
            assigned: BTreeSet::new(),
        }
    }

    /// Record an address as taken
    ///
    /// Fails on a repeat registration and on addresses that are not a usable
    /// host of the subnet (network/broadcast included).
    pub fn register(&mut self, addr: IpAddr) -> Result<()> {
        if !self.is_usable_host(addr) {
            return Err(Error::AddressOutsideSubnet {
                address: addr,
                subnet: self.subnet,
            });
        }
        if !self.assigned.insert(addr) {
            return Err(Error::DoubleAssigned {
                address: addr,
                subnet: self.subnet,
            });
        }
        Ok(())
    }

    /// Assign the lowest-ordered usable address not yet taken
    ///
    /// The returned address is recorded in the pool before it is handed out.
    pub fn assign(&mut self) -> Result<IpAddr> {
        // hosts() iterates in ascending order and already excludes the
        // network and broadcast addresses of IPv4 subnets
        for addr in self.subnet.hosts() {
            if !self.assigned.contains(&addr) {
                self.register(addr)?;
                return Ok(addr);
            }
        }
        Err(Error::SubnetExhausted(self.subnet))
    }

    /// Number of addresses currently taken
    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }

    fn is_usable_host(&self, addr: IpAddr) -> bool {
        if !self.subnet.contains(&addr) {
            return false;
        }
        match self.subnet {
            // RFC 3021 point-to-point subnets have no network/broadcast
            IpNet::V4(net) if net.prefix_len() < 31 => {
                addr != IpAddr::V4(net.network()) && addr != IpAddr::V4(net.broadcast())
            }
            _ => true,
        }
    }
}
