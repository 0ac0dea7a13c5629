//! WolfMesh - WireGuard mesh site configuration generator
//!
//! Turns a declarative site description (subnet, listen port, hosts) into a
//! complete mesh configuration: every host gets a unique tunnel address, an
//! X25519 keypair if it lacks one, and a pre-shared secret with every other
//! host. The completed site file is written back in place, then rendered into
//! per-host systemd-networkd descriptor files (`wg0.network`, `wg0.netdev`).
//!
//! # Architecture
//!
//! The completion engine is the core: it fills only absent fields, so the
//! same site file can be edited and re-run without disturbing addresses,
//! keys, or secrets that were already assigned.

pub mod alloc;
pub mod complete;
pub mod emit;
pub mod error;
pub mod keys;
pub mod mesh;
pub mod site;

pub use error::{Error, Result};
pub use keys::{Key, KeyPair};
pub use site::{HostEntry, SiteConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::alloc::AddressPool;
    pub use crate::complete::{complete, CompletionSummary};
    pub use crate::error::{Error, Result};
    pub use crate::keys::{Key, KeyPair};
    pub use crate::mesh::MeshKeyTable;
    pub use crate::site::{HostEntry, SiteConfig};
}
