//! Trust Mesh
//!
//! Single query surface for routing and consensus. A peer is usable only
//! when the shield does not consider it quarantined or dead and the
//! Byzantine detector has not isolated it.

pub mod mesh;

pub use mesh::{TrustMesh, TrustNodeStatus, TrustStatistics};
