//! Library facade re-exporting the tracing engine for embedders that want
//! the dispatcher/algorithms/lattice without the CLI.
//!
//! `trippy-cli` is deliberately not a dependency here: this crate is the
//! seam an embedder (a TUI, a service, a test harness) links against
//! directly instead of shelling out to the `trip` binary.

pub use trippy_core::*;

pub mod dns {
    pub use trippy_dns::*;
}

pub mod packet {
    pub use trippy_packet::*;
}

pub mod privilege {
    pub use trippy_privilege::*;
}
