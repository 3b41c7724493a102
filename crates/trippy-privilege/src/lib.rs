//! Discover, ahead of opening any socket, whether this process can send and
//! receive raw ICMP/UDP probes.
//!
//! A failed privilege check is surfaced by the network layer (`trippy-core`)
//! as `SocketError::PermissionDenied` rather than a bare OS error, so the
//! CLI can print a single actionable diagnostic instead of an errno.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("this operation requires the CAP_NET_RAW capability (or root)")]
    MissingNetRaw,
    #[error("unable to determine process privilege")]
    Undetermined,
}

/// Whether this process is believed able to open a raw socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Running as root (or the platform equivalent).
    Privileged,
    /// Missing `CAP_NET_RAW` (or root) but otherwise healthy.
    Unprivileged,
}

impl Privilege {
    pub fn require(self) -> Result<(), PrivilegeError> {
        match self {
            Self::Privileged => Ok(()),
            Self::Unprivileged => Err(PrivilegeError::MissingNetRaw),
        }
    }
}

/// Discover the current process's privilege to open raw sockets.
#[cfg(target_os = "linux")]
pub fn discover() -> Result<Privilege, PrivilegeError> {
    use caps::{CapSet, Capability};
    if nix::unistd::geteuid().is_root() {
        return Ok(Privilege::Privileged);
    }
    match caps::has_cap(None, CapSet::Effective, Capability::CAP_NET_RAW) {
        Ok(true) => Ok(Privilege::Privileged),
        Ok(false) => Ok(Privilege::Unprivileged),
        Err(e) => {
            tracing::warn!(error = %e, "unable to query CAP_NET_RAW");
            Err(PrivilegeError::Undetermined)
        }
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn discover() -> Result<Privilege, PrivilegeError> {
    if nix::unistd::geteuid().is_root() {
        Ok(Privilege::Privileged)
    } else {
        Ok(Privilege::Unprivileged)
    }
}

#[cfg(windows)]
pub fn discover() -> Result<Privilege, PrivilegeError> {
    // Raw ICMP sockets on Windows do not require administrator rights the
    // way CAP_NET_RAW does on Unix; defer the real failure to socket open.
    Ok(Privilege::Privileged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprivileged_requires_returns_error() {
        assert_eq!(
            Privilege::Unprivileged.require(),
            Err(PrivilegeError::MissingNetRaw)
        );
    }

    #[test]
    fn privileged_requires_ok() {
        assert!(Privilege::Privileged.require().is_ok());
    }
}
