//! `trippy-cli`'s error taxonomy (spec §7) and the exit-code mapping.

use thiserror::Error;

/// A bad flag combination or out-of-range value (spec §7 `OptionError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("-I and -U are mutually exclusive")]
    ConflictingProtocol,
    #[error("--mda-bound/--mda-max-branch require -a mda")]
    MdaOptionsWithoutMda,
    #[error("--mda-bound must be in (0, 1), got {0}")]
    BoundOutOfRange(f64),
    #[error("--min-ttl ({min}) must be <= --max-ttl ({max})")]
    TtlRangeInverted { min: u8, max: u8 },
    #[error("src-port/dst-port must be in 0..=65535")]
    PortOutOfRange,
    #[error("invalid --timeout value: {0}")]
    InvalidTimeout(String),
}

/// Address resolution failures (spec §7 `AddressError`).
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("could not guess address family for {0}; pass -4 or -6")]
    NoFamilyGuess(String),
    #[error("not a valid address literal: {0}")]
    BadLiteral(String),
    #[error("failed to resolve {0}: {1}")]
    ResolveFailed(String, #[source] trippy_dns::ResolveError),
}

/// The top-level error `main` handles, each variant mapped to one of the
/// exit codes spec §6 documents: `0` success, non-zero on option error, name
/// resolution failure, socket open failure, or interrupted main loop.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Privilege(#[from] trippy_privilege::PrivilegeError),
    #[error(transparent)]
    Socket(#[from] trippy_core::SocketError),
    #[error("main loop interrupted: {0}")]
    Interrupted(String),
}

impl CliError {
    /// The process exit code spec §6 documents for this error's category.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Option(_) => 1,
            Self::Address(_) => 2,
            Self::Privilege(_) | Self::Socket(_) => 3,
            Self::Interrupted(_) => 4,
        }
    }
}
