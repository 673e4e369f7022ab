//! # Configuration Constants
//!
//! This module contains the configuration values used throughout the
//! lattice contract explorer.

/// Network and RPC configuration
pub mod network {
    /// Default Bitcoin Core RPC host
    pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";

    /// Default Bitcoin Core RPC port (regtest)
    pub const DEFAULT_RPC_PORT: &str = "18443";

    /// Default RPC username
    pub const DEFAULT_RPC_USER: &str = "user";

    /// Default RPC password
    pub const DEFAULT_RPC_PASSWORD: &str = "password";

    /// Default wallet name for RPC calls that require one
    pub const DEFAULT_WALLET_NAME: &str = "lattice_wallet";

    /// Minimum number of confirmations before a transaction counts as
    /// confirmed for broadcastability tracking.
    pub const CONFIRMATION_THRESHOLD: u64 = 1;

    /// Default confirmation poll interval in seconds
    pub const DEFAULT_POLL_SECS: u64 = 30;

    /// Lower bound on the confirmation poll interval
    pub const MIN_POLL_SECS: u64 = 5;

    /// Upper bound on the confirmation poll interval
    pub const MAX_POLL_SECS: u64 = 300;
}

/// Environment variable names for RPC configuration
pub mod env {
    /// RPC host override
    pub const RPC_URL: &str = "LATTICE_RPC_URL";

    /// RPC port override
    pub const RPC_PORT: &str = "LATTICE_RPC_PORT";

    /// RPC username override
    pub const RPC_USER: &str = "LATTICE_RPC_USER";

    /// RPC password override
    pub const RPC_PASSWORD: &str = "LATTICE_RPC_PASSWORD";

    /// RPC wallet override
    pub const RPC_WALLET: &str = "LATTICE_RPC_WALLET";
}

/// Display formatting constants
pub mod ui {
    /// Leading characters kept when shortening a txid for display
    pub const TXID_DISPLAY_PREFIX: usize = 8;

    /// Trailing characters kept when shortening a txid for display
    pub const TXID_DISPLAY_SUFFIX: usize = 8;
}

/// Graph construction constants
pub mod graph {
    /// Sentinel value, in satoshis, assigned to every synthesized output of a
    /// placeholder funding transaction: the entire fixed supply (21M BTC).
    ///
    /// The true funding amount of an externally-funded input is unknown
    /// before broadcast. The sentinel is intentionally impossible so that an
    /// uninferred placeholder output is detectable on sight.
    pub const PLACEHOLDER_OUTPUT_SATS: u64 = 21_000_000 * 100_000_000;
}
