//! # Utility Functions
//!
//! Formatting helpers shared by the CLI output paths.

/// Transaction ID formatting utilities
pub mod txid {
    use crate::config::ui::{TXID_DISPLAY_PREFIX, TXID_DISPLAY_SUFFIX};

    /// Format a transaction ID for display with ellipsis in the middle
    pub fn format_short(txid: &str) -> String {
        if txid.len() <= TXID_DISPLAY_PREFIX + TXID_DISPLAY_SUFFIX + 3 {
            txid.to_string()
        } else {
            format!(
                "{}...{}",
                &txid[..TXID_DISPLAY_PREFIX],
                &txid[txid.len() - TXID_DISPLAY_SUFFIX..]
            )
        }
    }
}

/// Amount formatting utilities
pub mod amount {
    /// Convert satoshis to BTC with 8 decimal places
    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / 100_000_000.0
    }

    /// Format amount as a string with units
    pub fn format_sats(sats: u64) -> String {
        if sats == 0 {
            "0 sats".to_string()
        } else if sats < 1000 {
            format!("{} sats", sats)
        } else if sats < 100_000_000 {
            format!("{:.3} K sats", sats as f64 / 1000.0)
        } else {
            format!("{:.8} BTC", sats_to_btc(sats))
        }
    }
}
