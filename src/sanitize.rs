//! Pre-connect sanitation of leftover wallet-session storage
//!
//! A session descriptor left behind by an earlier connection protocol makes
//! the next handshake fail with "stale session" or "proposal expired". Before
//! connecting, every key matching one of [`STALE_SESSION_KEY_PATTERNS`] is
//! removed.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::storage::KeyValueStore;

/// Key prefixes written by wallet connection libraries
pub const STALE_SESSION_KEY_PATTERNS: &[&str] = &[
    "wc@2:",
    "walletconnect",
    "wc_",
    "-walletlink",
    "@w3m/",
    "w3m-",
    "wagmi.wallet",
    "wagmi.connected",
    "wagmi.recentconnectorid",
    "wagmi.store",
];

fn stale_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = STALE_SESSION_KEY_PATTERNS
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i)^(?:{})", alternatives)).unwrap()
    })
}

pub fn is_stale_session_key(key: &str) -> bool {
    stale_key_regex().is_match(key)
}

/// Select the keys that must be removed before a fresh handshake
pub fn stale_session_keys<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .filter(|key| is_stale_session_key(key))
        .map(String::from)
        .collect()
}

/// Remove stale session keys from `store`, returning how many were removed
pub fn sanitize_store(store: &dyn KeyValueStore) -> Result<usize> {
    let keys = store.keys();
    let stale = stale_session_keys(keys.iter().map(String::as_str));
    for key in &stale {
        store.remove(key)?;
        tracing::debug!(key = %key, "Removed stale session key");
    }
    Ok(stale.len())
}
