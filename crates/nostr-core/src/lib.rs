//! Nostr relay access for nostr-recap.
//!
//! A thin wrapper over `nostr-sdk`: per-relay fetches with a timeout,
//! signing with optional keys, single-relay publishing, and kind 0
//! profile metadata parsing.

pub mod profile;
pub mod relay;

pub use profile::ProfileMetadata;
pub use relay::RelayClient;

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
