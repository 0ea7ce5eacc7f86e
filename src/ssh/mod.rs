//! SSH workflow pieces: resident key generation and client configuration.

pub mod client_config;
pub mod keygen;
pub mod public_key;

pub use client_config::{add_host_stanza, has_host_stanza, host_stanza};
pub use keygen::{generate_ssh_key, public_key_path};
pub use public_key::PublicKeyLine;
