//! GPG workflow pieces: key generation, card transfer and Git integration.

pub mod card;
pub mod dialogue;
pub mod git;
pub mod keygen;
pub mod listing;

pub use card::CardSlot;
pub use git::GitGlobalConfig;
pub use keygen::generate_gpg_key;
pub use listing::{SecretKey, find_key_for_email, parse_secret_keys};

use crate::error::{ProvisionError, Result};

/// Name and address for the key's user ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();

        if name.is_empty() || name.contains(|c: char| c == '<' || c == '>') {
            return Err(ProvisionError::InvalidConfig(format!("invalid name '{name}'")));
        }
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
            && !email.contains(|c: char| c.is_whitespace() || c == '<' || c == '>');
        if !valid_email {
            return Err(ProvisionError::InvalidConfig(format!(
                "invalid email address '{email}'"
            )));
        }

        Ok(Self { name, email })
    }

    /// `Name <email>`
    #[must_use]
    pub fn user_id(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}
