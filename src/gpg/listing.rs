//! Parsing of `gpg --list-secret-keys --keyid-format LONG --with-fingerprint`.
//!
//! Example input:
//!
//! ```text
//! sec   rsa4096/3AA5C34371567BD2 2024-03-01 [C] [expires: 2026-03-01]
//!       4AEE18F83AFDEB23E1D2B5A03AA5C34371567BD2
//! uid                 [ultimate] Jane Doe <jane@example.com>
//! ssb>  rsa4096/42B317FD4BA89E7A 2024-03-01 [S] [expires: 2026-03-01]
//! ```

use crate::error::{ProvisionError, Result};

/// One `sec` block of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    /// Long key ID between `/` and the next whitespace
    pub key_id: String,
    pub algorithm: String,
    pub fingerprint: Option<String>,
    pub uids: Vec<String>,
}

impl SecretKey {
    /// Whether any user ID carries exactly `<email>` (case-insensitive).
    #[must_use]
    pub fn has_email(&self, email: &str) -> bool {
        self.uids
            .iter()
            .filter_map(|uid| uid_email(uid))
            .any(|e| e.eq_ignore_ascii_case(email.trim()))
    }
}

/// Address between the last `<` and the following `>`.
fn uid_email(uid: &str) -> Option<&str> {
    let start = uid.rfind('<')?;
    let end = uid[start..].find('>')? + start;
    Some(&uid[start + 1..end])
}

/// `sec`, `sec#` (primary offline) or `sec>` (primary on card) record.
fn record_body<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(tag)?;
    let rest = rest
        .strip_prefix(|c: char| c == '#' || c == '>')
        .unwrap_or(rest);
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn parse_sec(body: &str) -> Option<(String, String)> {
    let first = body.split_whitespace().next()?;
    let (algorithm, key_id) = first.split_once('/')?;
    if key_id.is_empty() {
        return None;
    }
    Some((algorithm.to_string(), key_id.to_string()))
}

/// A fingerprint line: 40 or 64 hex digits, optionally spaced or prefixed
/// with `Key fingerprint =`.
fn parse_fingerprint(line: &str) -> Option<String> {
    let line = line.trim();
    let line = line
        .strip_prefix("Key fingerprint =")
        .map_or(line, str::trim);
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let valid = matches!(compact.len(), 40 | 64) && compact.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| compact.to_ascii_uppercase())
}

/// Parse every secret key, in listing order.
#[must_use]
pub fn parse_secret_keys(listing: &str) -> Vec<SecretKey> {
    let mut keys: Vec<SecretKey> = Vec::new();
    let mut awaiting_fingerprint = false;

    for line in listing.lines() {
        if let Some(body) = record_body(line, "sec") {
            awaiting_fingerprint = false;
            if let Some((algorithm, key_id)) = parse_sec(body) {
                keys.push(SecretKey {
                    key_id,
                    algorithm,
                    fingerprint: None,
                    uids: Vec::new(),
                });
                awaiting_fingerprint = true;
            }
            continue;
        }

        let Some(current) = keys.last_mut() else {
            continue;
        };

        if awaiting_fingerprint {
            awaiting_fingerprint = false;
            if let Some(fingerprint) = parse_fingerprint(line) {
                current.fingerprint = Some(fingerprint);
                continue;
            }
        }

        if let Some(body) = record_body(line, "uid") {
            // Drop the `[ultimate]` validity marker
            let uid = match body.strip_prefix('[') {
                Some(rest) => rest.split_once(']').map_or(body, |(_, uid)| uid.trim()),
                None => body,
            };
            current.uids.push(uid.to_string());
        }
    }

    keys
}

/// The key whose user ID has exactly `<email>`.
///
/// When several keys match, the last one in listing order (the most recently
/// created) is chosen. No match is `KeyIdNotFound`.
pub fn find_key_for_email(listing: &str, email: &str) -> Result<SecretKey> {
    let mut matches: Vec<SecretKey> = parse_secret_keys(listing)
        .into_iter()
        .filter(|key| key.has_email(email))
        .collect();

    if matches.len() > 1 {
        let ids: Vec<&str> = matches.iter().map(|k| k.key_id.as_str()).collect();
        tracing::warn!(email, keys = ?ids, "several secret keys match; using the most recent");
    }

    matches
        .pop()
        .ok_or_else(|| ProvisionError::KeyIdNotFound(email.to_string()))
}
