//! OpenSSH public key lines (`algorithm base64 comment`).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyLine {
    pub algorithm: String,
    /// Base64 key blob exactly as written in the file
    pub material: String,
    pub comment: String,
}

impl PublicKeyLine {
    /// Parse a `.pub` file's contents, which must be exactly one key line.
    ///
    /// The blob must be valid base64 and begin with the same algorithm name
    /// as the first field. Errors are human-readable reasons.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let line = lines.next().ok_or_else(|| "file is empty".to_string())?;
        if lines.next().is_some() {
            return Err("expected a single key line".to_string());
        }

        let mut fields = line.trim().splitn(3, char::is_whitespace);
        let algorithm = fields.next().unwrap_or_default();
        let material = fields.next().unwrap_or_default();
        let comment = fields.next().map(str::trim).unwrap_or_default();

        if algorithm.is_empty() || material.is_empty() {
            return Err("expected '<algorithm> <base64> <comment>'".to_string());
        }
        if comment.is_empty() {
            return Err("key comment is missing".to_string());
        }

        let blob = STANDARD
            .decode(material)
            .map_err(|e| format!("key material is not valid base64: {e}"))?;
        let embedded = blob_algorithm(&blob)
            .ok_or_else(|| "key blob is truncated".to_string())?;
        if embedded != algorithm.as_bytes() {
            return Err(format!(
                "key blob algorithm '{}' does not match '{algorithm}'",
                String::from_utf8_lossy(embedded)
            ));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            material: material.to_string(),
            comment: comment.to_string(),
        })
    }

    /// FIDO-backed (`sk-`) key types.
    #[must_use]
    pub fn is_security_key(&self) -> bool {
        self.algorithm.starts_with("sk-")
    }
}

/// The length-prefixed algorithm name at the start of an SSH wire-format blob.
fn blob_algorithm(blob: &[u8]) -> Option<&[u8]> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    blob.get(4..4usize.checked_add(len)?)
}

impl fmt::Display for PublicKeyLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.algorithm, self.material, self.comment)
    }
}
