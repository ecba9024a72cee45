//! Remote name to storage name encoding

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Longest name that is kept verbatim when it is otherwise safe.
pub const DEFAULT_MAX_SAFE_LENGTH: usize = 32;

/// Hex digits of the SHA-256 digest appended to mangled names.
const HASH_LENGTH: usize = 10;

/// Maximum length of the readable prefix of a mangled name.
const SLUG_LENGTH: usize = 20;

/// Device names that cannot be used as file names on Windows.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Derives storage names from remote names.
///
/// Names made only of ASCII letters, digits, `-` and `_` (not starting with
/// `-`), no longer than `max_safe_length` and not reserved are used verbatim.
/// Every other name is mangled to `<slug>.<hash>`:
///
/// `feature/login` -> `feature-login.2f1c0b9d7e`
/// `..` -> `_.0b8f9a8c12`
///
/// A mangled name always contains a `.`, so it can never coincide with a
/// verbatim name, and the hash is a pure function of the original name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEncoder {
    max_safe_length: usize,
}

impl Default for NameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAFE_LENGTH)
    }
}

impl NameEncoder {
    pub fn new(max_safe_length: usize) -> Self {
        Self {
            max_safe_length: max_safe_length.max(1),
        }
    }

    pub fn max_safe_length(&self) -> usize {
        self.max_safe_length
    }

    /// Encode a remote name into its storage form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for empty names and names containing NUL.
    pub fn encode(&self, original: &str) -> Result<String> {
        validate(original)?;

        if self.is_verbatim(original) {
            return Ok(original.to_string());
        }

        let mut slug = slugify(original);
        if slug.is_empty() || is_reserved(&slug) {
            slug.insert(0, '_');
        }

        Ok(format!("{}.{}", slug, short_hash(original)))
    }

    /// Whether a name is stored without mangling.
    pub fn is_verbatim(&self, name: &str) -> bool {
        !name.is_empty()
            && name.len() <= self.max_safe_length
            && !name.starts_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !is_reserved(name)
    }
}

/// Encode with the default settings.
pub fn encode(original: &str) -> Result<String> {
    NameEncoder::default().encode(original)
}

fn validate(original: &str) -> Result<()> {
    if original.is_empty() {
        return Err(Error::invalid(original, "name is empty"));
    }
    if original.contains('\0') {
        return Err(Error::invalid(original, "name contains a NUL character"));
    }
    Ok(())
}

fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_NAMES.contains(&lower.as_str())
}

/// Readable prefix of a mangled name.
///
/// ASCII alphanumerics and `_` are kept, runs of anything else ASCII collapse
/// to a single `-`, non-ASCII characters are escaped as `_<hex code point>`.
fn slugify(original: &str) -> String {
    let mut result = String::with_capacity(SLUG_LENGTH + 8);
    let mut last_was_dash = true; // Start true to skip leading dashes

    for c in original.chars() {
        if result.len() >= SLUG_LENGTH {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
            last_was_dash = false;
        } else if !c.is_ascii() {
            result.push_str(&format!("_{:x}", c as u32));
            last_was_dash = false;
        } else if !last_was_dash {
            // Separators, dots, punctuation and control characters
            result.push('-');
            last_was_dash = true;
        }
    }

    result.truncate(SLUG_LENGTH);
    while result.ends_with('-') {
        result.pop();
    }

    result
}

fn short_hash(original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(HASH_LENGTH);
    digest
}
