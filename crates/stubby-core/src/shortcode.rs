use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of hex characters kept from the URL digest.
pub const GENERATED_LENGTH: usize = 8;

const MAX_LENGTH: usize = 32;

/// Short identifier used as the lookup key for a stored URL.
///
/// Codes derived with [`ShortCode::from_url`] are the first eight hex
/// characters of the BLAKE3 digest of the URL bytes. Two URLs sharing that
/// prefix map to the same code; the store keeps whichever was added first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the short code for a URL.
    ///
    /// The URL is hashed verbatim, so `https://a.b` and `https://a.b/`
    /// produce different codes.
    ///
    /// # Examples
    ///
    /// ```
    /// use stubby_core::ShortCode;
    ///
    /// let a = ShortCode::from_url("https://example.com");
    /// let b = ShortCode::from_url("https://example.com");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), 8);
    /// ```
    pub fn from_url(url: &str) -> Self {
        let digest = blake3::hash(url.as_bytes());
        let mut encoded = hex::encode(digest.as_bytes());
        encoded.truncate(GENERATED_LENGTH);
        Self(encoded)
    }

    /// Creates a `ShortCode` from client input after validation.
    ///
    /// Valid codes are 1-32 characters and contain only `[a-zA-Z0-9_-]`.
    pub fn new(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes read back from a backend that stored them.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.is_empty() || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between 1 and {}, got {}",
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
