//! Object-store keys.
//!
//! Keys are always generated server-side (`<prefix><uuid><extension>`) and are
//! never derived from user input.

use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

/// What a stored blob is used for. Determines its key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    /// Raw uploaded video
    Video,
    /// Preview still image
    Preview,
}

impl KeyPurpose {
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyPurpose::Video => "videos/",
            KeyPurpose::Preview => "previews/",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            KeyPurpose::Video => ".mp4",
            KeyPurpose::Preview => ".jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            KeyPurpose::Video => "video/mp4",
            KeyPurpose::Preview => "image/jpeg",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        [KeyPurpose::Video, KeyPurpose::Preview]
            .into_iter()
            .find(|p| key.starts_with(p.prefix()))
    }
}

/// Opaque key addressing one blob in the object store.
///
/// Deserializing goes through [`ObjectKey::parse`], so keys arriving in JSON
/// payloads get the same namespace and traversal checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Generate a fresh, unique key for the given purpose.
    pub fn generate(purpose: KeyPurpose) -> Self {
        Self(format!(
            "{}{}{}",
            purpose.prefix(),
            Uuid::new_v4(),
            purpose.extension()
        ))
    }

    /// Parse a key read back from storage or the database.
    ///
    /// Rejects empty and absolute keys, `..` segments, and keys outside the
    /// `videos/` and `previews/` namespaces.
    pub fn parse(key: impl Into<String>) -> ValidationResult<Self> {
        let key = key.into();

        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(ValidationError::invalid_object_key(key));
        }
        if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(ValidationError::invalid_object_key(key));
        }
        match KeyPurpose::from_key(&key) {
            Some(purpose) if key.len() > purpose.prefix().len() => Ok(Self(key)),
            _ => Err(ValidationError::invalid_object_key(key)),
        }
    }

    /// Namespace this key belongs to.
    pub fn purpose(&self) -> KeyPurpose {
        // Construction guarantees a known prefix.
        KeyPurpose::from_key(&self.0).unwrap_or(KeyPurpose::Video)
    }

    pub fn content_type(&self) -> &'static str {
        self.purpose().content_type()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = ValidationError;

    fn try_from(key: String) -> ValidationResult<Self> {
        Self::parse(key)
    }
}

impl<'de> Deserialize<'de> for ObjectKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Self::try_from(key).map_err(de::Error::custom)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
