use std::{fmt, str::FromStr};

use uuid::Uuid;

/// A process-stable, file-stable 128-bit asset identity.
///
/// Always generated fresh (v4) the first time an asset is registered, never
/// re-derived from its path or content: re-deriving would defeat
/// `ReuseIfExists`, which finds an existing identity by locating the sidecar
/// file rather than recomputing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(Uuid);

impl AssetHandle {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for AssetHandle {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Default for AssetHandle {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl FromStr for AssetHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_round_trips() {
        let handle = AssetHandle::new_v4();
        let text = handle.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(handle, text.parse().unwrap());
    }

    #[test]
    fn serializes_as_canonical_string() {
        let handle = AssetHandle::new_v4();
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, format!("\"{}\"", handle));
    }
}
