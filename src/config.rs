use crate::error::StructError;
use crate::types::NATIVE_POINTER_WIDTH;
use serde::{Deserialize, Serialize};

/// Marshalling configuration shared by an instance and all of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Width of every pointer-bearing slot, in bytes.
    ///
    /// Default: the running process's pointer size.
    pub pointer_width: usize,
    /// Caps field alignment like `#pragma pack(N)`. `None` keeps natural alignment.
    pub pack: Option<usize>,
    /// How many pointer-to-struct hops `read()` follows before it keeps the
    /// raw address instead of copying the pointee.
    ///
    /// Default: 16.
    pub max_pointer_depth: usize,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            pointer_width: NATIVE_POINTER_WIDTH,
            pack: None,
            max_pointer_depth: 16,
        }
    }
}

impl MarshalConfig {
    pub fn with_pack(mut self, pack: usize) -> Self {
        self.pack = Some(pack);
        self
    }

    pub fn with_pointer_width(mut self, pointer_width: usize) -> Self {
        self.pointer_width = pointer_width;
        self
    }

    pub fn with_max_pointer_depth(mut self, depth: usize) -> Self {
        self.max_pointer_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<(), StructError> {
        if !matches!(self.pointer_width, 4 | 8) {
            return Err(StructError::InvalidPointerWidth(self.pointer_width));
        }
        if let Some(pack) = self.pack {
            if !pack.is_power_of_two() || pack > 16 {
                return Err(StructError::InvalidPackLimit(pack));
            }
        }
        Ok(())
    }

    /// Parse and validate a config from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, StructError> {
        let config: MarshalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Clamp a natural alignment to the pack limit.
    #[inline]
    pub fn clamp_align(&self, natural: usize) -> usize {
        match self.pack {
            Some(pack) => natural.min(pack),
            None => natural,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_native() {
        let config = MarshalConfig::default();
        assert_eq!(config.pointer_width, std::mem::size_of::<usize>());
        assert_eq!(config.pack, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = MarshalConfig::from_json(r#"{ "pack": 4 }"#).unwrap();
        assert_eq!(config.pack, Some(4));
        assert_eq!(config.max_pointer_depth, 16);
    }

    #[test]
    fn test_rejects_bad_pack() {
        let err = MarshalConfig::from_json(r#"{ "pack": 3 }"#).unwrap_err();
        assert!(matches!(err, StructError::InvalidPackLimit(3)));
        assert!(MarshalConfig::default().with_pack(32).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_pointer_width() {
        let err = MarshalConfig::default().with_pointer_width(2).validate().unwrap_err();
        assert!(matches!(err, StructError::InvalidPointerWidth(2)));
    }

    #[test]
    fn test_clamp_align() {
        let config = MarshalConfig::default().with_pack(2);
        assert_eq!(config.clamp_align(8), 2);
        assert_eq!(config.clamp_align(1), 1);
        assert_eq!(MarshalConfig::default().clamp_align(8), 8);
    }
}
