//! Per-Dart-version constants the app model is responsible for supplying.
//!
//! The original tool hardcodes these as `#ifdef`-style version conditionals.
//! Here they are data: a [`VersionConfig`] loaded from TOML, with a default
//! table built in via `include_str!` so the crate works without any external
//! file, following [`raya_pm`]'s manifest-loading convention (see `config`
//! in this crate's root `Cargo.toml`... this crate has no dependency on
//! raya-pm; the convention, not the dependency, is what's reused).

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
struct RawVersionConfig {
    dart_int_cid: u32,
    class_id_tag_pos: u32,
    class_id_tag_size: u32,
    smi_tag_size: u32,
    word_size: u32,
    #[serde(default)]
    thread_offsets: FxHashMap<String, String>,
}

/// Version-dependent constants queried by the app model and by pattern
/// handlers, rather than hardcoded into them.
#[derive(Debug, Clone)]
pub struct VersionConfig {
    /// Class id used for `int` on this Dart version.
    pub dart_int_cid: u32,
    /// Bit position of the class-id tag within a boxed object's tag word.
    pub class_id_tag_pos: u32,
    /// Width in bits of the class-id tag field.
    pub class_id_tag_size: u32,
    /// Number of tag bits in a Smi (always 1 on ARM64, kept configurable for
    /// symmetry with the other constants rather than hardcoded).
    pub smi_tag_size: u32,
    /// Pointer/word width in bytes (8 on ARM64).
    pub word_size: u32,
    /// Byte offset within the `Thread` structure -> human name, used only
    /// for [`crate::asm_text`] annotation.
    pub thread_offsets: FxHashMap<u64, String>,
}

impl VersionConfig {
    /// The built-in default table, targeting the classic class-id layout.
    pub fn default_config() -> Self {
        Self::from_toml_str(DEFAULT_TOML).expect("embedded default.toml must parse")
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawVersionConfig = toml::from_str(content)?;
        let mut thread_offsets = FxHashMap::default();
        for (key, name) in raw.thread_offsets {
            let offset = parse_hex_offset(&key)
                .ok_or_else(|| ConfigError::Invalid(format!("bad thread offset key {key}")))?;
            thread_offsets.insert(offset, name);
        }
        if raw.word_size == 0 {
            return Err(ConfigError::Invalid("word_size must be non-zero".into()));
        }
        Ok(VersionConfig {
            dart_int_cid: raw.dart_int_cid,
            class_id_tag_pos: raw.class_id_tag_pos,
            class_id_tag_size: raw.class_id_tag_size,
            smi_tag_size: raw.smi_tag_size,
            word_size: raw.word_size,
            thread_offsets,
        })
    }

    pub fn thread_offset_name(&self, offset: u64) -> Option<&str> {
        self.thread_offsets.get(&offset).map(|s| s.as_str())
    }

    /// `true` when this version uses the newer `LDURH` class-id read
    /// (`class_id_tag_pos == 16`) rather than the classic `UBFX` one.
    pub fn uses_halfword_class_id(&self) -> bool {
        self.class_id_tag_pos == 16
    }
}

fn parse_hex_offset(key: &str) -> Option<u64> {
    let trimmed = key.strip_prefix("0x").unwrap_or(key);
    u64::from_str_radix(trimmed, 16).ok()
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg = VersionConfig::default_config();
        assert_eq!(cfg.word_size, 8);
        assert_eq!(cfg.thread_offset_name(0x38), Some("stack_limit"));
    }

    #[test]
    fn rejects_zero_word_size() {
        let bad = r#"
            dart_int_cid = 43
            class_id_tag_pos = 12
            class_id_tag_size = 20
            smi_tag_size = 1
            word_size = 0
        "#;
        assert!(VersionConfig::from_toml_str(bad).is_err());
    }

    #[test]
    fn halfword_layout_detected() {
        let toml = r#"
            dart_int_cid = 43
            class_id_tag_pos = 16
            class_id_tag_size = 16
            smi_tag_size = 1
            word_size = 8
        "#;
        let cfg = VersionConfig::from_toml_str(toml).unwrap();
        assert!(cfg.uses_halfword_class_id());
    }
}
