use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Contiguous slice `[start_index, end_index)` of the row index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub batch_id: u32,
    pub start_index: u64,
    pub end_index: u64,
    pub seed: u64,
}

impl BatchDescriptor {
    pub fn len(&self) -> u64 {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Ordered `key=value` segments identifying one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionValue {
    pub segments: Vec<(String, String)>,
}

impl PartitionValue {
    pub fn new(segments: Vec<(String, String)>) -> Self {
        Self { segments }
    }

    /// Directory relative to the output root, one component per segment.
    pub fn relative_dir(&self) -> PathBuf {
        self.segments
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Directory value used for an empty partition value.
pub const DEFAULT_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Percent-escape characters that cannot appear in a `key=value` segment.
pub fn escape_partition_value(raw: &str) -> String {
    if raw.is_empty() {
        return DEFAULT_PARTITION_VALUE.to_string();
    }
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let reserved = matches!(
            ch,
            '/' | '\\' | '=' | '%' | ':' | '*' | '?' | '"' | '<' | '>' | '|'
        );
        if reserved || ch.is_control() {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{byte:02X}"));
            }
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Inverse of [`escape_partition_value`]. The default partition value maps to
/// `None`.
pub fn unescape_partition_value(segment: &str) -> Option<String> {
    if segment == DEFAULT_PARTITION_VALUE {
        return None;
    }
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    Some(String::from_utf8_lossy(&decoded).into_owned())
}

/// A published file and what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub partition_key: PartitionValue,
    pub row_count: u64,
    pub byte_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_value_renders_hive_segments() {
        let value = PartitionValue::new(vec![
            ("dt".to_string(), "2026-01-01".to_string()),
            ("tenant".to_string(), "acme".to_string()),
        ]);
        assert_eq!(value.to_string(), "dt=2026-01-01/tenant=acme");
        assert_eq!(
            value.relative_dir(),
            PathBuf::from("dt=2026-01-01").join("tenant=acme")
        );
        assert_eq!(value.get("tenant"), Some("acme"));
    }

    #[test]
    fn partition_values_are_escaped() {
        assert_eq!(escape_partition_value("acme"), "acme");
        assert_eq!(escape_partition_value("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_partition_value(""), DEFAULT_PARTITION_VALUE);
    }

    #[test]
    fn escaped_values_decode_back() {
        for raw in ["acme", "a/b=c", "50%: off", "2026-01-01"] {
            assert_eq!(
                unescape_partition_value(&escape_partition_value(raw)).as_deref(),
                Some(raw)
            );
        }
        assert_eq!(unescape_partition_value(DEFAULT_PARTITION_VALUE), None);
        assert_eq!(unescape_partition_value("100%").as_deref(), Some("100%"));
    }
}
