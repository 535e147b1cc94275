//! VirtualMachineInstance metadata.
//!
//! Only the annotation set of the VMI is consumed. The rest of the document
//! (spec, status, labels) is accepted and ignored, so any VMI serialization
//! the virt-launcher sends decodes as long as it is valid JSON of the right
//! shape.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};

/// The subset of a VirtualMachineInstance this sidecar reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VirtualMachineInstance {
    /// Object metadata. A VMI without `metadata` decodes to empty metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
}

/// Kubernetes object metadata, reduced to annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectMeta {
    /// Object name, used only for log context.
    #[serde(default)]
    pub name: Option<String>,

    /// Object namespace, used only for log context.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Free-form annotations. `null` and a missing field both mean empty.
    #[serde(default, deserialize_with = "nullable_map")]
    pub annotations: HashMap<String, String>,
}

impl VirtualMachineInstance {
    /// Decodes a VMI from its JSON serialization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVmi`] if the payload is not a JSON object of
    /// the expected shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidVmi(e.to_string()))
    }

    /// Returns the VMI annotations.
    #[must_use]
    pub fn annotations(&self) -> &HashMap<String, String> {
        &self.metadata.annotations
    }

    /// Returns true if the annotation `key` is present, whatever its value.
    #[must_use]
    pub fn has_annotation(&self, key: &str) -> bool {
        self.metadata.annotations.contains_key(key)
    }
}

fn nullable_map<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_decoded() {
        let vmi = VirtualMachineInstance::from_json(
            br#"{"metadata":{"name":"vm1","annotations":{"a":"1","b":""}}}"#,
        )
        .unwrap();
        assert_eq!(vmi.metadata.name.as_deref(), Some("vm1"));
        assert!(vmi.has_annotation("a"));
        assert!(vmi.has_annotation("b"));
        assert!(!vmi.has_annotation("c"));
    }

    #[test]
    fn test_null_annotations() {
        let vmi =
            VirtualMachineInstance::from_json(br#"{"metadata":{"annotations":null}}"#).unwrap();
        assert!(vmi.annotations().is_empty());
    }
}
