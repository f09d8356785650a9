//! # OCI Image Layout Records
//!
//! The JSON documents of an OCI image layout as ADPKG writes them. Field
//! names follow the OCI image spec (`schemaVersion`, `mediaType`), so the
//! structs rename to camelCase on the wire.

use std::collections::BTreeMap;

use adp_core::ContentDigest;
use serde::{Deserialize, Serialize};

/// Media type of the image manifest.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
/// Media type of the config blob.
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.adp.config.v1+json";
/// Media type of the single payload layer.
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.adp.package.v1+tar";
/// Annotation carrying the agent id on the index entry.
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// File name of the layout marker.
pub const OCI_LAYOUT_FILE: &str = "oci-layout";
/// File name of the index.
pub const INDEX_FILE: &str = "index.json";
/// Directory holding content-addressed blobs.
pub const BLOBS_DIR: &str = "blobs";

/// A typed reference to a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: ContentDigest,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(media_type: &str, digest: ContentDigest, size: u64) -> Self {
        Self {
            media_type: media_type.to_string(),
            digest,
            size,
            annotations: BTreeMap::new(),
        }
    }

    /// Add an annotation.
    pub fn with_annotation(mut self, key: &str, value: impl Into<String>) -> Self {
        self.annotations.insert(key.to_string(), value.into());
        self
    }

    /// The `org.opencontainers.image.title` annotation, if present.
    pub fn title(&self) -> Option<&str> {
        self.annotations.get(TITLE_ANNOTATION).map(String::as_str)
    }
}

/// The image manifest blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    pub fn new(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config,
            layers,
        }
    }
}

/// `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: u32,
    pub manifests: Vec<Descriptor>,
}

impl ImageIndex {
    pub fn single(manifest: Descriptor) -> Self {
        Self {
            schema_version: 2,
            manifests: vec![manifest],
        }
    }
}

/// The `oci-layout` marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciLayout {
    pub image_layout_version: String,
}

impl Default for OciLayout {
    fn default() -> Self {
        Self {
            image_layout_version: "1.0.0".to_string(),
        }
    }
}

/// The config blob. Serialized canonically, so key order is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub agent_id: String,
    pub adp_version: String,
}
