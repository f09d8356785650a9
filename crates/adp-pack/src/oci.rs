//! # OCI Image Layout Packages
//!
//! An ADPKG in OCI form is a directory:
//!
//! ```text
//! out/
//! ├── oci-layout            {"imageLayoutVersion":"1.0.0"}
//! ├── index.json            one manifest, titled with the agent id
//! └── blobs/sha256/
//!     ├── <config>          canonical {"adp_version", "agent_id"}
//!     ├── <layer>           tar of the whole source tree
//!     └── <manifest>        image manifest referencing both
//! ```
//!
//! ## Reproducibility
//!
//! The layer tar is built from a sorted walk with normalized headers
//! (mtime 0, uid/gid 0, no owner names, mode 0644 or 0755), so identical
//! trees produce identical layer, manifest and config digests no matter
//! where or when they are packed.
//!
//! ## Failure Behaviour
//!
//! Target shape, manifest presence and validity, and the container spec
//! model (when `acs/container.yaml` is present) are all checked
//! before `out` is created. Blob writes are atomic and idempotent; the
//! layer is staged in a temporary file inside `out` that is removed on
//! every exit path.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use adp_core::{AgentManifest, CanonicalBytes, DigestAlgorithm, ManifestValidator};
use adp_crypto::{digest_file, BlobStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{IoContext, MissingReason, PackError, PackResult};
use crate::extract::{extract_dir, extract_file, is_executable, EntryKind};
use crate::layout::{
    Descriptor, ImageIndex, ImageManifest, OciLayout, PackageConfig, BLOBS_DIR,
    CONFIG_MEDIA_TYPE, INDEX_FILE, LAYER_MEDIA_TYPE, MANIFEST_MEDIA_TYPE, OCI_LAYOUT_FILE,
    TITLE_ANNOTATION,
};
use crate::package::Package;
use crate::source::{
    check_oci_target, load_container_spec, load_validated_manifest, require_entry,
    AGENT_MANIFEST_PATH, CONTAINER_SPEC_PATH,
};
use crate::walk::{entry_matches, safe_entry_path, SourceFile, SourceTree};

/// An ADPKG stored as an OCI image layout directory.
#[derive(Debug, Clone)]
pub struct OciPackage {
    root: PathBuf,
    store: BlobStore,
}

impl OciPackage {
    fn bind(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            store: BlobStore::new(root.join(BLOBS_DIR)),
        }
    }

    /// The layout's blob store.
    pub fn blob_store(&self) -> &BlobStore {
        &self.store
    }

    /// Hex names of every stored sha256 blob, sorted.
    pub fn list_blobs(&self) -> PackResult<Vec<String>> {
        Ok(self.store.list(DigestAlgorithm::Sha256)?.into_iter().collect())
    }

    /// Parse `index.json`.
    pub fn index(&self) -> PackResult<ImageIndex> {
        self.read_json(INDEX_FILE)
    }

    /// The single manifest descriptor listed in the index.
    pub fn manifest_descriptor(&self) -> PackResult<Descriptor> {
        let mut manifests = self.index()?.manifests;
        match manifests.len() {
            1 => Ok(manifests.remove(0)),
            0 => Err(self.corrupt("index.json lists no manifests")),
            n => Err(self.corrupt(format!("index.json lists {n} manifests, expected one"))),
        }
    }

    /// The image manifest the index points at.
    pub fn image_manifest(&self) -> PackResult<ImageManifest> {
        let descriptor = self.manifest_descriptor()?;
        if descriptor.media_type != MANIFEST_MEDIA_TYPE {
            return Err(self.corrupt(format!(
                "index entry has media type {}, expected {MANIFEST_MEDIA_TYPE}",
                descriptor.media_type
            )));
        }
        self.read_blob_json(&descriptor)
    }

    /// The single ADP payload layer.
    pub fn layer_descriptor(&self) -> PackResult<Descriptor> {
        let mut layers = self.image_manifest()?.layers.into_iter();
        match (layers.next(), layers.next()) {
            (Some(layer), None) if layer.media_type == LAYER_MEDIA_TYPE => Ok(layer),
            (Some(layer), None) => Err(self.corrupt(format!(
                "layer has media type {}, expected {LAYER_MEDIA_TYPE}",
                layer.media_type
            ))),
            (None, _) => Err(self.corrupt("image manifest has no layers")),
            (Some(_), Some(_)) => Err(self.corrupt("image manifest has more than one layer")),
        }
    }

    /// The decoded config blob.
    pub fn config(&self) -> PackResult<PackageConfig> {
        let manifest = self.image_manifest()?;
        self.read_blob_json(&manifest.config)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> PackResult<T> {
        let path = self.root.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(self.corrupt(format!("{name} is missing")))
            }
            Err(e) => return Err(PackError::io(format!("reading {}", path.display()), e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| self.corrupt(format!("{name}: {e}")))
    }

    fn read_blob_json<T: DeserializeOwned>(&self, descriptor: &Descriptor) -> PackResult<T> {
        let bytes = self.store.get(&descriptor.digest)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| self.corrupt(format!("blob {}: {e}", descriptor.digest)))
    }

    fn open_layer(&self, layer: &Descriptor) -> PackResult<tar::Archive<File>> {
        Ok(tar::Archive::new(self.store.open(&layer.digest)?))
    }

    fn corrupt(&self, detail: impl Into<String>) -> PackError {
        PackError::corrupt(&self.root, detail)
    }

    fn corrupt_layer(&self, layer: &Descriptor, err: io::Error) -> PackError {
        self.corrupt(format!("layer {}: {err}", layer.digest))
    }

    fn verify_descriptor(&self, descriptor: &Descriptor) -> PackResult<()> {
        let size = self.store.verify(&descriptor.digest)?;
        if size != descriptor.size {
            return Err(self.corrupt(format!(
                "blob {} is {size} bytes but its descriptor records {}",
                descriptor.digest, descriptor.size
            )));
        }
        debug!(digest = %descriptor.digest, size, "blob verified");
        Ok(())
    }

    /// Vet every layer entry, returning each safe path with its kind.
    fn plan_extraction(&self, layer: &Descriptor) -> PackResult<Vec<(PathBuf, EntryKind)>> {
        let mut archive = self.open_layer(layer)?;
        let entries = archive.entries().map_err(|e| self.corrupt_layer(layer, e))?;
        let mut plan = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.corrupt_layer(layer, e))?;
            let name = entry.path().map_err(|e| self.corrupt_layer(layer, e))?.into_owned();
            let relative = safe_entry_path(&name).ok_or_else(|| {
                self.corrupt(format!(
                    "layer entry {} escapes the extraction root",
                    name.display()
                ))
            })?;
            let header = entry.header();
            let kind = if header.entry_type().is_dir() {
                EntryKind::Directory
            } else if header.entry_type().is_file() {
                let mode = header.mode().map_err(|e| self.corrupt_layer(layer, e))?;
                EntryKind::File {
                    executable: mode & 0o111 != 0,
                }
            } else {
                return Err(self.corrupt(format!(
                    "layer entry {} has unsupported type {:?}",
                    name.display(),
                    header.entry_type()
                )));
            };
            plan.push((relative, kind));
        }
        Ok(plan)
    }
}

impl Package for OciPackage {
    fn create_from_directory(
        src: &Path,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self> {
        check_oci_target(out)?;
        if let (Ok(a), Ok(b)) = (dunce::canonicalize(src), dunce::canonicalize(out)) {
            if a == b {
                return Err(PackError::invalid_target(
                    out,
                    "the target must not be the source directory",
                ));
            }
        }
        require_entry(src, AGENT_MANIFEST_PATH)?;
        let manifest = load_validated_manifest(&src.join(AGENT_MANIFEST_PATH), validator)?;
        let acs = src.join(CONTAINER_SPEC_PATH);
        if acs.is_file() {
            load_container_spec(&acs)?;
        }
        let tree = SourceTree::new(src)?;

        let package = Self::bind(out);
        let sha_dir = package.store.root().join(DigestAlgorithm::Sha256.as_str());
        fs::create_dir_all(&sha_dir).io_context(|| format!("creating {}", sha_dir.display()))?;
        let tree = tree.excluding(out);

        let config = write_config(&package.store, &manifest)?;
        let layer = write_layer(&tree, out, &package.store)?;
        let layer_size = layer.size;

        let image = ImageManifest::new(config, vec![layer]);
        let (manifest_digest, manifest_size) = package.store.put_bytes(&to_pretty_json(&image)?)?;
        let index = ImageIndex::single(
            Descriptor::new(MANIFEST_MEDIA_TYPE, manifest_digest.clone(), manifest_size)
                .with_annotation(TITLE_ANNOTATION, manifest.id.as_str()),
        );
        write_root_file(out, INDEX_FILE, &to_pretty_json(&index)?)?;
        let marker = serde_json::to_vec(&OciLayout::default())
            .map_err(io::Error::from)
            .io_context(|| "encoding oci-layout".into())?;
        write_root_file(out, OCI_LAYOUT_FILE, &marker)?;

        info!(
            agent_id = %manifest.id,
            manifest = %manifest_digest,
            layer_size,
            out = %out.display(),
            "packed OCI layout"
        );
        Ok(package)
    }

    fn open(path: &Path) -> PackResult<Self> {
        if path.exists() && !path.is_dir() {
            return Err(PackError::invalid_target(
                path,
                "an OCI layout must be a directory",
            ));
        }
        require_entry(path, OCI_LAYOUT_FILE)?;
        require_entry(path, INDEX_FILE)?;
        Ok(Self::bind(path))
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn read_manifest(&self) -> PackResult<AgentManifest> {
        let layer = self.layer_descriptor()?;
        let location = format!("layer {}", layer.digest);
        let mut archive = self.open_layer(&layer)?;
        let entries = archive
            .entries()
            .map_err(|e| self.corrupt_layer(&layer, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| self.corrupt_layer(&layer, e))?;
            let name = entry
                .path()
                .map_err(|e| self.corrupt_layer(&layer, e))?
                .into_owned();
            if !entry_matches(&name, AGENT_MANIFEST_PATH) {
                continue;
            }
            let entry_type = entry.header().entry_type();
            if !entry_type.is_file() {
                let reason = if entry_type.is_dir() {
                    MissingReason::Directory
                } else {
                    MissingReason::NotRegularFile
                };
                return Err(PackError::NotFound {
                    entry: AGENT_MANIFEST_PATH.to_string(),
                    location,
                    reason,
                });
            }
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| self.corrupt_layer(&layer, e))?;
            return AgentManifest::from_yaml_str(&text)
                .map_err(|e| self.corrupt(format!("{AGENT_MANIFEST_PATH}: {e}")));
        }

        Err(PackError::NotFound {
            entry: AGENT_MANIFEST_PATH.to_string(),
            location,
            reason: MissingReason::Absent,
        })
    }

    fn list_entries(&self) -> PackResult<Vec<String>> {
        let layer = self.layer_descriptor()?;
        let mut archive = self.open_layer(&layer)?;
        let entries = archive
            .entries()
            .map_err(|e| self.corrupt_layer(&layer, e))?;
        entries
            .map(|entry| {
                let entry = entry.map_err(|e| self.corrupt_layer(&layer, e))?;
                Ok(String::from_utf8_lossy(&entry.path_bytes()).into_owned())
            })
            .collect()
    }

    fn read_metadata(&self) -> PackResult<Option<Value>> {
        let manifest = self.image_manifest()?;
        self.read_blob_json(&manifest.config).map(Some)
    }

    fn verify(&self) -> PackResult<()> {
        let layout: OciLayout = self.read_json(OCI_LAYOUT_FILE)?;
        if layout != OciLayout::default() {
            return Err(self.corrupt(format!(
                "unsupported image layout version {}",
                layout.image_layout_version
            )));
        }
        let index = self.index()?;
        if index.manifests.is_empty() {
            return Err(self.corrupt("index.json lists no manifests"));
        }

        let mut blobs = 0usize;
        for descriptor in &index.manifests {
            self.verify_descriptor(descriptor)?;
            let manifest: ImageManifest = self.read_blob_json(descriptor)?;
            self.verify_descriptor(&manifest.config)?;
            for layer in &manifest.layers {
                self.verify_descriptor(layer)?;
            }
            blobs += 2 + manifest.layers.len();
        }
        info!(path = %self.root.display(), blobs, "OCI layout verified");
        Ok(())
    }

    fn unpack(&self, out_dir: &Path) -> PackResult<PathBuf> {
        let layer = self.layer_descriptor()?;
        let plan = self.plan_extraction(&layer)?;
        fs::create_dir_all(out_dir).io_context(|| format!("creating {}", out_dir.display()))?;

        let mut archive = self.open_layer(&layer)?;
        let entries = archive
            .entries()
            .map_err(|e| self.corrupt_layer(&layer, e))?;
        for (entry, (relative, kind)) in entries.zip(plan.iter()) {
            let mut entry = entry.map_err(|e| self.corrupt_layer(&layer, e))?;
            match kind {
                EntryKind::Directory => extract_dir(out_dir, relative)?,
                EntryKind::File { executable } => {
                    extract_file(out_dir, relative, &mut entry, *executable)?;
                }
            }
        }
        info!(
            package = %self.root.display(),
            out = %out_dir.display(),
            entries = plan.len(),
            "unpacked OCI layout"
        );
        Ok(out_dir.to_path_buf())
    }
}

fn to_pretty_json(value: &impl Serialize) -> PackResult<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(io::Error::from)
        .io_context(|| "encoding JSON".into())
}

fn write_root_file(out: &Path, name: &str, bytes: &[u8]) -> PackResult<()> {
    let path = out.join(name);
    fs::write(&path, bytes).io_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), size = bytes.len(), "wrote layout file");
    Ok(())
}

/// Store the canonical config blob.
fn write_config(store: &BlobStore, manifest: &AgentManifest) -> PackResult<Descriptor> {
    let config = PackageConfig {
        agent_id: manifest.id.clone(),
        adp_version: manifest.adp_version.clone(),
    };
    let bytes = CanonicalBytes::new(&config)
        .map_err(io::Error::other)
        .io_context(|| "canonicalizing config".into())?;
    let (digest, size) = store.put_bytes(bytes.as_bytes())?;
    Ok(Descriptor::new(CONFIG_MEDIA_TYPE, digest, size))
}

/// Tar the tree into a staging file under `out`, then store it.
fn write_layer(tree: &SourceTree, out: &Path, store: &BlobStore) -> PackResult<Descriptor> {
    let staging = tempfile::Builder::new()
        .prefix(".layer-")
        .suffix(".tar")
        .tempfile_in(out)
        .io_context(|| format!("staging layer in {}", out.display()))?;

    let mut builder = tar::Builder::new(staging.as_file());
    let mut entries = 0usize;
    for file in tree.files() {
        append_normalized(&mut builder, &file?)?;
        entries += 1;
    }
    builder
        .into_inner()
        .and_then(|mut f| f.flush())
        .io_context(|| "finishing layer".into())?;

    let (digest, size) = digest_file(staging.path())?;
    store.put_file(&digest, staging.path())?;
    debug!(%digest, size, entries, "stored layer");
    Ok(Descriptor::new(LAYER_MEDIA_TYPE, digest, size))
}

fn append_normalized<W: Write>(builder: &mut tar::Builder<W>, file: &SourceFile) -> PackResult<()> {
    let context = || format!("adding {} to layer", file.name);
    let input = File::open(&file.path).io_context(context)?;
    let meta = input.metadata().io_context(context)?;

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(meta.len());
    header.set_mode(if is_executable(&meta) { 0o755 } else { 0o644 });
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    builder
        .append_data(&mut header, &file.name, input)
        .io_context(context)?;
    debug!(entry = %file.name, size = meta.len(), "layer entry");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{accept, write_agent_tree, MINIMAL_MANIFEST};

    fn packed() -> (tempfile::TempDir, OciPackage) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_agent_tree(&src);
        let pkg = OciPackage::create_from_directory(&src, &dir.path().join("out"), &accept).unwrap();
        (dir, pkg)
    }

    #[test]
    fn layout_files_are_written() {
        let (_dir, pkg) = packed();
        let root = pkg.path();
        assert_eq!(
            fs::read_to_string(root.join(OCI_LAYOUT_FILE)).unwrap(),
            r#"{"imageLayoutVersion":"1.0.0"}"#
        );
        let index = pkg.index().unwrap();
        assert_eq!(index.schema_version, 2);
        assert_eq!(index.manifests.len(), 1);
        assert_eq!(index.manifests[0].title(), Some("agent.test"));
        assert_eq!(pkg.list_blobs().unwrap().len(), 3);
    }

    #[test]
    fn no_staging_files_remain() {
        let (_dir, pkg) = packed();
        let leftovers: Vec<_> = fs::read_dir(pkg.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {leftovers:?}");
    }

    #[test]
    fn config_blob_is_canonical() {
        let (_dir, pkg) = packed();
        let manifest = pkg.image_manifest().unwrap();
        assert_eq!(manifest.config.media_type, CONFIG_MEDIA_TYPE);
        let bytes = pkg.blob_store().get(&manifest.config.digest).unwrap();
        assert_eq!(bytes, br#"{"adp_version":"0.1.0","agent_id":"agent.test"}"#);
        assert_eq!(pkg.config().unwrap().agent_id, "agent.test");
    }

    #[test]
    fn manifest_round_trips() {
        let (_dir, pkg) = packed();
        let manifest = pkg.read_manifest().unwrap();
        assert_eq!(manifest.id, "agent.test");
        assert_eq!(manifest.adp_version, "0.1.0");
    }

    #[test]
    fn layer_entries_are_sorted_and_complete() {
        let (_dir, pkg) = packed();
        let entries = pkg.list_entries().unwrap();
        assert!(entries.contains(&AGENT_MANIFEST_PATH.to_string()));
        assert!(entries.contains(&"acs/container.yaml".to_string()));
        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(entries, sorted);
    }

    #[test]
    fn layer_headers_are_normalized() {
        let (_dir, pkg) = packed();
        let layer = pkg.layer_descriptor().unwrap();
        let mut archive = tar::Archive::new(pkg.blob_store().open(&layer.digest).unwrap());
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.mtime().unwrap(), 0);
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            assert!(matches!(header.mode().unwrap(), 0o644 | 0o755));
        }
    }

    #[test]
    fn metadata_is_config() {
        let (_dir, pkg) = packed();
        let meta = pkg.read_metadata().unwrap().unwrap();
        assert_eq!(meta["agent_id"], "agent.test");
    }

    #[test]
    fn verify_passes_then_detects_tampering() {
        let (_dir, pkg) = packed();
        pkg.verify().unwrap();

        let layer = pkg.layer_descriptor().unwrap();
        fs::write(pkg.blob_store().path(&layer.digest), b"tampered").unwrap();
        let err = pkg.verify().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptPackage);
    }

    #[test]
    fn unpack_restores_tree() {
        let (dir, pkg) = packed();
        let target = dir.path().join("unpacked");
        pkg.unpack(&target).unwrap();
        assert_eq!(
            fs::read_to_string(target.join(AGENT_MANIFEST_PATH)).unwrap(),
            MINIMAL_MANIFEST
        );
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let out = dir.path().join("out");
        let err = OciPackage::create_from_directory(&src, &out, &accept).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!out.exists());
    }

    #[test]
    fn rejected_manifest_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_agent_tree(&src);
        let out = dir.path().join("out");
        let reject = |_: &Value| vec!["nope".to_string()];
        let err = OciPackage::create_from_directory(&src, &out, &reject).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(!out.exists());
    }

    #[test]
    fn file_like_target_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_agent_tree(&src);
        let out = dir.path().join("agent.tar");
        let err = OciPackage::create_from_directory(&src, &out, &accept).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert!(!out.exists());
    }

    #[test]
    fn source_as_target_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_agent_tree(&src);
        let err = OciPackage::create_from_directory(&src, &src, &accept).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn nested_output_is_not_packaged() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_agent_tree(&src);
        let out = src.join("build");
        let pkg = OciPackage::create_from_directory(&src, &out, &accept).unwrap();
        assert!(pkg
            .list_entries()
            .unwrap()
            .iter()
            .all(|e| !e.starts_with("build/")));
    }

    #[test]
    fn open_requires_layout_marker() {
        let dir = tempfile::tempdir().unwrap();
        let err = OciPackage::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn empty_index_is_corrupt() {
        let (_dir, pkg) = packed();
        fs::write(
            pkg.path().join(INDEX_FILE),
            r#"{"schemaVersion":2,"manifests":[]}"#,
        )
        .unwrap();
        let err = pkg.read_manifest().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptPackage);
    }

    #[test]
    fn missing_manifest_blob_is_corrupt() {
        let (_dir, pkg) = packed();
        let descriptor = pkg.manifest_descriptor().unwrap();
        fs::remove_file(pkg.blob_store().path(&descriptor.digest)).unwrap();
        let err = pkg.read_manifest().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptPackage);
    }
}
