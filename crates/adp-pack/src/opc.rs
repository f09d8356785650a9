//! # OPC-Style ZIP Packages
//!
//! A single `.adpkg` archive with a fixed entry order:
//!
//! 1. `[Content_Types].xml`
//! 2. `adp/agent.yaml`
//! 3. `acs/container.yaml` (when present)
//! 4. payload trees (`src/`, `eval/`, and for whole-tree packing `tools/`
//!    and `metadata/`), each in sorted walk order
//! 5. a generated `metadata/version.json`
//!
//! Entries are deflated with the DOS epoch as their timestamp. The archive
//! is assembled in a temporary file beside the target and renamed into
//! place only once complete.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use adp_core::{AgentManifest, ManifestValidator};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{IoContext, MissingReason, PackError, PackResult};
use crate::extract::{extract_dir, extract_file, is_executable, EntryKind};
use crate::package::Package;
use crate::source::{
    check_opc_target, load_container_spec, load_validated_manifest, require_entry, require_file,
    AGENT_MANIFEST_PATH, CONTAINER_SPEC_PATH,
};
use crate::walk::{entry_matches, safe_entry_path, SourceTree};

/// Name of the content-types part.
pub const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
/// Name of the generated build metadata entry.
pub const VERSION_ENTRY: &str = "metadata/version.json";

/// Body of `[Content_Types].xml`.
pub const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="yaml" ContentType="application/x-yaml"/>
  <Default Extension="json" ContentType="application/json"/>
  <Override PartName="/adp/agent.yaml" ContentType="application/vnd.adp.agent+yaml"/>
  <Override PartName="/acs/container.yaml" ContentType="application/vnd.adp.container+yaml"/>
</Types>
"#;

/// Payload directories copied when packing a whole source tree.
const TREE_DIRS: [&str; 4] = ["src", "eval", "tools", "metadata"];

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Contents of `metadata/version.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
    /// RFC 3339, UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_timestamp: Option<String>,
}

impl BuildMetadata {
    /// Identity only. Keeps whole-tree packing reproducible.
    pub fn for_agent(manifest: &AgentManifest) -> Self {
        Self {
            agent_id: manifest.id.clone(),
            agent_version: None,
            spec_version: None,
            build_timestamp: None,
        }
    }

    /// Identity, versions and the current time.
    pub fn stamped(manifest: &AgentManifest) -> Self {
        Self {
            agent_id: manifest.id.clone(),
            agent_version: Some(manifest.agent_version().to_string()),
            spec_version: Some(manifest.adp_version.clone()),
            build_timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Separately located inputs for [`OpcPackage::pack`].
#[derive(Debug, Clone)]
pub struct PackInputs {
    /// ADP manifest; stored as `adp/agent.yaml`.
    pub agent: PathBuf,
    /// ACS container spec; stored as `acs/container.yaml`.
    pub acs: PathBuf,
    /// Source tree stored under `src/`. Skipped when absent.
    pub src: PathBuf,
    /// Evaluation assets stored under `eval/`. Skipped when absent.
    pub eval: PathBuf,
}

/// An ADPKG stored as a single ZIP archive.
#[derive(Debug, Clone)]
pub struct OpcPackage {
    path: PathBuf,
}

enum Lookup {
    Found(Vec<u8>),
    Missing(MissingReason),
}

impl OpcPackage {
    /// Pack separately located inputs, stamping build metadata.
    ///
    /// The manifest and container spec must both exist; `src` and `eval`
    /// are optional.
    pub fn pack(
        inputs: &PackInputs,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self> {
        check_opc_target(out)?;
        require_file(&inputs.agent)?;
        require_file(&inputs.acs)?;
        let manifest = load_validated_manifest(&inputs.agent, validator)?;
        load_container_spec(&inputs.acs)?;

        let mut writer = OpcWriter::create(out)?;
        writer.add_bytes(CONTENT_TYPES_ENTRY, CONTENT_TYPES_XML.as_bytes())?;
        writer.add_file(AGENT_MANIFEST_PATH, &inputs.agent)?;
        writer.add_file(CONTAINER_SPEC_PATH, &inputs.acs)?;
        for (dir, prefix) in [(&inputs.src, "src"), (&inputs.eval, "eval")] {
            if dir.is_dir() {
                writer.add_tree(dir, prefix)?;
            } else {
                debug!(dir = %dir.display(), "optional directory absent, skipped");
            }
        }
        writer.add_json(VERSION_ENTRY, &BuildMetadata::stamped(&manifest))?;
        let entries = writer.finish()?;

        info!(agent_id = %manifest.id, out = %out.display(), entries, "packed ADPKG");
        Ok(Self {
            path: out.to_path_buf(),
        })
    }

    fn archive(&self) -> PackResult<ZipArchive<File>> {
        let file = File::open(&self.path).io_context(|| format!("opening {}", self.path.display()))?;
        ZipArchive::new(file).map_err(|e| self.corrupt(e))
    }

    fn corrupt(&self, detail: impl ToString) -> PackError {
        PackError::corrupt(&self.path, detail.to_string())
    }

    fn lookup(&self, name: &str) -> PackResult<Lookup> {
        let mut archive = self.archive()?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| self.corrupt(e))?;
            if !entry_matches(Path::new(file.name()), name) {
                continue;
            }
            if file.is_dir() {
                return Ok(Lookup::Missing(MissingReason::Directory));
            }
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .map_err(|e| self.corrupt(format!("{name}: {e}")))?;
            return Ok(Lookup::Found(bytes));
        }
        Ok(Lookup::Missing(MissingReason::Absent))
    }

    fn not_found(&self, entry: &str, reason: MissingReason) -> PackError {
        PackError::NotFound {
            entry: entry.to_string(),
            location: self.path.display().to_string(),
            reason,
        }
    }

    fn plan_extraction(&self, archive: &mut ZipArchive<File>) -> PackResult<Vec<(PathBuf, EntryKind)>> {
        let mut plan = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| self.corrupt(e))?;
            let relative = safe_entry_path(Path::new(file.name())).ok_or_else(|| {
                self.corrupt(format!("entry {} escapes the extraction root", file.name()))
            })?;
            let mode = file.unix_mode();
            if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                return Err(self.corrupt(format!("entry {} is a symbolic link", file.name())));
            }
            let kind = if file.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File {
                    executable: mode.is_some_and(|m| m & 0o111 != 0),
                }
            };
            plan.push((relative, kind));
        }
        Ok(plan)
    }
}

impl Package for OpcPackage {
    fn create_from_directory(
        src: &Path,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self> {
        check_opc_target(out)?;
        require_entry(src, AGENT_MANIFEST_PATH)?;
        let manifest = load_validated_manifest(&src.join(AGENT_MANIFEST_PATH), validator)?;
        let acs = src.join(CONTAINER_SPEC_PATH);
        let has_acs = acs.is_file();
        if has_acs {
            load_container_spec(&acs)?;
        }

        let mut writer = OpcWriter::create(out)?;
        writer.add_bytes(CONTENT_TYPES_ENTRY, CONTENT_TYPES_XML.as_bytes())?;
        writer.add_file(AGENT_MANIFEST_PATH, &src.join(AGENT_MANIFEST_PATH))?;
        if has_acs {
            writer.add_file(CONTAINER_SPEC_PATH, &acs)?;
        }
        for dir in TREE_DIRS {
            let path = src.join(dir);
            if path.is_dir() {
                writer.add_tree(&path, dir)?;
            }
        }
        writer.add_json(VERSION_ENTRY, &BuildMetadata::for_agent(&manifest))?;
        let entries = writer.finish()?;

        info!(agent_id = %manifest.id, out = %out.display(), entries, "packed ADPKG");
        Ok(Self {
            path: out.to_path_buf(),
        })
    }

    fn open(path: &Path) -> PackResult<Self> {
        if path.is_dir() {
            return Err(PackError::invalid_target(path, "an ADPKG archive must be a file"));
        }
        require_file(path)?;
        let package = Self {
            path: path.to_path_buf(),
        };
        package.archive()?;
        Ok(package)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read_manifest(&self) -> PackResult<AgentManifest> {
        match self.lookup(AGENT_MANIFEST_PATH)? {
            Lookup::Found(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| self.corrupt(format!("{AGENT_MANIFEST_PATH}: {e}")))?;
                AgentManifest::from_yaml_str(&text)
                    .map_err(|e| self.corrupt(format!("{AGENT_MANIFEST_PATH}: {e}")))
            }
            Lookup::Missing(reason) => Err(self.not_found(AGENT_MANIFEST_PATH, reason)),
        }
    }

    fn list_entries(&self) -> PackResult<Vec<String>> {
        let mut archive = self.archive()?;
        (0..archive.len())
            .map(|i| {
                archive
                    .by_index(i)
                    .map(|f| f.name().to_string())
                    .map_err(|e| self.corrupt(e))
            })
            .collect()
    }

    fn read_metadata(&self) -> PackResult<Option<Value>> {
        match self.lookup(VERSION_ENTRY)? {
            Lookup::Found(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| self.corrupt(format!("{VERSION_ENTRY}: {e}"))),
            Lookup::Missing(_) => Ok(None),
        }
    }

    fn verify(&self) -> PackResult<()> {
        let mut archive = self.archive()?;
        if archive.is_empty() {
            return Err(self.corrupt("archive has no entries"));
        }
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| self.corrupt(e))?;
            if i == 0 && file.name() != CONTENT_TYPES_ENTRY {
                return Err(self.corrupt(format!(
                    "first entry is {}, expected {CONTENT_TYPES_ENTRY}",
                    file.name()
                )));
            }
            let name = file.name().to_string();
            io::copy(&mut file, &mut io::sink())
                .map_err(|e| self.corrupt(format!("{name}: {e}")))?;
        }
        if let Lookup::Missing(reason) = self.lookup(AGENT_MANIFEST_PATH)? {
            return Err(self.not_found(AGENT_MANIFEST_PATH, reason));
        }
        info!(path = %self.path.display(), entries = archive.len(), "ADPKG verified");
        Ok(())
    }

    fn unpack(&self, out_dir: &Path) -> PackResult<PathBuf> {
        let mut archive = self.archive()?;
        let plan = self.plan_extraction(&mut archive)?;
        fs::create_dir_all(out_dir).io_context(|| format!("creating {}", out_dir.display()))?;

        for (i, (relative, kind)) in plan.iter().enumerate() {
            match kind {
                EntryKind::Directory => extract_dir(out_dir, relative)?,
                EntryKind::File { executable } => {
                    let mut file = archive.by_index(i).map_err(|e| self.corrupt(e))?;
                    extract_file(out_dir, relative, &mut file, *executable)?;
                }
            }
        }
        info!(
            package = %self.path.display(),
            out = %out_dir.display(),
            entries = plan.len(),
            "unpacked ADPKG"
        );
        Ok(out_dir.to_path_buf())
    }
}

/// Streams entries into a staging file and renames it over the target.
struct OpcWriter {
    zip: ZipWriter<NamedTempFile>,
    staging: PathBuf,
    target: PathBuf,
    entries: usize,
}

impl OpcWriter {
    fn create(target: &Path) -> PackResult<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).io_context(|| format!("creating {}", dir.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(".adpkg-")
            .tempfile_in(&dir)
            .io_context(|| format!("staging archive in {}", dir.display()))?;
        Ok(Self {
            staging: staging.path().to_path_buf(),
            zip: ZipWriter::new(staging),
            target: target.to_path_buf(),
            entries: 0,
        })
    }

    fn options(executable: bool) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(if executable { 0o755 } else { 0o644 })
    }

    fn start(&mut self, name: &str, executable: bool) -> PackResult<()> {
        self.zip
            .start_file(name, Self::options(executable))
            .map_err(|e| zip_write_error(name, e))?;
        self.entries += 1;
        debug!(entry = name, "archive entry");
        Ok(())
    }

    fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> PackResult<()> {
        self.start(name, false)?;
        io::Write::write_all(&mut self.zip, bytes).io_context(|| format!("writing {name}"))
    }

    fn add_json(&mut self, name: &str, value: &impl Serialize) -> PackResult<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(io::Error::from)
            .io_context(|| format!("encoding {name}"))?;
        self.add_bytes(name, &bytes)
    }

    fn add_file(&mut self, name: &str, path: &Path) -> PackResult<()> {
        let mut input = File::open(path).io_context(|| format!("opening {}", path.display()))?;
        let meta = input
            .metadata()
            .io_context(|| format!("inspecting {}", path.display()))?;
        self.start(name, is_executable(&meta))?;
        io::copy(&mut input, &mut self.zip).io_context(|| format!("writing {name}"))?;
        Ok(())
    }

    /// Add every file under `dir` as `prefix/<relative>`.
    fn add_tree(&mut self, dir: &Path, prefix: &str) -> PackResult<()> {
        let tree = SourceTree::new(dir)?
            .excluding(&self.staging)
            .excluding(&self.target);
        for file in tree.files() {
            let file = file?;
            let name = format!("{prefix}/{}", file.name);
            if name == VERSION_ENTRY {
                warn!(path = %file.path.display(), "replacing source {VERSION_ENTRY} with generated metadata");
                continue;
            }
            self.add_file(&name, &file.path)?;
        }
        Ok(())
    }

    fn finish(self) -> PackResult<usize> {
        let target = self.target;
        let staging = self
            .zip
            .finish()
            .map_err(|e| zip_write_error("central directory", e))?;
        staging
            .as_file()
            .sync_all()
            .io_context(|| format!("syncing {}", self.staging.display()))?;
        staging
            .persist(&target)
            .map_err(|e| PackError::io(format!("renaming archive to {}", target.display()), e.error))?;
        Ok(self.entries)
    }
}

fn zip_write_error(what: &str, err: ZipError) -> PackError {
    let source = match err {
        ZipError::Io(e) => e,
        other => io::Error::other(other),
    };
    PackError::io(format!("writing {what}"), source)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
