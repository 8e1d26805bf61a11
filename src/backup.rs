//! Workspace bundles: a zip holding `manifest.json` and the SQLite file.
//!
//! The manifest carries the SHA-256 of the database entry; imports refuse a
//! bundle whose database does not hash to it.

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/schoold.sqlite3";
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
pub const BUNDLE_FORMAT_V1: &str = "schoold-workspace-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleManifest {
    format: String,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    exported_at: Option<String>,
    #[serde(default)]
    db_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub checksum_verified: bool,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle has no {} entry", name))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(buf)
}

fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    let mut head = [0u8; 4];
    let mut f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    match f.read_exact(&mut head) {
        Ok(()) => Ok(head == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Writes `bytes` next to `dst` and renames it into place.
fn replace_file(dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let staging = dst.with_extension("sqlite3.importing");
    {
        let mut out = File::create(&staging)
            .with_context(|| format!("failed to create {}", staging.display()))?;
        out.write_all(bytes)
            .and_then(|_| out.sync_all())
            .with_context(|| format!("failed to write {}", staging.display()))?;
    }
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| format!("failed to remove {}", dst.display()))?;
    }
    std::fs::rename(&staging, dst)
        .with_context(|| format!("failed to move database into {}", dst.display()))
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(crate::db::DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    let db_bytes =
        std::fs::read(&db_path).with_context(|| format!("failed to read {}", db_path.display()))?;
    let manifest = BundleManifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: Some(chrono::Utc::now().to_rfc3339()),
        db_sha256: Some(sha256_hex(&db_bytes)),
    };

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let out = File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: [(&str, Vec<u8>); 2] = [
        (
            MANIFEST_ENTRY,
            serde_json::to_vec_pretty(&manifest).context("failed to encode manifest")?,
        ),
        (DB_ENTRY, db_bytes),
    ];
    for (name, bytes) in &entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {}", name))?;
    }
    zip.finish().context("failed to finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: entries.len(),
        db_sha256: manifest.db_sha256.unwrap_or_default(),
    })
}

/// Restores a bundle into `workspace_path`, replacing its database.
///
/// Nothing on disk changes unless the bundle is well formed and, when the
/// manifest carries a checksum, the database entry matches it.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    if !looks_like_zip(in_path)? {
        bail!("not a workspace bundle: {}", in_path.display());
    }
    let file = File::open(in_path).with_context(|| format!("failed to open {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;

    let manifest: BundleManifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", manifest.format));
    }

    let db_bytes = read_entry(&mut archive, DB_ENTRY)?;
    if let Some(expected) = manifest.db_sha256.as_deref() {
        let actual = sha256_hex(&db_bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            bail!(
                "database checksum mismatch: manifest {} vs extracted {}",
                expected,
                actual
            );
        }
    }

    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create {}", workspace_path.display()))?;
    replace_file(&workspace_path.join(crate::db::DB_FILE_NAME), &db_bytes)?;
    tracing::debug!(bytes = db_bytes.len(), "workspace database replaced from bundle");

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        checksum_verified: manifest.db_sha256.is_some(),
    })
}
