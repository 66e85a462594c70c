// ABOUTME: Content-addressed mirroring of the local source tree to the host.
// ABOUTME: Hashes both sides, uploads only changed files, deletes remote-only ones.

use crate::error::{Error, Result};
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::shell_quote;
use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What a sync run actually moved. A re-run with no local changes
/// reports zeros across the board.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub transferred_files: usize,
    pub transferred_bytes: u64,
    pub deleted_files: usize,
}

/// Mirrors a local directory tree to a remote path, excluding a fixed
/// pattern set and transferring only changed content.
pub struct FileSynchronizer<'a, E: Executor> {
    executor: &'a E,
    upload_timeout: Duration,
}

impl<'a, E: Executor> FileSynchronizer<'a, E> {
    pub fn new(executor: &'a E, upload_timeout: Duration) -> Self {
        Self {
            executor,
            upload_timeout,
        }
    }

    /// Mirror `local_root` into `remote_root`.
    ///
    /// Precondition: the remote root directory exists (the pipeline
    /// creates it before this stage runs).
    pub async fn sync(
        &self,
        local_root: &Path,
        remote_root: &str,
        excludes: &[String],
    ) -> Result<SyncSummary> {
        let matcher = build_matcher(local_root, excludes)?;
        let local = local_manifest(local_root, &matcher)?;
        let remote = self.remote_manifest(remote_root).await?;

        // Paths present remotely but not locally get removed, except
        // excluded paths, which the remote side may legitimately create.
        let stale: Vec<&String> = remote
            .keys()
            .filter(|path| {
                !local.contains_key(*path)
                    && !matcher
                        .matched_path_or_any_parents(Path::new(path), false)
                        .is_ignore()
            })
            .collect();

        let changed: Vec<&String> = local
            .iter()
            .filter(|(path, digest)| remote.get(*path) != Some(digest))
            .map(|(path, _)| path)
            .collect();

        let mut summary = SyncSummary::default();

        if !stale.is_empty() {
            let files = stale
                .iter()
                .map(|p| shell_quote(p))
                .collect::<Vec<_>>()
                .join(" ");
            let script = format!(
                "cd {root} && rm -f -- {files} && find . -type d -empty -delete",
                root = shell_quote(remote_root),
            );
            let output = self
                .executor
                .run(&RemoteCommand::new(script, MANIFEST_TIMEOUT))
                .await?;
            if !output.success() {
                return Err(Error::Deployment(format!(
                    "failed to remove stale remote files: {}",
                    output.combined()
                )));
            }
            summary.deleted_files = stale.len();
        }

        if !changed.is_empty() {
            let archive = build_archive(local_root, &changed)?;
            summary.transferred_files = changed.len();
            summary.transferred_bytes = archive.len() as u64;

            let script = format!("tar -xpf - -C {}", shell_quote(remote_root));
            let command = RemoteCommand::new(script, self.upload_timeout).with_input(archive);
            let output = self.executor.run(&command).await?;
            if !output.success() {
                return Err(Error::Deployment(format!(
                    "remote tar extraction failed: {}",
                    output.combined()
                )));
            }
        }

        tracing::info!(
            "sync: {} file(s) transferred ({} bytes), {} deleted",
            summary.transferred_files,
            summary.transferred_bytes,
            summary.deleted_files
        );
        Ok(summary)
    }

    /// SHA-256 manifest of the remote tree, relative paths as keys.
    async fn remote_manifest(&self, remote_root: &str) -> Result<BTreeMap<String, String>> {
        let script = format!(
            "if [ -d {root} ]; then cd {root} && find . -type f -print0 | xargs -0r sha256sum; fi",
            root = shell_quote(remote_root),
        );
        let output = self
            .executor
            .run(&RemoteCommand::new(script, MANIFEST_TIMEOUT))
            .await?;
        if !output.success() {
            return Err(Error::Deployment(format!(
                "failed to read remote manifest: {}",
                output.combined()
            )));
        }

        let mut manifest = BTreeMap::new();
        for line in output.stdout.lines() {
            if let Some((digest, path)) = line.split_once("  ") {
                let path = path.trim_start_matches("./").to_string();
                manifest.insert(path, digest.trim().to_string());
            }
        }
        Ok(manifest)
    }
}

/// Exclusion matcher over the configured patterns (gitignore syntax).
fn build_matcher(root: &Path, excludes: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in excludes {
        builder
            .add_line(None, pattern)
            .map_err(|e| Error::InvalidConfig(format!("bad exclude pattern '{pattern}': {e}")))?;
    }
    builder
        .build()
        .map_err(|e| Error::InvalidConfig(format!("bad exclude patterns: {e}")))
}

/// SHA-256 manifest of the local tree, relative paths as keys.
fn local_manifest(root: &Path, matcher: &Gitignore) -> Result<BTreeMap<String, String>> {
    let mut manifest = BTreeMap::new();

    let matcher_for_walk = matcher.clone();
    let root_for_walk = root.to_path_buf();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .filter_entry(move |entry| {
            // Prune excluded directories instead of descending into them.
            let Ok(rel) = entry.path().strip_prefix(&root_for_walk) else {
                return true;
            };
            if rel.as_os_str().is_empty() {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !matcher_for_walk.matched(rel, is_dir).is_ignore()
        })
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| Error::Deployment(format!("walk failed: {e}")))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Deployment(format!("walk produced foreign path: {e}")))?;

        let content = std::fs::read(entry.path())?;
        let digest = Sha256::digest(&content);
        manifest.insert(
            rel.to_string_lossy().replace('\\', "/"),
            format!("{digest:x}"),
        );
    }

    Ok(manifest)
}

/// Build an in-memory tar archive of the given files, paths relative to root.
fn build_archive(root: &Path, files: &[&String]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for rel in files {
        builder.append_path_with_name(root.join(rel), rel)?;
    }
    builder
        .into_inner()
        .map_err(|e| Error::Deployment(format!("failed to build archive: {e}")))
}
