//! Runs external lint plugins.
//!
//! A plugin is an executable named `registry-lint-<linter>` found on `PATH`.
//! It reads a binary `LinterRequest` from stdin naming a directory that holds
//! the spec files, and writes a binary `LinterResponse` to stdout.

use super::messages::{Lint, LinterRequest, LinterResponse};
use crate::constants::LINTER_PREFIX;
use crate::mime;
use crate::visitor::SpecContents;
use anyhow::{bail, Context, Result};
use prost::Message;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One lint plugin executable.
#[derive(Debug, Clone)]
pub struct LintPlugin {
    pub linter: String,
    program: PathBuf,
    keep_dir: bool,
}

impl LintPlugin {
    /// The plugin for `linter`, resolved through `PATH` when run.
    pub fn for_linter(linter: &str) -> Self {
        Self {
            linter: linter.to_string(),
            program: PathBuf::from(format!("{LINTER_PREFIX}{linter}")),
            keep_dir: false,
        }
    }

    /// A plugin at an explicit location.
    pub fn at(linter: &str, program: impl Into<PathBuf>) -> Self {
        Self {
            linter: linter.to_string(),
            program: program.into(),
            keep_dir: false,
        }
    }

    /// Leaves spec directories in place after the plugin exits.
    pub fn keep_dir(mut self, keep: bool) -> Self {
        self.keep_dir = keep;
        self
    }

    /// Relation under which results are stored, e.g. `lint-spectral`.
    pub fn relation(&self) -> String {
        format!("lint-{}", self.linter)
    }

    /// Writes the spec into a fresh directory and runs the plugin over it.
    pub async fn lint(
        &self,
        spec_name: &str,
        filename: &str,
        contents: &SpecContents,
    ) -> Result<Lint> {
        let dir = tempfile::Builder::new()
            .prefix("registry-lint-")
            .keep(self.keep_dir)
            .tempdir()
            .context("failed to create a directory for the spec")?;
        write_spec_files(dir.path(), spec_name, filename, contents)?;
        if self.keep_dir {
            tracing::info!(spec = spec_name, dir = %dir.path().display(), "keeping lint directory");
        }

        let request = LinterRequest {
            spec_directory: dir.path().display().to_string(),
            rule_ids: Vec::new(),
        };
        let response = self.run(&request).await?;
        if !response.errors.is_empty() {
            bail!(
                "{} reported errors for {spec_name}: {}",
                self.program.display(),
                response.errors.join("; ")
            );
        }
        let mut lint = response.lint.unwrap_or_default();
        if lint.name.is_empty() {
            lint.name = format!("{LINTER_PREFIX}{}", self.linter);
        }
        Ok(lint)
    }

    async fn run(&self, request: &LinterRequest) -> Result<LinterResponse> {
        tracing::debug!(
            program = %self.program.display(),
            dir = %request.spec_directory,
            "running linter"
        );
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request.encode_to_vec())
                .await
                .with_context(|| format!("failed to write request to {}", self.program.display()))?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "{} failed ({}): {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        LinterResponse::decode(output.stdout.as_slice())
            .with_context(|| format!("invalid response from {}", self.program.display()))
    }
}

/// Unzips zipped specs; writes anything else under its filename.
fn write_spec_files(
    dir: &Path,
    spec_name: &str,
    filename: &str,
    contents: &SpecContents,
) -> Result<()> {
    if mime::is_zip(&contents.mime_type) {
        let mut archive = zip::ZipArchive::new(Cursor::new(contents.data.as_slice()))
            .with_context(|| format!("{spec_name} is not a zip archive"))?;
        archive
            .extract(dir)
            .with_context(|| format!("failed to unzip {spec_name}"))?;
        return Ok(());
    }
    if filename.is_empty() {
        bail!("{spec_name} has no filename");
    }
    let file_name = Path::new(filename)
        .file_name()
        .with_context(|| format!("{spec_name} has an invalid filename {filename:?}"))?;
    std::fs::write(dir.join(file_name), &contents.data)
        .with_context(|| format!("failed to write {filename}"))?;
    Ok(())
}
