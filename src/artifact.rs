// 💾 Model Artifact - durable form of a published model
//
// JSON envelope { format_version, model }. Floats are written with full
// round-trip precision, so a reloaded model predicts exactly like the
// one that was saved.

use crate::classifier::ClassifierModel;
use crate::error::{CategorizerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    model: &'a ClassifierModel,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    model: serde_json::Value,
}

/// A fully written artifact waiting in a temp file next to its final path.
/// Dropping it without `commit` removes the temp file.
#[derive(Debug)]
pub struct StagedArtifact {
    tmp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the artifact into place
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.path)?;
        self.committed = true;
        debug!(path = %self.path.display(), "model artifact committed");
        Ok(())
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Write the model to a temp file in the target directory, synced to disk,
/// without touching `path` itself.
pub fn stage_model(model: &ClassifierModel, path: &Path) -> Result<StagedArtifact> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec(&EnvelopeRef {
        format_version: FORMAT_VERSION,
        model,
    })?;

    let staged = StagedArtifact {
        tmp_path: path.with_extension("tmp"),
        path: path.to_path_buf(),
        committed: false,
    };
    {
        let mut file = fs::File::create(&staged.tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    debug!(path = %path.display(), version = model.version(), "model artifact staged");
    Ok(staged)
}

/// Write the model atomically: a temp file in the same directory, then rename.
pub fn save_model(model: &ClassifierModel, path: &Path) -> Result<()> {
    stage_model(model, path)?.commit()
}

/// Load and verify a model artifact.
///
/// Parse failures and fingerprint mismatches are `CorruptArtifact`; an
/// envelope from a newer format is `UnsupportedArtifactVersion`.
pub fn load_model(path: &Path) -> Result<ClassifierModel> {
    let bytes = fs::read(path)?;

    let envelope: Envelope = serde_json::from_slice(&bytes)
        .map_err(|e| corrupt(path, format!("invalid envelope: {}", e)))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(CategorizerError::UnsupportedArtifactVersion {
            found: envelope.format_version,
            expected: FORMAT_VERSION,
        });
    }

    let model: ClassifierModel = serde_json::from_value(envelope.model)
        .map_err(|e| corrupt(path, format!("invalid model: {}", e)))?;

    if !model.verify_fingerprint()? {
        return Err(corrupt(path, "fingerprint mismatch".to_string()));
    }

    let width = model.vocabulary().len();
    if let Some(bad) = model.weights().iter().find(|w| w.coefficients.len() != width) {
        return Err(corrupt(
            path,
            format!(
                "category {} has {} coefficients, vocabulary has {}",
                bad.category,
                bad.coefficients.len(),
                width
            ),
        ));
    }

    Ok(model)
}

fn corrupt(path: &Path, reason: String) -> CategorizerError {
    CategorizerError::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    }
}
