use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SCRFD face detector filename inside the model directory.
pub const DETECTOR_MODEL: &str = "det_10g.onnx";
/// 468-point face-mesh landmark regressor filename inside the model directory.
pub const MESH_MODEL: &str = "face_landmark.onnx";

/// Model file descriptor: expected filename, where to obtain it, optional
/// pinned SHA-256, human-readable size.
pub struct ModelFile {
    pub name: &'static str,
    pub source: &'static str,
    /// `None` means the file is only checked for presence.
    pub sha256: Option<&'static str>,
    pub size_display: &'static str,
}

// Detector checksum from the HuggingFace Git LFS pointer file (oid sha256: field).
pub const MODELS: &[ModelFile] = &[
    ModelFile {
        name: DETECTOR_MODEL,
        source: "https://huggingface.co/public-data/insightface/resolve/main/models/buffalo_l/det_10g.onnx",
        sha256: Some("5838f7fe053675b1c7a08b633df49e7af5495cee0493c7dcf6697200b85b5b91"),
        size_display: "16 MB",
    },
    ModelFile {
        name: MESH_MODEL,
        source: "MediaPipe face landmark model (192x192 input, 468 points), converted to ONNX",
        sha256: None,
        size_display: "~2.5 MB",
    },
];

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {name} ({path})")]
    MissingModel { name: &'static str, path: PathBuf },

    #[error("failed to open model file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: &'static str,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// `$XDG_DATA_HOME/liveproof/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("liveproof")
        .join("models")
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that `path` exists and, when a digest is pinned, that it matches.
pub fn verify_file_sha256(
    name: &'static str,
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<(), ModelIntegrityError> {
    if !path.is_file() {
        return Err(ModelIntegrityError::MissingModel {
            name,
            path: path.to_path_buf(),
        });
    }

    let Some(expected) = expected_sha256 else {
        tracing::debug!(name, path = %path.display(), "model present (no pinned digest)");
        return Ok(());
    };

    let digest = sha256_file_hex(path)?;
    if !digest.eq_ignore_ascii_case(expected) {
        return Err(ModelIntegrityError::ChecksumMismatch {
            name,
            path: path.to_path_buf(),
            expected: expected.to_string(),
            got: digest,
        });
    }

    tracing::debug!(name, "model checksum verified");
    Ok(())
}

pub fn verify_models_dir(model_dir: &Path) -> Result<(), ModelIntegrityError> {
    for model in MODELS {
        let path = model_dir.join(model.name);
        verify_file_sha256(model.name, &path, model.sha256)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "liveproof-models-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn verify_file_sha256_rejects_missing() {
        let path = scratch_dir("missing").join("nope.onnx");

        let err = verify_file_sha256("nope.onnx", &path, Some("00")).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));

        let err = verify_file_sha256("nope.onnx", &path, None).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }

    #[test]
    fn verify_file_sha256_rejects_mismatch() {
        let dir = scratch_dir("mismatch");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        let err = verify_file_sha256("model.onnx", &path, Some("00")).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_file_sha256_accepts_match() {
        let dir = scratch_dir("match");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        let digest = sha256_file_hex(&path).unwrap();
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        verify_file_sha256("model.onnx", &path, Some(&digest)).unwrap();
        verify_file_sha256("model.onnx", &path, Some(&digest.to_uppercase())).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unpinned_model_only_needs_to_exist() {
        let dir = scratch_dir("unpinned");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mesh.onnx");
        fs::write(&path, b"anything").unwrap();

        verify_file_sha256("mesh.onnx", &path, None).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_is_not_a_model() {
        let dir = scratch_dir("is-dir");
        fs::create_dir_all(dir.join("det_10g.onnx")).unwrap();

        let err = verify_file_sha256("det_10g.onnx", &dir.join("det_10g.onnx"), None).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_models_dir_reports_missing() {
        let err = verify_models_dir(&scratch_dir("dir-missing")).unwrap_err();
        assert!(matches!(
            err,
            ModelIntegrityError::MissingModel { name: DETECTOR_MODEL, .. }
        ));
    }

    #[test]
    fn manifest_names_are_unique() {
        assert_eq!(MODELS.len(), 2);
        assert_ne!(MODELS[0].name, MODELS[1].name);
        assert!(MODELS.iter().any(|m| m.name == MESH_MODEL && m.sha256.is_none()));
    }
}
