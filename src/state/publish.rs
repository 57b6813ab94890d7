// Latest-state publisher
// Overwrites a small JSON file with the most recent detection result

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::PersistResult;
use crate::events::types::DetectionResult;

pub struct LatestStatePublisher {
    path: PathBuf,
}

impl LatestStatePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LatestStatePublisher { path: path.into() }
    }

    /// Replace the published state with `result`
    /// Written to a sibling temp file first, then renamed over the target
    pub fn publish(&self, result: &DetectionResult) -> PersistResult<()> {
        let data = serde_json::to_vec(result)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Read back the last published state
    pub fn read(&self) -> PersistResult<DetectionResult> {
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
