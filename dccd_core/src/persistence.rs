//! Calibration persistence seam.
//!
//! Stored results are read once at startup and written only after a
//! successful calibration.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::WrapErr;

use crate::calibration::CalibrationState;
use crate::error::{ActuatorError, Result};

pub trait CalibrationStore {
    fn load_calibration(&mut self) -> Result<Option<CalibrationState>>;
    fn store_calibration(&mut self, state: &CalibrationState) -> Result<()>;
}

/// Write via a synced `.tmp` sibling and a rename; creates missing parent
/// directories.
fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp, path)
}

/// TOML file store. A missing file means "nothing stored".
#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load_calibration(&mut self) -> Result<Option<CalibrationState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let persisted = dccd_config::load_persisted_calibration(&self.path)
            .map_err(|e| ActuatorError::Persistence(format!("{e:#}")))
            .wrap_err_with(|| format!("loading calibration from {}", self.path.display()))?;
        Ok(Some(CalibrationState::from(&persisted)))
    }

    fn store_calibration(&mut self, state: &CalibrationState) -> Result<()> {
        if state.calibration_failed {
            return Err(eyre::Report::new(ActuatorError::Persistence(
                "refusing to store a failed calibration".into(),
            )));
        }
        let persisted = dccd_config::PersistedCalibration::from(state);
        let text = toml::to_string_pretty(&persisted)
            .map_err(|e| ActuatorError::Persistence(e.to_string()))?;
        replace_file(&self.path, text.as_bytes())
            .map_err(|e| ActuatorError::Persistence(e.to_string()))
            .wrap_err_with(|| format!("writing calibration to {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "calibration stored");
        Ok(())
    }
}

/// In-memory store, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    pub stored: Option<CalibrationState>,
    pub writes: usize,
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load_calibration(&mut self) -> Result<Option<CalibrationState>> {
        Ok(self.stored)
    }

    fn store_calibration(&mut self, state: &CalibrationState) -> Result<()> {
        self.stored = Some(*state);
        self.writes += 1;
        Ok(())
    }
}
