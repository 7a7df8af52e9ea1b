//! Multi-scan calibration sessions and their persisted record.
//!
//! A session holds a "center" scan plus optional "up" and "down" scans of
//! the same scene. Each side scan is registered onto the center scan and
//! the resulting transform is stored under a fixed key.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use scanreg_core::{PointCloud, Real, RegistrationError, RigidTransform};
use serde::{Deserialize, Serialize};

use crate::{FeaturedCloud, PipelineError, PrecomputedFeatures};

/// Side scan registered onto the center scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Up,
    Down,
}

impl ScanSource {
    pub const ALL: [ScanSource; 2] = [ScanSource::Up, ScanSource::Down];

    pub fn name(self) -> &'static str {
        match self {
            ScanSource::Up => "up",
            ScanSource::Down => "down",
        }
    }

    /// Key of this source's transform in a [`CalibrationRecord`].
    pub fn record_key(self) -> &'static str {
        match self {
            ScanSource::Up => "up_to_mid",
            ScanSource::Down => "down_to_mid",
        }
    }
}

/// Clouds captured in one scan session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub scan_id: String,
    pub center: PointCloud,
    #[serde(default)]
    pub up: Option<PointCloud>,
    #[serde(default)]
    pub down: Option<PointCloud>,
}

impl ScanSession {
    pub fn side(&self, source: ScanSource) -> Option<&PointCloud> {
        match source {
            ScanSource::Up => self.up.as_ref(),
            ScanSource::Down => self.down.as_ref(),
        }
    }
}

/// A session whose clouds carry precomputed features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedSession {
    pub scan_id: String,
    pub center: FeaturedCloud,
    #[serde(default)]
    pub up: Option<FeaturedCloud>,
    #[serde(default)]
    pub down: Option<FeaturedCloud>,
}

impl FeaturedSession {
    /// Separate the clouds from a provider serving their features.
    pub fn into_parts(self) -> (ScanSession, PrecomputedFeatures) {
        let session = ScanSession {
            scan_id: self.scan_id,
            center: self.center.cloud.clone(),
            up: self.up.as_ref().map(|c| c.cloud.clone()),
            down: self.down.as_ref().map(|c| c.cloud.clone()),
        };
        let provider = std::iter::once(self.center)
            .chain(self.up)
            .chain(self.down)
            .collect();
        (session, provider)
    }
}

/// Per-session transforms, each a row-major 4×4 matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub scan_id: String,
    pub transforms: BTreeMap<String, [Real; 16]>,
}

impl CalibrationRecord {
    pub fn new(scan_id: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            transforms: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, source: ScanSource, transform: &RigidTransform) {
        self.transforms
            .insert(source.record_key().to_string(), transform.to_row_major());
    }

    /// Stored transform for `source`, validated as a rigid motion.
    pub fn get(&self, source: ScanSource) -> Result<Option<RigidTransform>, RegistrationError> {
        self.transforms
            .get(source.record_key())
            .map(RigidTransform::from_row_major)
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        fs::write(path, self.to_json()?).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let json = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
