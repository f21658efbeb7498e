//! On-disk artifact format.
//!
//! A file is the 8-byte magic [`MAGIC`] followed by the bincode encoding of an
//! [`Artifact`] tree. Files are written to a temporary name in the target
//! directory and renamed into place, so a reader never sees a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use mie_core::{Aggregated, Computed, ScenarioKey};

use crate::error::ArtifactError;

pub const MAGIC: &[u8; 8] = b"MIEART01";

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    /// Build from columns of equal length; column `c` becomes `data[r * cols + c]`.
    pub fn from_columns(columns: &[&[f64]]) -> Result<Self, ArtifactError> {
        let cols = columns.len();
        let rows = columns.first().map_or(0, |c| c.len());
        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(ArtifactError::InvalidFormat(format!(
                "column of length {} in a matrix of {rows} rows",
                bad.len()
            )));
        }
        let mut data = vec![0.0; rows * cols];
        for (c, column) in columns.iter().enumerate() {
            for (r, v) in column.iter().enumerate() {
                data[r * cols + c] = *v;
            }
        }
        Ok(Self { rows, cols, data })
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn column(&self, col: usize) -> Option<Vec<f64>> {
        (col < self.cols).then(|| (0..self.rows).map(|r| self.data[r * self.cols + col]).collect())
    }
}

/// One output particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleGroup {
    pub diameter: f64,
    /// Indexed by wavelength.
    pub cross_sections: Vec<f64>,
    /// Rows are random variates, columns are wavelengths.
    #[serde(rename = "inverseCDF")]
    pub inverse_cdf: Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub particle_diameter: Vec<f64>,
    pub wavelengths: Vec<f64>,
    pub particle_data: BTreeMap<String, ParticleGroup>,
    #[serde(rename = "particleID")]
    pub particle_id: Vec<u64>,
}

impl Artifact {
    pub fn from_computed(computed: &Computed) -> Result<Self, ArtifactError> {
        let wavelengths = computed.grid.wavelengths.clone();
        let mut particle_data = BTreeMap::new();

        let particle_diameter = match &computed.output {
            Aggregated::Raw(groups) => {
                for (id, group) in groups.iter().enumerate() {
                    let columns: Vec<&[f64]> =
                        group.records.iter().map(|r| r.inverse_cdf.as_slice()).collect();
                    particle_data.insert(
                        id.to_string(),
                        ParticleGroup {
                            diameter: group.diameter,
                            cross_sections: group.records.iter().map(|r| r.cross_section).collect(),
                            inverse_cdf: Matrix::from_columns(&columns)?,
                        },
                    );
                }
                computed.grid.diameters.clone()
            }
            Aggregated::Effective(records) => {
                if let Some(first) = records.first() {
                    let columns: Vec<&[f64]> =
                        records.iter().map(|r| r.inverse_cdf.as_slice()).collect();
                    particle_data.insert(
                        "0".to_string(),
                        ParticleGroup {
                            diameter: first.diameter,
                            cross_sections: records.iter().map(|r| r.cross_section).collect(),
                            inverse_cdf: Matrix::from_columns(&columns)?,
                        },
                    );
                }
                let d = &computed.grid.diameters;
                vec![d.iter().sum::<f64>() / d.len() as f64]
            }
        };

        let particle_id = (0..particle_data.len() as u64).collect();
        Ok(Self {
            particle_diameter,
            wavelengths,
            particle_data,
            particle_id,
        })
    }

    pub fn group(&self, id: u64) -> Option<&ParticleGroup> {
        self.particle_data.get(&id.to_string())
    }

    /// Write to `dir/file_name` atomically and return the final path.
    ///
    /// On any failure the temporary file is removed and nothing exists at the
    /// final path.
    pub fn write(&self, dir: &Path, file_name: &str) -> Result<PathBuf, ArtifactError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(MAGIC)?;
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&path).map_err(|e| e.error)?;

        tracing::debug!(path = %path.display(), groups = self.particle_data.len(), "artifact written");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path)?;
        let body = bytes.strip_prefix(MAGIC.as_slice()).ok_or_else(|| {
            ArtifactError::InvalidFormat(format!("{} is not a Mie artifact", path.display()))
        })?;
        let artifact: Artifact = bincode::deserialize(body)?;
        artifact.check()?;
        Ok(artifact)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.particle_id.len() != self.particle_data.len() {
            return Err(ArtifactError::InvalidFormat(format!(
                "{} particle ids for {} groups",
                self.particle_id.len(),
                self.particle_data.len()
            )));
        }
        for (id, group) in &self.particle_data {
            let m = &group.inverse_cdf;
            if m.data.len() != m.rows * m.cols || group.cross_sections.len() != m.cols {
                return Err(ArtifactError::InvalidFormat(format!(
                    "group {id} has inconsistent dimensions"
                )));
            }
        }
        Ok(())
    }
}

/// Descriptive, unique file name for an artifact of `key`.
pub fn file_name(key: &ScenarioKey) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "mie{}_p-{}-{}-{}_np-{:.2}{:+.2}j_nh-{:.2}_wave-{:.1}-{:.1}-{}_{}.mie",
        if key.effective_model { "_eff" } else { "" },
        key.diameters.min,
        key.diameters.max,
        key.diameters.n,
        key.n_particle_re,
        key.n_particle_im,
        key.n_host,
        key.wavelengths.min,
        key.wavelengths.max,
        key.wavelengths.n,
        &id[..8],
    )
}
