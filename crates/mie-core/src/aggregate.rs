//! Combine per-item results into the requested output shape.
//!
//! Records are keyed by their diameter and wavelength values, so the order in
//! which the engine returns them does not matter.

use crate::constants::MIN_EFFECTIVE_DIAMETERS;
use crate::distribution::DiameterWeights;
use crate::engine::ResultRecord;
use crate::error::{MieError, Result};
use crate::scenario::distinct_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One output particle per grid diameter, unweighted.
    Raw,
    /// A single size-distribution-weighted representative particle.
    Effective,
}

impl OutputMode {
    pub fn from_effective_flag(effective_model: bool) -> Self {
        if effective_model {
            OutputMode::Effective
        } else {
            OutputMode::Raw
        }
    }
}

/// All records for one diameter, ascending by wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct DiameterGroup {
    pub diameter: f64,
    pub records: Vec<ResultRecord>,
}

/// Weighted sum across diameters at a single wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRecord {
    pub wavelength: f64,
    /// Σ wᵢ dᵢ
    pub diameter: f64,
    /// Σ wᵢ σᵢ
    pub cross_section: f64,
    /// Element-wise Σ wᵢ · inverse_cdfᵢ
    pub inverse_cdf: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    Raw(Vec<DiameterGroup>),
    /// Ascending by wavelength.
    Effective(Vec<EffectiveRecord>),
}

fn sort_by_grid(records: &mut [ResultRecord]) {
    records.sort_by(|a, b| {
        a.diameter
            .total_cmp(&b.diameter)
            .then(a.wavelength.total_cmp(&b.wavelength))
    });
}

/// Shape `records` per `mode`.
///
/// Effective mode requires `weights` and at least
/// [`MIN_EFFECTIVE_DIAMETERS`] distinct diameters.
pub fn aggregate(
    mut records: Vec<ResultRecord>,
    mode: OutputMode,
    weights: Option<&DiameterWeights>,
) -> Result<Aggregated> {
    sort_by_grid(&mut records);
    match mode {
        OutputMode::Raw => Ok(Aggregated::Raw(group_by_diameter(records))),
        OutputMode::Effective => {
            let weights = weights
                .ok_or_else(|| MieError::config("effective model requires diameter weights"))?;
            effective(records, weights).map(Aggregated::Effective)
        }
    }
}

fn group_by_diameter(records: Vec<ResultRecord>) -> Vec<DiameterGroup> {
    let mut groups: Vec<DiameterGroup> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(g) if g.diameter == record.diameter => g.records.push(record),
            _ => groups.push(DiameterGroup {
                diameter: record.diameter,
                records: vec![record],
            }),
        }
    }
    groups
}

fn effective(mut records: Vec<ResultRecord>, weights: &DiameterWeights) -> Result<Vec<EffectiveRecord>> {
    let diameters: Vec<f64> = records.iter().map(|r| r.diameter).collect();
    let distinct = distinct_count(&diameters);
    if distinct < MIN_EFFECTIVE_DIAMETERS {
        return Err(MieError::config(format!(
            "effective model needs at least {MIN_EFFECTIVE_DIAMETERS} distinct diameters, got {distinct}"
        )));
    }

    records.sort_by(|a, b| {
        a.wavelength
            .total_cmp(&b.wavelength)
            .then(a.diameter.total_cmp(&b.diameter))
    });

    let mut out: Vec<EffectiveRecord> = Vec::new();
    for chunk in records.chunk_by(|a, b| a.wavelength == b.wavelength) {
        let wavelength = chunk[0].wavelength;
        if chunk.len() != distinct {
            return Err(MieError::config(format!(
                "wavelength {wavelength} has {} diameters, expected {distinct}",
                chunk.len()
            )));
        }

        let width = chunk[0].inverse_cdf.len();
        let mut acc = EffectiveRecord {
            wavelength,
            diameter: 0.0,
            cross_section: 0.0,
            inverse_cdf: vec![0.0; width],
        };
        for r in chunk {
            let w = weights.get(r.diameter).ok_or_else(|| {
                MieError::config(format!("no weight for diameter {}", r.diameter))
            })?;
            if r.inverse_cdf.len() != width {
                return Err(MieError::config(format!(
                    "inverse CDF length {} differs from {width} at diameter {}",
                    r.inverse_cdf.len(),
                    r.diameter
                )));
            }
            acc.diameter += w * r.diameter;
            acc.cross_section += w * r.cross_section;
            for (a, v) in acc.inverse_cdf.iter_mut().zip(&r.inverse_cdf) {
                *a += w * v;
            }
        }
        out.push(acc);
    }
    Ok(out)
}
