//! Candidate-pose CSV files.
//!
//! One joint state per row, 7 values per object:
//! `x, y, z, qw, qx, qy, qz` (translation in metres, w-first quaternion).
//! Rows starting with `#` are comments. Objects are at rest.

use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::geometry::SE3;
use crate::state::JointState;

const VALUES_PER_OBJECT: usize = 7;

fn parse_pose(values: &[f64]) -> Result<SE3> {
    let quaternion = Quaternion::new(values[3], values[4], values[5], values[6]);
    if !(quaternion.norm() > 1e-9) {
        bail!("quaternion {:?} cannot be normalized", &values[3..7]);
    }
    Ok(SE3::new(
        UnitQuaternion::from_quaternion(quaternion),
        Vector3::new(values[0], values[1], values[2]),
    ))
}

/// Load candidate joint states. Every row must describe the same number of
/// objects.
pub fn load_candidate_states<P: AsRef<Path>>(csv_path: P) -> Result<Vec<JointState>> {
    let csv_path = csv_path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut states = Vec::new();
    let mut objects_per_row = None;
    for (row, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("Bad record {} in {}", row, csv_path.display()))?;
        let values = rec
            .iter()
            .map(|field| field.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Non-numeric value in row {}", row))?;

        if values.is_empty() || values.len() % VALUES_PER_OBJECT != 0 {
            bail!(
                "row {} has {} values, expected a positive multiple of {}",
                row,
                values.len(),
                VALUES_PER_OBJECT
            );
        }
        let objects = values.len() / VALUES_PER_OBJECT;
        match objects_per_row {
            None => objects_per_row = Some(objects),
            Some(expected) if expected != objects => {
                bail!("row {} has {} objects, previous rows have {}", row, objects, expected)
            }
            Some(_) => {}
        }

        let poses = values
            .chunks(VALUES_PER_OBJECT)
            .map(parse_pose)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid pose in row {}", row))?;
        states.push(JointState::from_poses(poses));
    }
    Ok(states)
}

/// Write the poses of `states` in the format read by
/// [`load_candidate_states`].
pub fn save_poses<P: AsRef<Path>>(csv_path: P, states: &[JointState]) -> Result<()> {
    let csv_path = csv_path.as_ref();
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;

    for state in states {
        let mut record = Vec::with_capacity(state.num_objects() * VALUES_PER_OBJECT);
        for object in state.iter() {
            let t = object.position();
            let q = object.orientation();
            record.extend([t.x, t.y, t.z, q.w, q.i, q.j, q.k].map(|v| v.to_string()));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
