// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

// Adjacency construction for the playable network.
//
// Edges are added from the point of view of the station being visited. Interior
// stations end up symmetric because both ends get visited; line ends and branch
// junctions can stay one-directional, and that shape is kept as-is.

use super::BuildError;
use crate::feed::LineRecord;
use ahash::AHashSet;
use std::collections::{BTreeMap, BTreeSet};

pub type Neighbours = BTreeSet<String>;
pub type Graph = BTreeMap<String, Neighbours>;

/// For a branch station id such as `"BL04A"` returns the base id `"BL04"`.
///
/// A branch id ends in a letter that follows a digit; plain ids like `"BL04"`
/// or `"Y"` have no base.
pub fn branch_base_id(id: &str) -> Option<&str> {
    let mut chars = id.chars().rev();
    let last = chars.next()?;
    let before = chars.next()?;

    if last.is_ascii_alphabetic() && before.is_ascii_digit() {
        Some(&id[..id.len() - last.len_utf8()])
    } else {
        None
    }
}

pub fn validate_line(line: &LineRecord) -> Result<(), BuildError> {
    if line.stations.is_empty() {
        return Err(BuildError::EmptyLine {
            line: line.line_id.clone(),
        });
    }

    for (index, station) in line.stations.iter().enumerate() {
        if station.station_id.trim().is_empty() || station.station_name.zh_tw.trim().is_empty() {
            return Err(BuildError::MalformedStation {
                line: line.line_id.clone(),
                index,
            });
        }
    }

    Ok(())
}

pub fn link_line(
    graph: &mut Graph,
    line: &LineRecord,
    deleted: &AHashSet<String>,
) -> Result<(), BuildError> {
    let stations = &line.stations;

    for (index, station) in stations.iter().enumerate() {
        let current = &station.station_name.zh_tw;
        graph.entry(current.clone()).or_default();

        if let Some(base_id) = branch_base_id(&station.station_id) {
            let base = stations
                .iter()
                .find(|candidate| candidate.station_id == base_id)
                .ok_or_else(|| BuildError::MissingBranchBase {
                    line: line.line_id.clone(),
                    station_id: station.station_id.clone(),
                })?;
            let base_name = &base.station_name.zh_tw;

            // only the base is checked against the deletion list here
            if !deleted.contains(base_name) {
                graph
                    .entry(current.clone())
                    .or_default()
                    .insert(base_name.clone());
                graph
                    .entry(base_name.clone())
                    .or_default()
                    .insert(current.clone());
            }
        } else {
            if index != 0 {
                let previous = &stations[index - 1].station_name.zh_tw;
                if !deleted.contains(previous) {
                    graph
                        .entry(current.clone())
                        .or_default()
                        .insert(previous.clone());
                }
            }

            if index != stations.len() - 1 {
                let next = &stations[index + 1].station_name.zh_tw;
                if !deleted.contains(next) {
                    graph
                        .entry(current.clone())
                        .or_default()
                        .insert(next.clone());
                }
            }
        }
    }

    Ok(())
}

/// Drops deleted stations as keys and as neighbours.
pub fn prune(graph: &mut Graph, deleted: &AHashSet<String>) {
    for name in deleted {
        graph.remove(name);
    }

    for neighbours in graph.values_mut() {
        neighbours.retain(|name| !deleted.contains(name));
    }
}
