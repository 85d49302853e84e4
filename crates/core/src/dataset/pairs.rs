//! Known-pairs derivation from the origins' assigned destination field.

use tracing::{debug, warn};

use super::types::{Dataset, OdPair, RecordId};

/// Pairs found in the origins plus counts of the origins that were skipped.
#[derive(Debug, Clone, Default)]
pub struct DerivedPairs {
    pub pairs: Vec<OdPair>,
    /// Origins whose assigned destination was null or missing.
    pub unassigned: usize,
    /// Origins whose assigned destination id is not in the destinations.
    pub unknown_destination: usize,
}

/// Resolves each origin's assigned destination into an [`OdPair`].
///
/// Origins without an assignment, or assigned to a destination that does not
/// exist, are skipped rather than failing the run.
pub fn derive_pairs(origins: &Dataset, destinations: &Dataset, field: &str) -> DerivedPairs {
    let mut derived = DerivedPairs::default();

    for (origin_idx, origin) in origins.records().iter().enumerate() {
        let Some(dest_id) = origin.payload.get(field).and_then(RecordId::from_value) else {
            derived.unassigned += 1;
            continue;
        };
        match destinations.position(&dest_id) {
            Some(dest_idx) => derived.pairs.push(OdPair::new(origin_idx, dest_idx)),
            None => {
                debug!(
                    "Origin {} is assigned to unknown destination {}",
                    origin.id, dest_id
                );
                derived.unknown_destination += 1;
            }
        }
    }

    if derived.unassigned > 0 {
        warn!(
            "{} origins have no assigned destination and will be skipped",
            derived.unassigned
        );
    }
    if derived.unknown_destination > 0 {
        warn!(
            "{} origins are assigned to destinations that do not exist and will be skipped",
            derived.unknown_destination
        );
    }

    derived
}
