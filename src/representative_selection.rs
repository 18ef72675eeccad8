use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::cluster_membership::ClusterMembership;
use crate::error::{MagrefError, Result};
use crate::genome_metadata::{GenomeRecord, MetadataTable};

/// The genome chosen for each cluster, keyed by the clustering tool's
/// representative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    pub best: BTreeMap<String, String>,
    /// Ordered, deduplicated candidates considered for each cluster.
    pub candidates: BTreeMap<String, Vec<String>>,
}

impl SelectionResult {
    /// Every representative chosen for itself.
    pub fn identity(membership: &ClusterMembership) -> SelectionResult {
        let mut result = SelectionResult::default();
        for cluster in membership.iter() {
            result
                .best
                .insert(cluster.representative.clone(), cluster.representative.clone());
            result
                .candidates
                .insert(cluster.representative.clone(), cluster.candidates());
        }
        result
    }

    pub fn best_for(&self, representative: &str) -> Option<&str> {
        self.best.get(representative).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Clusters where a member, rather than the representative, was chosen.
    pub fn num_reassigned(&self) -> usize {
        self.best.iter().filter(|(rep, best)| rep != best).count()
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Higher completeness first, then lower contamination. A missing
/// completeness ranks below any value, as does a missing contamination.
fn compare_quality(a: &GenomeRecord, b: &GenomeRecord) -> Ordering {
    let completeness = match (usable(a.completeness), usable(b.completeness)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    completeness.then_with(|| match (usable(a.contamination), usable(b.contamination)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Choose the genome that should represent a cluster.
///
/// Candidates with a metadata record are ranked by completeness then
/// contamination, remaining ties going to the earlier metadata row. When no
/// candidate has a record the lexicographically smallest candidate is
/// returned.
pub fn choose_best(metadata: &MetadataTable, candidates: &[String]) -> Result<String> {
    let mut present: Vec<(usize, &GenomeRecord)> = candidates
        .iter()
        .filter_map(|c| metadata.position(c).zip(metadata.get(c)))
        .collect();

    if present.is_empty() {
        let fallback = candidates.iter().min().ok_or_else(|| {
            MagrefError::InvalidArgument("Cannot choose a representative from no candidates".to_string())
        })?;
        debug!(
            "None of {:?} have quality metadata, choosing {} by name",
            candidates, fallback
        );
        return Ok(fallback.clone());
    }

    present.sort_by(|(pos_a, a), (pos_b, b)| compare_quality(a, b).then(pos_a.cmp(pos_b)));
    Ok(present[0].1.genome_id.clone())
}

/// Choose a representative genome for every cluster.
pub fn select_representatives(metadata: &MetadataTable, membership: &ClusterMembership) -> Result<SelectionResult> {
    let mut result = SelectionResult::default();
    for cluster in membership.iter() {
        let candidates = cluster.candidates();
        let best = choose_best(metadata, &candidates)?;
        trace!(
            "Cluster {} with candidates {:?}: chose {}",
            cluster.representative,
            candidates,
            best
        );
        result.best.insert(cluster.representative.clone(), best);
        result
            .candidates
            .insert(cluster.representative.clone(), candidates);
    }
    info!(
        "Chose representatives for {} clusters, {} of which changed from the clustering centroid",
        result.len(),
        result.num_reassigned()
    );
    Ok(result)
}
