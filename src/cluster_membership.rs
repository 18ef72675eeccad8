use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use crate::error::{MagrefError, Result};

/// A clustering tool's cluster: its representative (centroid) and the other
/// sequences assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub representative: String,
    /// Members other than the representative, in file order, without
    /// duplicates.
    pub members: Vec<String>,
}

impl Cluster {
    pub fn new(representative: &str) -> Cluster {
        Cluster {
            representative: representative.to_string(),
            members: vec![],
        }
    }

    pub fn add_member(&mut self, member: &str) {
        if member != self.representative && !self.members.iter().any(|m| m == member) {
            self.members.push(member.to_string());
        }
    }

    /// The representative followed by the members, i.e. everything that may
    /// be chosen to stand for the cluster.
    pub fn candidates(&self) -> Vec<String> {
        let mut candidates = Vec::with_capacity(self.members.len() + 1);
        candidates.push(self.representative.clone());
        candidates.extend(self.members.iter().cloned());
        candidates
    }
}

/// Clusters keyed by representative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterMembership {
    pub clusters: BTreeMap<String, Cluster>,
}

impl ClusterMembership {
    fn register(&mut self, representative: &str) -> &mut Cluster {
        self.clusters
            .entry(representative.to_string())
            .or_insert_with(|| Cluster::new(representative))
    }

    pub fn get(&self, representative: &str) -> Option<&Cluster> {
        self.clusters.get(representative)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }
}

// Field positions in vsearch/usearch .uc records.
const UC_QUERY_FIELD: usize = 8;
const UC_TARGET_FIELD: usize = 9;

/// Parse cluster membership lines, keeping clusters whose representative is
/// in `known_ids`.
///
/// vsearch `.uc` records are recognised by their first field: `S`/`C`
/// declare a centroid, `H` assigns a query to a target centroid and `N`
/// records are ignored. Any other line is read as a generic table whose last
/// two fields are the representative and member, with `*` as an empty
/// member. Lines that don't fit are skipped. Afterwards each known ID not
/// yet a representative is added as a singleton, so every known ID has a
/// cluster.
pub fn parse_cluster_lines<R: BufRead>(reader: R, known_ids: &HashSet<String>) -> std::io::Result<ClusterMembership> {
    let mut membership = ClusterMembership::default();
    let mut num_skipped = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let well_formed = match fields[0] {
            "S" | "C" => match fields.get(UC_QUERY_FIELD) {
                Some(centroid) => {
                    if known_ids.contains(*centroid) {
                        membership.register(centroid);
                    }
                    true
                }
                None => false,
            },
            "H" => match (fields.get(UC_QUERY_FIELD), fields.get(UC_TARGET_FIELD)) {
                (Some(query), Some(target)) => {
                    if known_ids.contains(*target) {
                        membership.register(target).add_member(query);
                    }
                    true
                }
                _ => false,
            },
            "N" => true,
            _ => {
                let generic: Vec<&str> = line.split_whitespace().collect();
                if generic.len() >= 2 && generic[generic.len() - 1] != "*" {
                    let representative = generic[generic.len() - 2];
                    let member = generic[generic.len() - 1];
                    if known_ids.contains(representative) {
                        membership.register(representative).add_member(member);
                    }
                    true
                } else {
                    false
                }
            }
        };
        if !well_formed {
            trace!("Skipping cluster line {:?}", line);
            num_skipped += 1;
        }
    }
    if num_skipped > 0 {
        debug!("Skipped {} malformed cluster membership line(s)", num_skipped);
    }

    let mut num_singletons = 0usize;
    for id in known_ids {
        if !membership.clusters.contains_key(id) {
            membership.register(id);
            num_singletons += 1;
        }
    }
    debug!(
        "Added {} known sequence(s) without a cluster record as singletons",
        num_singletons
    );
    Ok(membership)
}

/// Read a cluster membership file (vsearch `.uc` or two column table).
pub fn read_cluster_file(path: &Path, known_ids: &HashSet<String>) -> Result<ClusterMembership> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MagrefError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => MagrefError::io(path, e),
    })?;
    let membership = parse_cluster_lines(std::io::BufReader::new(file), known_ids)
        .map_err(|e| MagrefError::io(path, e))?;
    info!(
        "Read {} clusters from {} for {} known sequences",
        membership.len(),
        path.display(),
        known_ids.len()
    );
    Ok(membership)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_uc_centroid_and_hit() {
        init();
        let uc = "S\t0\t1500\t*\t*\t*\t*\t*\tG1\t*\n\
                  H\t0\t1498\t99.9\t+\t0\t0\t1498M\tG2\tG1\n";
        let membership = parse_cluster_lines(uc.as_bytes(), &known(&["G1"])).unwrap();
        assert_eq!(1, membership.len());
        assert_eq!(vec!["G2".to_string()], membership.get("G1").unwrap().members);
    }

    #[test]
    fn test_every_known_id_has_a_cluster() {
        init();
        let uc = "# vsearch output\n\
                  \n\
                  S\t0\t1500\t*\t*\t*\t*\t*\tG1\t*\n\
                  H\t0\t1498\t99.9\t+\t0\t0\t1498M\tG2\tG1\n\
                  H\t0\t1498\t99.9\t+\t0\t0\t1498M\tG3\tG9\n\
                  C\t0\t2\t*\t*\t*\t*\t*\tG1\t*\n";
        let ids = known(&["G1", "G4", "G5"]);
        let membership = parse_cluster_lines(uc.as_bytes(), &ids).unwrap();
        for id in &ids {
            assert!(membership.get(id).is_some(), "{} has no cluster", id);
        }
        // G9 is not known, so its hit is dropped
        assert!(membership.get("G9").is_none());
        assert_eq!(3, membership.len());
        assert!(membership.get("G4").unwrap().members.is_empty());
    }

    #[test]
    fn test_members_deduplicated_representative_first() {
        init();
        let uc = "H\t0\t1\t1\t+\t0\t0\t=\tG2\tG1\n\
                  H\t0\t1\t1\t+\t0\t0\t=\tG2\tG1\n\
                  H\t0\t1\t1\t+\t0\t0\t=\tG1\tG1\n\
                  H\t0\t1\t1\t+\t0\t0\t=\tG3\tG1\n";
        let membership = parse_cluster_lines(uc.as_bytes(), &known(&["G1"])).unwrap();
        assert_eq!(
            vec!["G1".to_string(), "G2".to_string(), "G3".to_string()],
            membership.get("G1").unwrap().candidates()
        );
    }

    #[test]
    fn test_generic_two_column_fallback() {
        init();
        let table = "cluster1 G1 G1\n\
                     cluster1 G1 G2\n\
                     G1\t*\n\
                     G7 G8\n\
                     lonely\n";
        let membership = parse_cluster_lines(table.as_bytes(), &known(&["G1", "G3"])).unwrap();
        assert_eq!(vec!["G2".to_string()], membership.get("G1").unwrap().members);
        assert!(membership.get("G3").unwrap().members.is_empty());
        assert!(membership.get("G7").is_none());
    }

    #[test]
    fn test_short_uc_records_skipped() {
        init();
        let uc = "S\t0\t1500\n\
                  H\t0\t1498\t99.9\t+\t0\t0\t1498M\tG2\n\
                  N\t*\t1450\t*\t*\t*\t*\t*\tG7\t*\n";
        let membership = parse_cluster_lines(uc.as_bytes(), &known(&["G2", "G7"])).unwrap();
        assert_eq!(2, membership.len());
        assert!(membership.iter().all(|c| c.members.is_empty()));
    }

    #[test]
    fn test_read_cluster_file() {
        init();
        let membership = read_cluster_file(
            Path::new("tests/data/choose_best/archaea_16S_clusters.uc"),
            &known(&["G1", "G4", "G5"]),
        )
        .unwrap();
        assert_eq!(3, membership.len());
        assert_eq!(
            vec!["G1".to_string(), "G2".to_string(), "G3".to_string()],
            membership.get("G1").unwrap().candidates()
        );
        assert!(matches!(
            read_cluster_file(Path::new("tests/data/choose_best/missing.uc"), &known(&[])),
            Err(MagrefError::MissingInput { .. })
        ));
    }
}
