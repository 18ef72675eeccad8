use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cluster_membership::read_cluster_file;
use crate::error::Result;
use crate::fasta::read_fasta;
use crate::genome_files::create_dir;
use crate::genome_metadata::{read_checkm_table, Domain, MetadataTable};
use crate::identifiers::{strip_genomic_tag, IdentifierMap};
use crate::pipeline_config::PipelineConfig;
use crate::representative_selection::{select_representatives, SelectionResult};
use crate::sequence_rewriter::{write_rewrite_outputs, RewriteOutputs};

pub struct ChooseBestInputs {
    /// vsearch `.uc` output or a two column cluster table.
    pub clusters: PathBuf,
    /// Aligned 16S centroid sequences.
    pub aligned_fasta: PathBuf,
    /// Quality table, typically the quality filter's `checkm_filtered.tsv`.
    pub metadata: PathBuf,
    pub id_map: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub domain: Domain,
}

impl ChooseBestInputs {
    pub fn outputs(&self) -> RewriteOutputs {
        let stem = self
            .aligned_fasta
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("centroids");
        let domain = self.domain.file_stem();
        RewriteOutputs {
            fasta: self.output_directory.join(format!("{}_best.fna", stem)),
            audit: self
                .output_directory
                .join(format!("{}_16S_clusters_processed.txt", domain)),
            metadata: self
                .output_directory
                .join(format!("{}_metadata_clusters_ssu_align_centroids.tsv", domain)),
        }
    }
}

/// Bring the quality table onto the naming used by the 16S sequences:
/// restrict to one domain, apply the ID map and drop `_genomic` tags.
pub fn harmonise_metadata(
    metadata: MetadataTable,
    domain: Domain,
    id_map: Option<&IdentifierMap>,
) -> MetadataTable {
    let metadata = if metadata.records().iter().any(|r| r.domain != Domain::Unknown) {
        let before = metadata.len();
        let restricted = metadata.retain(|r| r.domain == domain);
        info!(
            "Restricted metadata to {} genomes: {} of {} records kept",
            domain,
            restricted.len(),
            before
        );
        restricted
    } else {
        metadata
    };
    let metadata = match id_map {
        Some(map) => metadata.rename(|id| map.resolve(id).to_string()),
        None => metadata,
    };
    metadata.rename(|id| strip_genomic_tag(id).to_string())
}

/// Pick the best genome for each 16S cluster and relabel the aligned
/// centroids with it.
pub fn choose_best_genomes(inputs: &ChooseBestInputs, config: &PipelineConfig) -> Result<SelectionResult> {
    create_dir(&inputs.output_directory)?;

    let id_map = match &inputs.id_map {
        Some(path) => Some(IdentifierMap::from_path(path, &config.genome_suffixes)?),
        None => None,
    };
    let metadata = harmonise_metadata(
        read_checkm_table(&inputs.metadata, config)?,
        inputs.domain,
        id_map.as_ref(),
    );

    let mut records = read_fasta(&inputs.aligned_fasta)?;
    for record in records.iter_mut() {
        record.id = strip_genomic_tag(&record.id).to_string();
    }
    let known: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
    info!(
        "Read {} aligned sequences ({} distinct) from {}",
        records.len(),
        known.len(),
        inputs.aligned_fasta.display()
    );

    let membership = read_cluster_file(&inputs.clusters, &known)?;
    let selection = select_representatives(&metadata, &membership)?;
    write_rewrite_outputs(records, &selection, &metadata, &inputs.outputs())?;
    Ok(selection)
}

pub fn default_output_directory(aligned_fasta: &Path) -> PathBuf {
    aligned_fasta
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
