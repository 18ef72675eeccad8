use std::path::{Path, PathBuf};

use crate::error::{MagrefError, Result};
use crate::fasta::{write_fasta, FastaRecord};
use crate::genome_metadata::MetadataTable;
use crate::representative_selection::SelectionResult;

/// Re-key each sequence to the genome chosen for its cluster. Sequences whose
/// ID is not a cluster representative keep their ID. Residues are not
/// touched; descriptions are dropped.
pub fn rewrite_sequences(records: Vec<FastaRecord>, selection: &SelectionResult) -> Vec<FastaRecord> {
    records
        .into_iter()
        .map(|mut record| {
            if let Some(best) = selection.best_for(&record.id) {
                record.id = best.to_string();
            }
            record.description = None;
            record
        })
        .collect()
}

/// One row per cluster: representative, chosen genome, and all candidates
/// comma separated.
pub fn write_audit_table(path: &Path, selection: &SelectionResult) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| MagrefError::csv(path, e))?;
    wtr.write_record(&["Centroid", "Best", "All genomes"])
        .map_err(|e| MagrefError::csv(path, e))?;
    for (representative, best) in &selection.best {
        let candidates = selection
            .candidates
            .get(representative)
            .map(|c| c.join(","))
            .unwrap_or_else(|| representative.clone());
        wtr.write_record(&[representative.as_str(), best.as_str(), candidates.as_str()])
            .map_err(|e| MagrefError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| MagrefError::io(path, e))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutputs {
    pub fasta: PathBuf,
    pub audit: PathBuf,
    pub metadata: PathBuf,
}

/// Write the relabelled sequences, the cluster audit table and the metadata
/// of the genomes that ended up in the relabelled sequences.
pub fn write_rewrite_outputs(
    records: Vec<FastaRecord>,
    selection: &SelectionResult,
    metadata: &MetadataTable,
    outputs: &RewriteOutputs,
) -> Result<()> {
    let rewritten = rewrite_sequences(records, selection);
    write_fasta(&outputs.fasta, &rewritten)?;
    info!("Wrote {}", outputs.fasta.display());

    write_audit_table(&outputs.audit, selection)?;
    info!("Wrote {}", outputs.audit.display());

    let final_ids: Vec<String> = rewritten.into_iter().map(|r| r.id).collect();
    metadata.write_reduced_tsv(&outputs.metadata, &final_ids)?;
    info!("Wrote {}", outputs.metadata.display());
    Ok(())
}
