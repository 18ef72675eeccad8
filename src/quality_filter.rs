use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MagrefError, Result};
use crate::genome_files::{
    create_dir, list_file_names, place_file, require_dir, DiscoveredInput, GenomeFileIndex, PlaceMode, PlaceOutcome,
};
use crate::genome_metadata::{read_checkm_table, read_gtdb_reference_metadata, Domain, MetadataTable};
use crate::identifiers::strip_genome_suffix;
use crate::pipeline_config::PipelineConfig;

/// Number of unplaced genomes named in the warning.
const MAX_UNPLACED_REPORTED: usize = 5;

pub struct QualityFilterInputs {
    pub checkm_table: PathBuf,
    pub output_directory: PathBuf,
    /// Candidate directories holding the genome files; the first existing
    /// one is used. Empty to skip placing genome files.
    pub genome_directories: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct QualityFilterSummary {
    pub num_parsed: usize,
    pub num_complete_records: usize,
    pub num_passed: usize,
    pub num_bacteria: usize,
    pub num_archaea: usize,
    pub num_defaulted_to_bacteria: usize,
    pub num_placed: usize,
    pub num_unplaced: usize,
}

fn write_id_list(path: &Path, ids: &BTreeSet<String>) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|e| MagrefError::io(path, e))?);
    for id in ids {
        writeln!(file, "{}", id).map_err(|e| MagrefError::io(path, e))?;
    }
    file.flush().map_err(|e| MagrefError::io(path, e))
}

/// Records with both numbers present, with undecided domains set to
/// Bacteria. Returns the table and the number of defaulted domains.
pub fn clean_quality_table(table: MetadataTable) -> (MetadataTable, usize) {
    let before = table.len();
    let complete = table.retain(|r| r.completeness.is_some() && r.contamination.is_some());
    if complete.len() < before {
        warn!(
            "Dropped {} genome(s) lacking a completeness or contamination value",
            before - complete.len()
        );
    }
    let num_unknown = complete
        .records()
        .iter()
        .filter(|r| r.domain == Domain::Unknown)
        .count();
    if num_unknown == 0 {
        return (complete, 0);
    }
    warn!(
        "No domain could be determined for {} genome(s), assuming Bacteria",
        num_unknown
    );
    let extra_columns = complete.extra_columns.clone();
    let records = complete
        .records()
        .iter()
        .cloned()
        .map(|mut r| {
            if r.domain == Domain::Unknown {
                r.domain = Domain::Bacteria;
            }
            r
        })
        .collect();
    (MetadataTable::from_records(records, extra_columns), num_unknown)
}

/// Filter CheckM results by the configured completeness and contamination
/// thresholds and split the passing genomes by domain.
///
/// Writes `checkm_clean_all.tsv`, `checkm_filtered.tsv`, `bacteria.txt` and
/// `archaea.txt` to the output directory and, when genome directories are
/// given, places the passing genome files under `bins/<domain>/`.
pub fn filter_by_quality(inputs: &QualityFilterInputs, config: &PipelineConfig) -> Result<QualityFilterSummary> {
    create_dir(&inputs.output_directory)?;
    let parsed = read_checkm_table(&inputs.checkm_table, config)?;
    let mut summary = QualityFilterSummary {
        num_parsed: parsed.len(),
        ..Default::default()
    };

    let (clean, num_defaulted) = clean_quality_table(parsed);
    summary.num_complete_records = clean.len();
    summary.num_defaulted_to_bacteria = num_defaulted;
    clean.write_tsv(&inputs.output_directory.join("checkm_clean_all.tsv"))?;

    let filtered = clean.retain(|r| match (r.completeness, r.contamination) {
        (Some(completeness), Some(contamination)) => config.passes_quality(completeness, contamination),
        _ => false,
    });
    summary.num_passed = filtered.len();
    filtered.write_tsv(&inputs.output_directory.join("checkm_filtered.tsv"))?;
    info!(
        "{} of {} genomes pass completeness >= {} and contamination <= {}",
        summary.num_passed, summary.num_complete_records, config.min_completeness, config.max_contamination
    );

    let ids_of = |domain: Domain| -> BTreeSet<String> {
        filtered
            .records()
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| config.output_id(&r.genome_id))
            .collect()
    };
    let bacteria = ids_of(Domain::Bacteria);
    let archaea = ids_of(Domain::Archaea);
    summary.num_bacteria = bacteria.len();
    summary.num_archaea = archaea.len();
    write_id_list(&inputs.output_directory.join("bacteria.txt"), &bacteria)?;
    write_id_list(&inputs.output_directory.join("archaea.txt"), &archaea)?;
    info!("Passing genomes: {} bacterial, {} archaeal", bacteria.len(), archaea.len());

    if !inputs.genome_directories.is_empty() {
        let genome_dir = DiscoveredInput::first_existing(&inputs.genome_directories).required()?;
        let index = GenomeFileIndex::build(&genome_dir)?;
        info!(
            "Indexed {} FASTA files under {}",
            index.num_fasta_files(),
            index.root().display()
        );
        let mut unplaced = vec![];
        for (domain, ids) in &[(Domain::Bacteria, &bacteria), (Domain::Archaea, &archaea)] {
            let dest = inputs.output_directory.join("bins").join(domain.file_stem());
            create_dir(&dest)?;
            for id in ids.iter() {
                match index.find_genome(id) {
                    DiscoveredInput::Found(src) => {
                        let file_name = src.file_name().map(PathBuf::from).unwrap_or_default();
                        match place_file(&src, &dest.join(file_name), config.place_mode)? {
                            PlaceOutcome::AlreadyPresent => {}
                            _ => summary.num_placed += 1,
                        }
                    }
                    DiscoveredInput::NotFound { .. } => unplaced.push(id.clone()),
                }
            }
        }
        summary.num_unplaced = unplaced.len();
        if !unplaced.is_empty() {
            warn!(
                "No genome file found for {} passing genome(s), e.g. {}",
                unplaced.len(),
                unplaced
                    .iter()
                    .take(MAX_UNPLACED_REPORTED)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        info!("Placed {} genome files under {}", summary.num_placed, inputs.output_directory.join("bins").display());
    }
    Ok(summary)
}

pub struct ReferenceFilterInputs {
    /// GTDB metadata tables, e.g. `bac120_metadata_r220.tsv`.
    pub metadata_tables: Vec<PathBuf>,
    /// Directories of `<accession>_genomic.fna.gz` files to prune.
    pub genome_directories: Vec<PathBuf>,
    /// Where failing genome files are moved.
    pub excluded_directory: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferenceFilterSummary {
    pub num_passing_accessions: usize,
    pub num_kept: usize,
    pub num_excluded: usize,
}

/// Accessions in GTDB metadata meeting the quality thresholds, without
/// their `RS_`/`GB_` prefix.
pub fn passing_reference_accessions(tables: &[PathBuf], config: &PipelineConfig) -> Result<HashSet<String>> {
    let mut passing = HashSet::new();
    for path in tables {
        let table = read_gtdb_reference_metadata(path, config)?;
        let before = passing.len();
        passing.extend(
            table
                .records()
                .iter()
                .filter(|r| match (r.completeness, r.contamination) {
                    (Some(completeness), Some(contamination)) => config.passes_quality(completeness, contamination),
                    _ => false,
                })
                .map(|r| r.genome_id.clone()),
        );
        debug!("{} of {} accessions in {} pass", passing.len() - before, table.len(), path.display());
    }
    Ok(passing)
}

/// Move GTDB reference genome files whose accession fails the quality
/// thresholds out of the genome directories.
pub fn filter_reference_genomes(inputs: &ReferenceFilterInputs, config: &PipelineConfig) -> Result<ReferenceFilterSummary> {
    let passing = passing_reference_accessions(&inputs.metadata_tables, config)?;
    info!("{} GTDB reference genomes pass the quality thresholds", passing.len());
    let mut summary = ReferenceFilterSummary {
        num_passing_accessions: passing.len(),
        ..Default::default()
    };
    create_dir(&inputs.excluded_directory)?;

    for dir in &inputs.genome_directories {
        require_dir(dir)?;
        for name in list_file_names(dir)? {
            if !name.ends_with("_genomic.fna.gz") {
                continue;
            }
            let accession = strip_genome_suffix(&name, &config.genome_suffixes);
            if passing.contains(&accession) {
                summary.num_kept += 1;
            } else {
                place_file(&dir.join(&name), &inputs.excluded_directory.join(&name), PlaceMode::Move)?;
                summary.num_excluded += 1;
            }
        }
    }
    info!(
        "Kept {} reference genome files, moved {} to {}",
        summary.num_kept,
        summary.num_excluded,
        inputs.excluded_directory.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome_metadata::GenomeRecord;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_clean_quality_table() {
        init();
        let mut archaeon = GenomeRecord::new("A", Some(95.), Some(1.));
        archaeon.domain = Domain::Archaea;
        let table = MetadataTable::from_records(
            vec![
                archaeon,
                GenomeRecord::new("B", Some(95.), None),
                GenomeRecord::new("C", Some(50.), Some(1.)),
            ],
            vec![],
        );
        let (clean, defaulted) = clean_quality_table(table);
        assert_eq!(1, defaulted);
        assert_eq!(2, clean.len());
        assert_eq!(Domain::Archaea, clean.get("A").unwrap().domain);
        assert_eq!(Domain::Bacteria, clean.get("C").unwrap().domain);
    }

    #[test]
    fn test_filter_by_quality() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let inputs = QualityFilterInputs {
            checkm_table: PathBuf::from("tests/data/checkm/checkm_results.txt"),
            output_directory: td.path().join("qc"),
            genome_directories: vec![
                td.path().join("not_here"),
                PathBuf::from("tests/data/checkm/genomes"),
            ],
        };
        let mut config = PipelineConfig::default();
        config.append_genomic_suffix = true;
        let summary = filter_by_quality(&inputs, &config).unwrap();
        assert_eq!(
            QualityFilterSummary {
                num_parsed: 4,
                num_complete_records: 4,
                num_passed: 2,
                num_bacteria: 1,
                num_archaea: 1,
                num_defaulted_to_bacteria: 0,
                num_placed: 2,
                num_unplaced: 0,
            },
            summary
        );
        let out = &inputs.output_directory;
        assert_eq!("bin.1_genomic\n", std::fs::read_to_string(out.join("bacteria.txt")).unwrap());
        assert_eq!("bin.2_genomic\n", std::fs::read_to_string(out.join("archaea.txt")).unwrap());
        assert!(std::fs::symlink_metadata(out.join("bins/bacteria/bin.1.fa")).is_ok());
        assert!(std::fs::symlink_metadata(out.join("bins/archaea/bin.2.fna")).is_ok());

        let filtered = read_checkm_table(&out.join("checkm_filtered.tsv"), &config).unwrap();
        assert_eq!(2, filtered.len());
        assert_eq!(Domain::Archaea, filtered.get("bin.2").unwrap().domain);

        // Nothing new to place the second time round
        let again = filter_by_quality(&inputs, &config).unwrap();
        assert_eq!(0, again.num_placed);
    }

    #[test]
    fn test_missing_genome_directory() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let inputs = QualityFilterInputs {
            checkm_table: PathBuf::from("tests/data/checkm/checkm_results.txt"),
            output_directory: td.path().join("qc"),
            genome_directories: vec![td.path().join("not_here")],
        };
        assert!(matches!(
            filter_by_quality(&inputs, &PipelineConfig::default()),
            Err(MagrefError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_filter_reference_genomes() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let bacteria = td.path().join("bacteria");
        std::fs::create_dir_all(&bacteria).unwrap();
        for name in &[
            "GCF_000005845.2_genomic.fna.gz",
            "GCA_000010001.1_genomic.fna.gz",
            "GCA_999999999.1_genomic.fna.gz",
            "README",
        ] {
            std::fs::write(bacteria.join(name), "x").unwrap();
        }
        let inputs = ReferenceFilterInputs {
            metadata_tables: vec![PathBuf::from("tests/data/gtdb_metadata/bac120_metadata_r220.tsv")],
            genome_directories: vec![bacteria.clone()],
            excluded_directory: td.path().join("gtdb_genomes"),
        };
        let summary = filter_reference_genomes(&inputs, &PipelineConfig::default()).unwrap();
        assert_eq!(1, summary.num_kept);
        assert_eq!(2, summary.num_excluded);
        assert!(bacteria.join("GCF_000005845.2_genomic.fna.gz").exists());
        assert!(bacteria.join("README").exists());
        assert!(inputs
            .excluded_directory
            .join("GCA_000010001.1_genomic.fna.gz")
            .exists());
    }
}
