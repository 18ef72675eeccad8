use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MagrefError, Result};
use crate::genome_files::{
    create_dir, find_file_with_suffixes, list_file_names, place_file, DiscoveredInput, PlaceOutcome,
};
use crate::genome_metadata::{read_gtdbtk_summaries, Domain, GtdbtkClassification};
use crate::identifiers::{strip_genome_suffix, IdentifierMap};
use crate::pipeline_config::PipelineConfig;

/// Number of missing genomes named in the error message.
const MAX_MISSING_REPORTED: usize = 10;

pub struct DomainSplitInputs {
    /// GTDB-Tk summaries, e.g. `gtdbtk.bac120.summary.tsv` and
    /// `gtdbtk.ar53.summary.tsv`. Absent ones are skipped.
    pub summaries: Vec<PathBuf>,
    pub id_map: PathBuf,
    /// Directory of reformatted genome files.
    pub genome_directory: PathBuf,
    /// Where per-domain genome directories are created.
    pub output_directory: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DomainSplitSummary {
    pub num_bacteria: usize,
    pub num_archaea: usize,
    pub num_unclassified: usize,
    pub num_placed: usize,
    pub num_already_present: usize,
}

pub fn domain_directory(output_directory: &Path, domain: Domain) -> PathBuf {
    output_directory.join(domain.file_stem())
}

fn write_lines<I: IntoIterator<Item = S>, S: AsRef<str>>(path: &Path, lines: I) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|e| MagrefError::io(path, e))?);
    for line in lines {
        writeln!(file, "{}", line.as_ref()).map_err(|e| MagrefError::io(path, e))?;
    }
    file.flush().map_err(|e| MagrefError::io(path, e))
}

fn write_domain_map(path: &Path, classifications: &[&GtdbtkClassification]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| MagrefError::csv(path, e))?;
    wtr.write_record(&["user_genome", "domain"])
        .map_err(|e| MagrefError::csv(path, e))?;
    for c in classifications {
        let domain = c.domain.to_string();
        wtr.write_record(&[c.user_genome.as_str(), domain.as_str()])
            .map_err(|e| MagrefError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| MagrefError::io(path, e))
}

/// Split reformatted genomes into per-domain directories according to
/// GTDB-Tk, writing `domain_map.tsv`, `bacteria.txt` and `archaea.txt` to
/// the genome directory.
///
/// Genomes GTDB-Tk left unclassified are dropped. A classified genome whose
/// file is neither in the genome directory nor already in its domain
/// directory is an error. Re-running after a successful run is a no-op.
pub fn split_genomes_by_domain(inputs: &DomainSplitInputs, config: &PipelineConfig) -> Result<DomainSplitSummary> {
    let summaries: Vec<PathBuf> = inputs
        .summaries
        .iter()
        .filter_map(|p| match DiscoveredInput::of_path(p) {
            DiscoveredInput::Found(p) => Some(p),
            DiscoveredInput::NotFound { .. } => {
                warn!("GTDB-Tk summary {} not found, skipping", p.display());
                None
            }
        })
        .collect();
    if summaries.is_empty() {
        return Err(MagrefError::MissingInput {
            path: inputs.summaries.first().cloned().unwrap_or_default(),
        });
    }
    let id_map = IdentifierMap::from_path(&inputs.id_map, &config.genome_suffixes)?;
    let summary_paths: Vec<&Path> = summaries.iter().map(|p| p.as_path()).collect();
    let classifications = read_gtdbtk_summaries(&summary_paths)?;

    let mut summary = DomainSplitSummary::default();
    let classified: Vec<&GtdbtkClassification> = classifications
        .iter()
        .filter(|c| c.domain != Domain::Unknown)
        .collect();
    summary.num_unclassified = classifications.len() - classified.len();
    if summary.num_unclassified > 0 {
        warn!(
            "Dropping {} genome(s) without a Bacteria/Archaea classification",
            summary.num_unclassified
        );
    }

    write_domain_map(&inputs.genome_directory.join("domain_map.tsv"), &classified)?;
    for domain in &[Domain::Bacteria, Domain::Archaea] {
        write_lines(
            &inputs.genome_directory.join(format!("{}.txt", domain.file_stem())),
            classified
                .iter()
                .filter(|c| c.domain == *domain)
                .map(|c| c.user_genome.as_str()),
        )?;
    }

    let mut missing = vec![];
    for c in &classified {
        let base = id_map.resolve(&c.user_genome);
        let destination_dir = domain_directory(&inputs.output_directory, c.domain);
        let source = match find_file_with_suffixes(&inputs.genome_directory, base, &config.genome_suffixes) {
            DiscoveredInput::Found(p) => p,
            DiscoveredInput::NotFound { .. } => {
                if find_file_with_suffixes(&destination_dir, base, &config.genome_suffixes)
                    .path()
                    .is_some()
                {
                    summary.num_already_present += 1;
                } else {
                    missing.push(format!("{} (as {})", c.user_genome, base));
                }
                continue;
            }
        };
        let file_name = source.file_name().map(PathBuf::from).unwrap_or_default();
        match place_file(&source, &destination_dir.join(file_name), config.place_mode)? {
            PlaceOutcome::AlreadyPresent => summary.num_already_present += 1,
            _ => summary.num_placed += 1,
        }
    }
    info!(
        "Placed {} genome files into per-domain directories, {} were already there",
        summary.num_placed, summary.num_already_present
    );
    if !missing.is_empty() {
        let shown: Vec<&str> = missing.iter().take(MAX_MISSING_REPORTED).map(|s| s.as_str()).collect();
        return Err(MagrefError::InvalidArgument(format!(
            "{} classified genome(s) have no file in {}, e.g. {}",
            missing.len(),
            inputs.genome_directory.display(),
            shown.join(", ")
        )));
    }

    // Rewrite the lists from what is actually on disk, in reformatted IDs.
    for domain in &[Domain::Bacteria, Domain::Archaea] {
        let dir = domain_directory(&inputs.output_directory, *domain);
        create_dir(&dir)?;
        let ids: BTreeSet<String> = list_file_names(&dir)?
            .iter()
            .map(|name| strip_genome_suffix(name, &config.genome_suffixes))
            .collect();
        match domain {
            Domain::Bacteria => summary.num_bacteria = ids.len(),
            _ => summary.num_archaea = ids.len(),
        }
        write_lines(
            &inputs.genome_directory.join(format!("{}.txt", domain.file_stem())),
            &ids,
        )?;
    }
    info!(
        "{} bacterial and {} archaeal genomes ready for rRNA prediction",
        summary.num_bacteria, summary.num_archaea
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome_files::PlaceMode;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup(td: &Path) -> DomainSplitInputs {
        let genomes = td.join("formatted");
        std::fs::create_dir_all(&genomes).unwrap();
        for id in &["MAG0001", "MAG0002", "MAG0003"] {
            std::fs::write(genomes.join(format!("{}.fa", id)), ">c\nACGT\n").unwrap();
        }
        DomainSplitInputs {
            summaries: vec![
                PathBuf::from("tests/data/gtdbtk/gtdbtk.bac120.summary.tsv"),
                PathBuf::from("tests/data/gtdbtk/gtdbtk.ar53.summary.tsv"),
                PathBuf::from("tests/data/gtdbtk/gtdbtk.missing.summary.tsv"),
            ],
            id_map: PathBuf::from("tests/data/id_map/id_map.tsv"),
            output_directory: genomes.join("genomes_to_search_barrnap"),
            genome_directory: genomes,
        }
    }

    #[test]
    fn test_split_genomes_by_domain() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let inputs = setup(td.path());
        let mut config = PipelineConfig::default();
        config.place_mode = PlaceMode::Move;

        let summary = split_genomes_by_domain(&inputs, &config).unwrap();
        assert_eq!(2, summary.num_bacteria);
        assert_eq!(1, summary.num_archaea);
        assert_eq!(1, summary.num_unclassified);
        assert_eq!(3, summary.num_placed);

        assert!(inputs.output_directory.join("bacteria/MAG0001.fa").exists());
        assert!(inputs.output_directory.join("archaea/MAG0003.fa").exists());
        assert!(!inputs.genome_directory.join("MAG0001.fa").exists());
        assert_eq!(
            "MAG0001\nMAG0002\n",
            std::fs::read_to_string(inputs.genome_directory.join("bacteria.txt")).unwrap()
        );
        assert_eq!(
            "user_genome\tdomain\nS1_bin.1\tBacteria\nS1_bin.2\tBacteria\nS2_bin.1\tArchaea\n",
            std::fs::read_to_string(inputs.genome_directory.join("domain_map.tsv")).unwrap()
        );

        // Files already moved are recognised on a second run
        let again = split_genomes_by_domain(&inputs, &config).unwrap();
        assert_eq!(0, again.num_placed);
        assert_eq!(3, again.num_already_present);
        assert_eq!(
            "MAG0003\n",
            std::fs::read_to_string(inputs.genome_directory.join("archaea.txt")).unwrap()
        );
    }

    #[test]
    fn test_missing_genome_is_fatal() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let inputs = setup(td.path());
        std::fs::remove_file(inputs.genome_directory.join("MAG0002.fa")).unwrap();
        let result = split_genomes_by_domain(&inputs, &PipelineConfig::default());
        match result {
            Err(MagrefError::InvalidArgument(msg)) => assert!(msg.contains("S1_bin.2 (as MAG0002)")),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_no_summaries() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let mut inputs = setup(td.path());
        inputs.summaries = vec![td.path().join("none.tsv")];
        assert!(matches!(
            split_genomes_by_domain(&inputs, &PipelineConfig::default()),
            Err(MagrefError::MissingInput { .. })
        ));
    }
}
