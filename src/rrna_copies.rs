use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MagrefError, Result};
use crate::fasta::{read_fasta, write_fasta, FastaRecord};
use crate::genome_files::{create_dir, list_file_names, require_dir};
use crate::genome_metadata::{read_checkm_table, Domain};
use crate::identifiers::strip_genomic_tag;
use crate::pipeline_config::PipelineConfig;

pub const RRNA_FILE_SUFFIX: &str = "_rRNA.fna";

pub fn is_16s(record: &FastaRecord) -> bool {
    let header = record.header().to_lowercase();
    header.contains("16s") && header.contains("rrna")
}

pub fn genome_id_of_rrna_file(file_name: &str) -> String {
    let id = file_name.strip_suffix(RRNA_FILE_SUFFIX).unwrap_or(file_name);
    id.strip_suffix("_genomic.fna").unwrap_or(id).to_string()
}

pub fn genome_id_of_16s_file(file_name: &str) -> String {
    let mut id = file_name;
    for suffix in &["_16S.fna", "_16S.fa", ".fna", ".fa"] {
        if let Some(stripped) = id.strip_suffix(suffix) {
            id = stripped;
            break;
        }
    }
    strip_genomic_tag(id).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyStats {
    pub num_genomes: usize,
    pub mean: f64,
    pub median: f64,
    pub max: usize,
}

impl CopyStats {
    pub fn from_counts(counts: &[(String, usize)]) -> Option<CopyStats> {
        let mut positive: Vec<usize> = counts.iter().map(|(_, c)| *c).filter(|c| *c > 0).collect();
        if positive.is_empty() {
            return None;
        }
        positive.sort_unstable();
        let n = positive.len();
        let median = if n % 2 == 1 {
            positive[n / 2] as f64
        } else {
            (positive[n / 2 - 1] + positive[n / 2]) as f64 / 2.0
        };
        Some(CopyStats {
            num_genomes: n,
            mean: positive.iter().sum::<usize>() as f64 / n as f64,
            median,
            max: positive[n - 1],
        })
    }
}

fn write_two_columns<'a, I: IntoIterator<Item = (&'a str, String)>>(
    path: &Path,
    header: Option<(&str, &str)>,
    rows: I,
) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|e| MagrefError::io(path, e))?);
    if let Some((a, b)) = header {
        writeln!(file, "{}\t{}", a, b).map_err(|e| MagrefError::io(path, e))?;
    }
    for (a, b) in rows {
        writeln!(file, "{}\t{}", a, b).map_err(|e| MagrefError::io(path, e))?;
    }
    file.flush().map_err(|e| MagrefError::io(path, e))
}

/// Count 16S genes in each `<id>_rRNA.fna` file of `<root>/<domain>/`.
///
/// Genomes with exactly one gene get it written to
/// `<root>/<domain>_16S_single/<id>.fna`, those with more to
/// `<root>/<domain>_16S_multiple/<id>.fna`. Counts for every genome, zeros
/// included, go to `<root>/<domain>_16S_copies.txt`.
pub fn count_16s_copies(root: &Path, domain: Domain) -> Result<(Vec<(String, usize)>, Option<CopyStats>)> {
    let input_dir = root.join(domain.file_stem());
    require_dir(&input_dir)?;
    let single_dir = root.join(format!("{}_16S_single", domain.file_stem()));
    let multiple_dir = root.join(format!("{}_16S_multiple", domain.file_stem()));
    create_dir(&single_dir)?;
    create_dir(&multiple_dir)?;

    let mut counts = vec![];
    for file_name in list_file_names(&input_dir)? {
        if !file_name.ends_with(RRNA_FILE_SUFFIX) {
            continue;
        }
        let genome_id = genome_id_of_rrna_file(&file_name);
        let genes: Vec<FastaRecord> = read_fasta(&input_dir.join(&file_name))?
            .into_iter()
            .filter(is_16s)
            .collect();
        trace!("{} has {} 16S gene(s)", genome_id, genes.len());
        match genes.len() {
            0 => {}
            1 => write_fasta(&single_dir.join(format!("{}.fna", genome_id)), &genes)?,
            _ => write_fasta(&multiple_dir.join(format!("{}.fna", genome_id)), &genes)?,
        }
        counts.push((genome_id, genes.len()));
    }

    let copies_path = root.join(format!("{}_16S_copies.txt", domain.file_stem()));
    write_two_columns(
        &copies_path,
        None,
        counts.iter().map(|(id, c)| (id.as_str(), c.to_string())),
    )?;

    let stats = CopyStats::from_counts(&counts);
    match &stats {
        Some(s) => info!(
            "{}: n(genomes with >=1 16S)={}  mean={:.3}  median={:.1}  max={}",
            domain.file_stem(),
            s.num_genomes,
            s.mean,
            s.median,
            s.max
        ),
        None => warn!("{}: no genomes with detected 16S", domain.file_stem()),
    }
    Ok((counts, stats))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceSource {
    Clustered,
    Single,
}

impl SequenceSource {
    pub fn label(&self) -> &'static str {
        match self {
            SequenceSource::Clustered => "clustered",
            SequenceSource::Single => "single",
        }
    }
}

pub fn read_allow_list(path: &Path, config: &PipelineConfig) -> Result<HashSet<String>> {
    let table = read_checkm_table(path, config)?;
    Ok(table
        .records()
        .iter()
        .map(|r| strip_genomic_tag(&r.genome_id).to_string())
        .collect())
}

fn longest(records: Vec<FastaRecord>) -> Option<FastaRecord> {
    // max_by_key would keep the last of equal lengths
    records
        .into_iter()
        .fold(None, |best: Option<FastaRecord>, r| match best {
            Some(b) if b.seq.len() >= r.seq.len() => Some(b),
            _ => Some(r),
        })
}

fn pick_from_directory(
    dir: &Path,
    source: SequenceSource,
    allow_list: Option<&HashSet<String>>,
    picked: &mut BTreeMap<String, (FastaRecord, SequenceSource)>,
) -> Result<()> {
    for file_name in list_file_names(dir)? {
        if !(file_name.ends_with(".fna") || file_name.ends_with(".fa")) {
            continue;
        }
        let genome_id = genome_id_of_16s_file(&file_name);
        if allow_list.map(|a| !a.contains(&genome_id)).unwrap_or(false) || picked.contains_key(&genome_id) {
            continue;
        }
        if let Some(record) = longest(read_fasta(&dir.join(&file_name))?) {
            picked.insert(
                genome_id.clone(),
                (FastaRecord::new(&genome_id, &record.seq), source),
            );
        }
    }
    Ok(())
}

pub fn pick_single_16s(root: &Path, domain: Domain, allow_list: Option<&HashSet<String>>) -> Result<usize> {
    let clustered_dir = root.join(format!("{}_16S_clustered", domain.file_stem()));
    let single_dir = root.join(format!("{}_16S_single", domain.file_stem()));
    create_dir(&clustered_dir)?;
    create_dir(&single_dir)?;

    let mut picked = BTreeMap::new();
    pick_from_directory(&clustered_dir, SequenceSource::Clustered, allow_list, &mut picked)?;
    pick_from_directory(&single_dir, SequenceSource::Single, allow_list, &mut picked)?;

    let fasta_path = root.join(format!("{}_16S_genes.fasta", domain.file_stem()));
    let records: Vec<FastaRecord> = picked.values().map(|(r, _)| r.clone()).collect();
    write_fasta(&fasta_path, &records)?;
    write_two_columns(
        &root.join(format!("{}_16S_genes.map.tsv", domain.file_stem())),
        Some(("genome_id", "source")),
        picked
            .iter()
            .map(|(id, (_, source))| (id.as_str(), source.label().to_string())),
    )?;
    info!("{}: wrote {} sequences to {}", domain.file_stem(), picked.len(), fasta_path.display());
    Ok(picked.len())
}

pub fn filter_copy_table(
    reference_fasta: &Path,
    copies: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<usize> {
    let included: HashSet<String> = read_fasta(reference_fasta)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    info!("Genomes in reference {}: {}", reference_fasta.display(), included.len());

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(copies)
        .map_err(|e| match e.kind() {
            csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => MagrefError::MissingInput {
                path: copies.to_path_buf(),
            },
            _ => MagrefError::csv(copies, e),
        })?;
    let mut seen = HashSet::new();
    let mut kept: Vec<(String, u32)> = vec![];
    let mut num_rows = 0usize;
    for result in rdr.records() {
        let row = result.map_err(|e| MagrefError::csv(copies, e))?;
        num_rows += 1;
        let genome_id = row.get(0).unwrap_or("").trim();
        if !included.contains(genome_id) || !seen.insert(genome_id.to_string()) {
            continue;
        }
        let count: u32 = row
            .get(1)
            .map(|c| c.trim())
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| {
                MagrefError::schema(copies, format!("copy number for {} is not a whole number", genome_id))
            })?;
        kept.push((genome_id.to_string(), count.min(config.max_16s_copies)));
    }
    info!("Input copy table entries: {}, kept {}", num_rows, kept.len());

    write_two_columns(
        output,
        Some(("assembly", "16S_rRNA_Count")),
        kept.iter().map(|(id, c)| (id.as_str(), c.to_string())),
    )?;
    Ok(kept.len())
}

pub fn default_copy_table_output(reference_fasta: &Path, domain: Domain) -> PathBuf {
    reference_fasta
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}_16S_copies.txt", domain.file_stem()))
}
