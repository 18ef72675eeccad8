use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::error::{MagrefError, Result};
use crate::identifiers::{strip_fasta_extension, strip_gtdb_accession_prefix};
use crate::pipeline_config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Bacteria,
    Archaea,
    Unknown,
}

impl Domain {
    pub fn from_label(label: &str) -> Domain {
        match label.trim().to_lowercase().as_str() {
            "bacteria" => Domain::Bacteria,
            "archaea" => Domain::Archaea,
            _ => Domain::Unknown,
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Domain::Bacteria => "bacteria",
            Domain::Archaea => "archaea",
            Domain::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Domain::Bacteria => "Bacteria",
            Domain::Archaea => "Archaea",
            Domain::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Keyword match on a CheckM marker lineage, not a taxonomic classification.
pub fn infer_domain_from_lineage<S: AsRef<str>>(lineage: Option<&str>, archaeal_keywords: &[S]) -> Domain {
    match lineage {
        None => Domain::Unknown,
        Some(lineage) => {
            let lower = lineage.to_lowercase();
            if archaeal_keywords
                .iter()
                .any(|k| lower.contains(&k.as_ref().to_lowercase()))
            {
                Domain::Archaea
            } else {
                Domain::Bacteria
            }
        }
    }
}

pub fn domain_from_gtdb_classification(classification: &str) -> Domain {
    let classification = classification.trim();
    if classification.starts_with("d__Bacteria") {
        Domain::Bacteria
    } else if classification.starts_with("d__Archaea") {
        Domain::Archaea
    } else {
        Domain::Unknown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenomeRecord {
    pub genome_id: String,
    pub completeness: Option<f64>,
    pub contamination: Option<f64>,
    pub domain: Domain,
    pub marker_lineage: Option<String>,
    pub extra: Vec<String>,
}

impl GenomeRecord {
    pub fn new(genome_id: &str, completeness: Option<f64>, contamination: Option<f64>) -> GenomeRecord {
        GenomeRecord {
            genome_id: genome_id.to_string(),
            completeness,
            contamination,
            domain: Domain::Unknown,
            marker_lineage: None,
            extra: vec![],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    records: Vec<GenomeRecord>,
    index: HashMap<String, usize>,
    pub extra_columns: Vec<String>,
}

impl MetadataTable {
    pub fn from_records(records: Vec<GenomeRecord>, extra_columns: Vec<String>) -> MetadataTable {
        let mut seen = HashSet::new();
        let mut kept = vec![];
        let mut num_duplicates = 0usize;
        for record in records {
            if !seen.insert(record.genome_id.clone()) {
                num_duplicates += 1;
                continue;
            }
            kept.push(record);
        }
        if num_duplicates > 0 {
            warn!("Ignored {} duplicate genome record(s), keeping the first of each", num_duplicates);
        }
        kept.sort_by(|a, b| a.genome_id.cmp(&b.genome_id));
        let index = kept
            .iter()
            .enumerate()
            .map(|(i, r)| (r.genome_id.clone(), i))
            .collect();
        MetadataTable {
            records: kept,
            index,
            extra_columns,
        }
    }

    pub fn get(&self, genome_id: &str) -> Option<&GenomeRecord> {
        self.index.get(genome_id).map(|i| &self.records[*i])
    }

    pub fn position(&self, genome_id: &str) -> Option<usize> {
        self.index.get(genome_id).copied()
    }

    pub fn contains(&self, genome_id: &str) -> bool {
        self.index.contains_key(genome_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GenomeRecord] {
        &self.records
    }

    pub fn retain<F: Fn(&GenomeRecord) -> bool>(self, keep: F) -> MetadataTable {
        let extra_columns = self.extra_columns;
        MetadataTable::from_records(
            self.records.into_iter().filter(|r| keep(r)).collect(),
            extra_columns,
        )
    }

    pub fn rename<F: Fn(&str) -> String>(self, rename: F) -> MetadataTable {
        let extra_columns = self.extra_columns;
        let records = self
            .records
            .into_iter()
            .map(|mut r| {
                r.genome_id = rename(&r.genome_id);
                r
            })
            .collect();
        MetadataTable::from_records(records, extra_columns)
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "genome_id",
            "marker_lineage",
            "checkm_completeness",
            "checkm_contamination",
            "domain",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(self.extra_columns.iter().cloned());
        header
    }

    fn row(&self, record: &GenomeRecord) -> Vec<String> {
        let mut row = vec![
            record.genome_id.clone(),
            record.marker_lineage.clone().unwrap_or_default(),
            format_optional(record.completeness),
            format_optional(record.contamination),
            record.domain.to_string(),
        ];
        row.extend(record.extra.iter().cloned());
        row
    }

    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let mut wtr = tsv_writer(path)?;
        wtr.write_record(self.header())
            .map_err(|e| MagrefError::csv(path, e))?;
        for record in &self.records {
            wtr.write_record(self.row(record))
                .map_err(|e| MagrefError::csv(path, e))?;
        }
        wtr.flush().map_err(|e| MagrefError::io(path, e))?;
        debug!("Wrote {} metadata rows to {}", self.records.len(), path.display());
        Ok(())
    }

    pub fn write_reduced_tsv(&self, path: &Path, genome_ids: &[String]) -> Result<()> {
        let mut ids: Vec<&String> = genome_ids.iter().collect();
        ids.sort();
        ids.dedup();

        let mut wtr = tsv_writer(path)?;
        wtr.write_record(self.header())
            .map_err(|e| MagrefError::csv(path, e))?;
        let width = self.header().len();
        for id in ids {
            let row = match self.get(id) {
                Some(record) => self.row(record),
                None => {
                    let mut row = vec![id.clone()];
                    row.resize(width, String::new());
                    row
                }
            };
            wtr.write_record(row).map_err(|e| MagrefError::csv(path, e))?;
        }
        wtr.flush().map_err(|e| MagrefError::io(path, e))?;
        Ok(())
    }
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|e| MagrefError::csv(path, e))
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().replace(',', "").parse::<f64>().ok()
}

/// One way of reading a CheckM results file. Strategies are tried in turn
/// and the first returning any rows is used.
pub trait CheckmParseStrategy {
    fn name(&self) -> &'static str;

    fn parse(&self, content: &str, config: &PipelineConfig) -> (Vec<GenomeRecord>, Vec<String>);
}

pub struct MinimalCheckmStrategy;

impl CheckmParseStrategy for MinimalCheckmStrategy {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn parse(&self, content: &str, _config: &PipelineConfig) -> (Vec<GenomeRecord>, Vec<String>) {
        let mut records = vec![];
        for line in content.lines() {
            if line.trim().is_empty() || line.trim_start().starts_with('-') {
                continue;
            }
            let parts: Vec<&str> = line
                .split('\t')
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() != 3 || parts[0].to_lowercase() == "genome_id" {
                continue;
            }
            match (parts[1].parse::<f64>(), parts[2].parse::<f64>()) {
                (Ok(completeness), Ok(contamination)) => records.push(GenomeRecord::new(
                    &strip_fasta_extension(parts[0]),
                    Some(completeness),
                    Some(contamination),
                )),
                _ => trace!("Skipping unparseable minimal CheckM line {:?}", line),
            }
        }
        (records, vec![])
    }
}

lazy_static! {
    static ref WIDE_LEAD: Regex =
        Regex::new(r"(?i)^\s*([A-Za-z0-9._+-]+)\s+([a-z]__.+?)\s{2,}").unwrap();
    static ref WIDE_SPLIT: Regex = Regex::new(r"\s{2,}|\t").unwrap();
}

/// Space aligned multi-panel CheckM text output, where each row begins with
/// the bin ID and marker lineage and the header block repeats further along
/// the line. Completeness and contamination are the 4th and 5th values of
/// the first numeric run.
pub struct WideCheckmStrategy;

impl CheckmParseStrategy for WideCheckmStrategy {
    fn name(&self) -> &'static str {
        "wide"
    }

    fn parse(&self, content: &str, _config: &PipelineConfig) -> (Vec<GenomeRecord>, Vec<String>) {
        let mut records = vec![];
        for raw in content.lines() {
            let s = raw.trim();
            if s.is_empty() || s.starts_with("Bin Id") || s.starts_with("genome_id") || s.starts_with('-') {
                continue;
            }
            let captures = match WIDE_LEAD.captures(raw) {
                Some(c) => c,
                None => continue,
            };
            let whole = captures.get(0).map(|m| m.end()).unwrap_or(0);
            let genome_id = strip_fasta_extension(&captures[1]);
            let lineage = captures[2].trim().to_string();

            let mut numbers = vec![];
            for token in WIDE_SPLIT.split(raw[whole..].trim()).filter(|t| !t.is_empty()) {
                match parse_number(token) {
                    Some(n) => numbers.push(n),
                    None => break,
                }
            }
            if numbers.len() >= 5 {
                let mut record = GenomeRecord::new(&genome_id, Some(numbers[3]), Some(numbers[4]));
                record.marker_lineage = Some(lineage);
                records.push(record);
            } else {
                trace!("Too few numeric fields in wide CheckM line {:?}", raw);
            }
        }
        (records, vec![])
    }
}

const ID_COLUMNS: [&str; 5] = ["genome_id", "bin id", "user_genome", "genome", "name"];
const COMPLETENESS_COLUMNS: [&str; 2] = ["checkm_completeness", "completeness"];
const CONTAMINATION_COLUMNS: [&str; 2] = ["checkm_contamination", "contamination"];
const LINEAGE_COLUMNS: [&str; 2] = ["marker_lineage", "marker lineage"];

pub struct HeaderedCheckmStrategy;

impl CheckmParseStrategy for HeaderedCheckmStrategy {
    fn name(&self) -> &'static str {
        "headered"
    }

    fn parse(&self, content: &str, config: &PipelineConfig) -> (Vec<GenomeRecord>, Vec<String>) {
        parse_headered_table(content.as_bytes(), &ID_COLUMNS, config, |id| strip_fasta_extension(id))
            .unwrap_or_default()
    }
}

fn column_index(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

fn parse_headered_table<R: std::io::Read, F: Fn(&str) -> String>(
    reader: R,
    id_columns: &[&str],
    config: &PipelineConfig,
    normalise_id: F,
) -> Option<(Vec<GenomeRecord>, Vec<String>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let original_headers: Vec<String> = rdr.headers().ok()?.iter().map(|h| h.to_string()).collect();
    let headers: Vec<String> = original_headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let id_col = column_index(&headers, id_columns)?;
    let completeness_col = column_index(&headers, &COMPLETENESS_COLUMNS)?;
    let contamination_col = column_index(&headers, &CONTAMINATION_COLUMNS)?;
    let lineage_col = column_index(&headers, &LINEAGE_COLUMNS);
    let domain_col = column_index(&headers, &["domain"]);
    let taxonomy_col = column_index(&headers, &["gtdb_taxonomy", "classification"]);

    let used: Vec<usize> = [
        Some(id_col),
        Some(completeness_col),
        Some(contamination_col),
        lineage_col,
        domain_col,
    ]
    .iter()
    .filter_map(|c| *c)
    .collect();
    let extra_cols: Vec<usize> = (0..headers.len()).filter(|i| !used.contains(i)).collect();
    let extra_columns = extra_cols.iter().map(|i| original_headers[*i].clone()).collect();

    let mut records = vec![];
    for result in rdr.records() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                trace!("Skipping unreadable table row: {}", e);
                continue;
            }
        };
        let genome_id = match row.get(id_col).map(|s| s.trim()) {
            Some(id) if !id.is_empty() => normalise_id(id),
            _ => continue,
        };
        let mut record = GenomeRecord::new(
            &genome_id,
            row.get(completeness_col).and_then(parse_number),
            row.get(contamination_col).and_then(parse_number),
        );
        record.marker_lineage = lineage_col
            .and_then(|c| row.get(c))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let stated_domain = domain_col
            .and_then(|c| row.get(c))
            .map(Domain::from_label)
            .unwrap_or(Domain::Unknown);
        let taxonomy_domain = taxonomy_col
            .and_then(|c| row.get(c))
            .map(domain_from_gtdb_classification)
            .unwrap_or(Domain::Unknown);
        record.domain = match (stated_domain, taxonomy_domain) {
            (Domain::Unknown, Domain::Unknown) => infer_domain_from_lineage(
                record.marker_lineage.as_deref(),
                &config.archaeal_keywords,
            ),
            (Domain::Unknown, d) => d,
            (d, _) => d,
        };
        record.extra = extra_cols
            .iter()
            .map(|i| row.get(*i).unwrap_or("").to_string())
            .collect();
        records.push(record);
    }
    Some((records, extra_columns))
}

pub fn default_checkm_strategies() -> Vec<Box<dyn CheckmParseStrategy>> {
    vec![
        Box::new(MinimalCheckmStrategy),
        Box::new(WideCheckmStrategy),
        Box::new(HeaderedCheckmStrategy),
    ]
}

pub fn parse_checkm_content(
    content: &str,
    strategies: &[Box<dyn CheckmParseStrategy>],
    config: &PipelineConfig,
) -> Option<(&'static str, MetadataTable)> {
    for (i, strategy) in strategies.iter().enumerate() {
        let (mut records, extra_columns) = strategy.parse(content, config);
        debug!("CheckM strategy '{}' parsed {} rows", strategy.name(), records.len());
        if records.is_empty() {
            continue;
        }

        // Minimal tables carry no lineage, so borrow it from a wide parse of
        // the same file when one is possible.
        if strategy.name() == "minimal" {
            let lineages: HashMap<String, String> = strategies[i + 1..]
                .iter()
                .filter(|s| s.name() == "wide")
                .flat_map(|s| s.parse(content, config).0)
                .filter_map(|r| {
                    let GenomeRecord {
                        genome_id,
                        marker_lineage,
                        ..
                    } = r;
                    marker_lineage.map(|l| (genome_id, l))
                })
                .collect();
            for record in records.iter_mut() {
                if record.marker_lineage.is_none() {
                    record.marker_lineage = lineages.get(&record.genome_id).cloned();
                }
            }
        }
        for record in records.iter_mut() {
            if record.domain == Domain::Unknown {
                record.domain = infer_domain_from_lineage(
                    record.marker_lineage.as_deref(),
                    &config.archaeal_keywords,
                );
            }
        }
        return Some((strategy.name(), MetadataTable::from_records(records, extra_columns)));
    }
    None
}

pub fn read_checkm_table(path: &Path, config: &PipelineConfig) -> Result<MetadataTable> {
    if !path.exists() {
        return Err(MagrefError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|e| MagrefError::io(path, e))?;
    info!("Reading CheckM results {} ({} bytes) ..", path.display(), bytes.len());
    let content = String::from_utf8_lossy(&bytes);
    match parse_checkm_content(&content, &default_checkm_strategies(), config) {
        Some((strategy, table)) => {
            info!(
                "Parsed {} genome quality records from {} using the {} strategy",
                table.len(),
                path.display(),
                strategy
            );
            Ok(table)
        }
        None => Err(MagrefError::schema(
            path,
            "no parsable CheckM entries found, check the file format",
        )),
    }
}

pub fn read_gtdb_reference_metadata(path: &Path, config: &PipelineConfig) -> Result<MetadataTable> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MagrefError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => MagrefError::io(path, e),
    })?;
    let first_header = {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|e| MagrefError::csv(path, e))?;
        rdr.headers()
            .map_err(|e| MagrefError::csv(path, e))?
            .get(0)
            .map(|s| s.trim().to_lowercase())
            .ok_or_else(|| MagrefError::schema(path, "empty header line"))?
    };
    let (records, extra_columns) = parse_headered_table(
        std::io::BufReader::new(file),
        &[first_header.as_str()],
        config,
        |id| strip_gtdb_accession_prefix(id).to_string(),
    )
    .ok_or_else(|| {
        MagrefError::schema(
            path,
            "GTDB metadata must have checkm_completeness and checkm_contamination columns",
        )
    })?;
    info!("Read {} GTDB reference genome records from {}", records.len(), path.display());
    Ok(MetadataTable::from_records(records, extra_columns))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GtdbtkClassification {
    pub user_genome: String,
    pub classification: String,
    pub domain: Domain,
}

pub fn read_gtdbtk_summaries(paths: &[&Path]) -> Result<Vec<GtdbtkClassification>> {
    let mut seen = HashSet::new();
    let mut to_return = vec![];
    for path in paths {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|e| MagrefError::csv(*path, e))?;
        let headers = rdr.headers().map_err(|e| MagrefError::csv(*path, e))?.clone();
        let genome_col = headers.iter().position(|h| h == "user_genome");
        let class_col = headers.iter().position(|h| h == "classification");
        let (genome_col, class_col) = match (genome_col, class_col) {
            (Some(g), Some(c)) => (g, c),
            _ => {
                return Err(MagrefError::schema(
                    *path,
                    "missing required columns: user_genome/classification",
                ))
            }
        };
        let mut num_read = 0usize;
        for result in rdr.records() {
            let row = result.map_err(|e| MagrefError::csv(*path, e))?;
            let user_genome = match row.get(genome_col) {
                Some(g) if !g.trim().is_empty() => g.trim().to_string(),
                _ => continue,
            };
            if !seen.insert(user_genome.clone()) {
                continue;
            }
            let classification = row.get(class_col).unwrap_or("").to_string();
            to_return.push(GtdbtkClassification {
                domain: domain_from_gtdb_classification(&classification),
                user_genome,
                classification,
            });
            num_read += 1;
        }
        debug!("Read {} classifications from {}", num_read, path.display());
    }
    Ok(to_return)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_infer_domain() {
        init();
        let config = PipelineConfig::default();
        assert_eq!(
            Domain::Archaea,
            infer_domain_from_lineage(Some("p__euryarchaeota (UID49)"), &config.archaeal_keywords)
        );
        assert_eq!(
            Domain::Bacteria,
            infer_domain_from_lineage(Some("k__Bacteria (UID203)"), &config.archaeal_keywords)
        );
        assert_eq!(Domain::Unknown, infer_domain_from_lineage(None, &config.archaeal_keywords));
    }

    #[test]
    fn test_gtdb_classification_domain() {
        assert_eq!(
            Domain::Bacteria,
            domain_from_gtdb_classification("d__Bacteria;p__Pseudomonadota;c__")
        );
        assert_eq!(Domain::Archaea, domain_from_gtdb_classification("d__Archaea;p__"));
        assert_eq!(Domain::Unknown, domain_from_gtdb_classification("Unclassified"));
    }

    #[test]
    fn test_minimal_strategy() {
        init();
        let content = "genome_id\tcompleteness\tcontamination\n\
                       MAG1.fa\t95.5\t1.2\n\
                       ---------\n\
                       MAG2\tNaNx\t1\n\
                       MAG3\t91\t0.5\n";
        let (records, _) = MinimalCheckmStrategy.parse(content, &PipelineConfig::default());
        assert_eq!(2, records.len());
        assert_eq!("MAG1", records[0].genome_id);
        assert_eq!(Some(95.5), records[0].completeness);
        assert_eq!(Some(1.2), records[0].contamination);
        assert_eq!("MAG3", records[1].genome_id);
    }

    #[test]
    fn test_wide_strategy() {
        init();
        let content = "  Bin Id    Marker lineage    # genomes   # markers   # marker sets   Completeness   Contamination\n\
                       ----------------------------------------------\n  \
                       bin.1.fa    k__Bacteria (UID203)    5449    104    58    97.41    1.72    Bin Id    Marker lineage\n  \
                       bin.2    p__Euryarchaeota (UID49)    95    228    153    88.00    12.50\n  \
                       bin.3    k__Bacteria (UID203)    12    13\n";
        let (records, _) = WideCheckmStrategy.parse(content, &PipelineConfig::default());
        assert_eq!(2, records.len());
        assert_eq!("bin.1", records[0].genome_id);
        assert_eq!(Some(97.41), records[0].completeness);
        assert_eq!(Some(1.72), records[0].contamination);
        assert_eq!(Some("k__Bacteria (UID203)".to_string()), records[0].marker_lineage);
        assert_eq!(Some("p__Euryarchaeota (UID49)".to_string()), records[1].marker_lineage);
    }

    #[test]
    fn test_headered_strategy_keeps_missing_values_and_extras() {
        init();
        let content = "genome_id\tmarker_lineage\tcheckm_completeness\tcheckm_contamination\tdomain\tsize\n\
                       G1\t\t95\t2\tBacteria\t100\n\
                       G3\tp__Euryarchaeota\tNA\t\t\t300\n";
        let (records, extra) = HeaderedCheckmStrategy.parse(content, &PipelineConfig::default());
        assert_eq!(vec!["size".to_string()], extra);
        assert_eq!(2, records.len());
        assert_eq!(Domain::Bacteria, records[0].domain);
        assert_eq!(None, records[1].completeness);
        assert_eq!(None, records[1].contamination);
        assert_eq!(Domain::Archaea, records[1].domain);
        assert_eq!(vec!["300".to_string()], records[1].extra);
    }

    #[test]
    fn test_headered_strategy_reads_checkm_tab_table() {
        init();
        let content = "Bin Id\tMarker lineage\t# genomes\tCompleteness\tContamination\tStrain heterogeneity\n\
                       73.20120800_S1D.21\tp__Euryarchaeota (UID49)\t95\t95.21\t0.00\t0.00\n";
        let (records, _) = HeaderedCheckmStrategy.parse(content, &PipelineConfig::default());
        assert_eq!(1, records.len());
        assert_eq!("73.20120800_S1D.21", records[0].genome_id);
        assert_eq!(Some(95.21), records[0].completeness);
        assert_eq!(Domain::Archaea, records[0].domain);
    }

    #[test]
    fn test_strategy_order_and_lineage_merge() {
        init();
        // The tab separated lines parse minimally; the space aligned ones
        // only provide lineages.
        let content = "bin.1\t97.0\t1.0\n\
                       bin.1    p__Thermoproteota (UID1)    1    2    3    97.0    1.0\n";
        let (name, table) =
            parse_checkm_content(content, &default_checkm_strategies(), &PipelineConfig::default())
                .unwrap();
        assert_eq!("minimal", name);
        assert_eq!(1, table.len());
        let record = table.get("bin.1").unwrap();
        assert_eq!(Some("p__Thermoproteota (UID1)".to_string()), record.marker_lineage);
        assert_eq!(Domain::Archaea, record.domain);
    }

    #[test]
    fn test_no_strategy_matches() {
        init();
        assert!(parse_checkm_content(
            "nothing to see here\n",
            &default_checkm_strategies(),
            &PipelineConfig::default()
        )
        .is_none());
        assert!(matches!(
            read_checkm_table(Path::new("tests/data/not_there.tsv"), &PipelineConfig::default()),
            Err(MagrefError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_table_sorted_and_deduplicated() {
        init();
        let table = MetadataTable::from_records(
            vec![
                GenomeRecord::new("G2", Some(1.), Some(1.)),
                GenomeRecord::new("G1", Some(2.), Some(2.)),
                GenomeRecord::new("G2", Some(3.), Some(3.)),
            ],
            vec![],
        );
        assert_eq!(2, table.len());
        assert_eq!(Some(0), table.position("G1"));
        assert_eq!(Some(1.), table.get("G2").unwrap().completeness);
    }

    #[test]
    fn test_reduced_table_reindexes() {
        init();
        let table = MetadataTable::from_records(
            vec![
                GenomeRecord::new("G2", Some(98.), Some(5.)),
                GenomeRecord::new("G1", Some(95.), Some(2.)),
            ],
            vec![],
        );
        let td = tempfile::TempDir::new().unwrap();
        let out = td.path().join("reduced.tsv");
        table
            .write_reduced_tsv(&out, &["G9".to_string(), "G2".to_string(), "G2".to_string()])
            .unwrap();
        assert_eq!(
            "genome_id\tmarker_lineage\tcheckm_completeness\tcheckm_contamination\tdomain\n\
             G2\t\t98\t5\tUnknown\n\
             G9\t\t\t\t\n",
            std::fs::read_to_string(&out).unwrap()
        );
    }

    #[test]
    fn test_written_table_reads_back() {
        init();
        let config = PipelineConfig::default();
        let mut record = GenomeRecord::new("MAG1", Some(93.5), Some(0.25));
        record.domain = Domain::Archaea;
        record.marker_lineage = Some("p__Euryarchaeota (UID49)".to_string());
        let table = MetadataTable::from_records(vec![record.clone()], vec![]);
        let td = tempfile::TempDir::new().unwrap();
        let out = td.path().join("checkm_filtered.tsv");
        table.write_tsv(&out).unwrap();
        let reread = read_checkm_table(&out, &config).unwrap();
        assert_eq!(Some(&record), reread.get("MAG1"));
    }

    #[test]
    fn test_read_gtdbtk_summaries() {
        init();
        let classifications = read_gtdbtk_summaries(&[
            Path::new("tests/data/gtdbtk/gtdbtk.bac120.summary.tsv"),
            Path::new("tests/data/gtdbtk/gtdbtk.ar53.summary.tsv"),
        ])
        .unwrap();
        let summary: Vec<(&str, Domain)> = classifications
            .iter()
            .map(|c| (c.user_genome.as_str(), c.domain))
            .collect();
        assert_eq!(
            vec![
                ("S1_bin.1", Domain::Bacteria),
                ("S1_bin.2", Domain::Bacteria),
                ("S2_bin.1", Domain::Archaea),
                ("S2_bin.9", Domain::Unknown),
            ],
            summary
        );
    }

    #[test]
    fn test_gtdbtk_summary_schema_error() {
        init();
        assert!(matches!(
            read_gtdbtk_summaries(&[Path::new("tests/data/id_map/id_map.tsv")]),
            Err(MagrefError::Schema { .. })
        ));
    }

    #[test]
    fn test_read_gtdb_reference_metadata() {
        init();
        let table = read_gtdb_reference_metadata(
            Path::new("tests/data/gtdb_metadata/bac120_metadata_r220.tsv"),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(3, table.len());
        let record = table.get("GCF_000005845.2").unwrap();
        assert_eq!(Some(99.9), record.completeness);
        assert_eq!(Domain::Bacteria, record.domain);
    }
}
