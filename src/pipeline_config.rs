use crate::genome_files::PlaceMode;

/// Suffixes stripped from genome file names, most specific first.
pub const GENOME_SUFFIXES: [&str; 8] = [
    "_genomic.fna.gz",
    "_genomic.fna",
    ".fa.gz",
    ".fna.gz",
    ".fasta.gz",
    ".fa",
    ".fna",
    ".fasta",
];

/// Lineage keywords taken to mean a genome is archaeal.
pub const ARCHAEAL_KEYWORDS: [&str; 8] = [
    "Archaea",
    "Euryarchaeota",
    "Thermoproteota",
    "Crenarchaeota",
    "Halobacteriota",
    "Nanoarchaeota",
    "Micrarchaeota",
    "DPANN",
];

/// Thresholds and naming conventions shared by the pipeline stages. Built
/// once from the command line and handed to each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Percent, inclusive.
    pub min_completeness: f64,
    /// Percent, inclusive.
    pub max_contamination: f64,
    pub genome_suffixes: Vec<String>,
    pub archaeal_keywords: Vec<String>,
    pub place_mode: PlaceMode,
    /// Write filtered IDs as `<id>_genomic`.
    pub append_genomic_suffix: bool,
    /// 16S copy numbers above this are capped in reference copy tables.
    pub max_16s_copies: u32,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            min_completeness: 90.0,
            max_contamination: 10.0,
            genome_suffixes: GENOME_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            archaeal_keywords: ARCHAEAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            place_mode: PlaceMode::Symlink,
            append_genomic_suffix: false,
            max_16s_copies: 10,
        }
    }
}

impl PipelineConfig {
    pub fn passes_quality(&self, completeness: f64, contamination: f64) -> bool {
        completeness >= self.min_completeness && contamination <= self.max_contamination
    }

    pub fn output_id(&self, genome_id: &str) -> String {
        if self.append_genomic_suffix && !genome_id.ends_with("_genomic") {
            format!("{}_genomic", genome_id)
        } else {
            genome_id.to_string()
        }
    }
}
