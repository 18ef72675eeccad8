use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::error::{MagrefError, Result};
use crate::fasta::{write_fasta, FastaRecord};

/// Convert a relaxed PHYLIP alignment, as written by RAxML-NG, to FASTA.
/// The first line holds the dimensions; each following line is a name, a
/// space and the sequence, which may itself contain spaces.
pub fn phylip_to_fasta(phylip: &Path, fasta: &Path) -> Result<usize> {
    let file = std::fs::File::open(phylip).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MagrefError::MissingInput {
            path: phylip.to_path_buf(),
        },
        _ => MagrefError::io(phylip, e),
    })?;
    let mut records = vec![];
    for line in BufReader::new(file).lines().skip(1) {
        let line = line.map_err(|e| MagrefError::io(phylip, e))?;
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if line.is_empty() {
            continue;
        }
        match line.split_once(' ') {
            Some((name, seq)) => {
                let seq: Vec<u8> = seq.bytes().filter(|b| *b != b' ').collect();
                records.push(FastaRecord::new(name, &seq));
            }
            None => trace!("Skipping PHYLIP line without a sequence: {:?}", line),
        }
    }
    write_fasta(fasta, &records)?;
    info!("Wrote {} aligned sequences to {}", records.len(), fasta.display());
    Ok(records.len())
}

/// Model parameters and provenance read from a RAxML-NG `--evaluate` log.
#[derive(Debug, Clone, PartialEq)]
pub struct RaxmlLogSummary {
    pub patterns: u64,
    pub base_frequencies: Vec<String>,
    pub substitution_rates: Vec<String>,
    pub final_log_likelihood: String,
    /// Seconds, "0.0" when the log has no elapsed time line.
    pub elapsed: String,
    pub called_line: String,
    pub command_line: String,
}

lazy_static! {
    static ref PATTERNS_RE: Regex =
        Regex::new(r"Alignment comprises\s+(\d+)\s+partitions\s+and\s+(\d+)\s+patterns").unwrap();
    static ref LIKELIHOOD_RE: Regex = Regex::new(r"Final LogLikelihood:\s+(-?[0-9.eE+-]+)").unwrap();
    static ref ELAPSED_RE: Regex = Regex::new(r"Elapsed time:\s+([0-9.eE+-]+)\s+seconds").unwrap();
}

fn values_after_colon(line: &str) -> Vec<String> {
    line.splitn(2, ':')
        .nth(1)
        .map(|rest| rest.split_whitespace().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

/// Parse a RAxML-NG log. `source` names the log in error messages.
pub fn parse_raxml_log(content: &str, source: &Path) -> Result<RaxmlLogSummary> {
    let lines: Vec<&str> = content.lines().collect();

    let mut called_line = None;
    let mut command_line = None;
    if let Some(i) = lines.iter().position(|l| l.contains("RAxML-NG was called at")) {
        called_line = Some(lines[i].to_string());
        command_line = lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(|l| l.to_string());
    }

    let mut patterns = None;
    let mut base_frequencies = None;
    let mut substitution_rates = None;
    let mut final_log_likelihood = None;
    let mut elapsed = None;
    for line in &lines {
        let line = line.trim();
        if let Some(c) = PATTERNS_RE.captures(line) {
            patterns = c[2].parse::<u64>().ok();
        } else if line.starts_with("Base frequencies (ML):") {
            base_frequencies = Some(values_after_colon(line));
        } else if line.starts_with("Substitution rates (ML):") {
            substitution_rates = Some(values_after_colon(line));
        } else if let Some(c) = LIKELIHOOD_RE.captures(line) {
            final_log_likelihood = Some(c[1].to_string());
        } else if let Some(c) = ELAPSED_RE.captures(line) {
            elapsed = Some(c[1].to_string());
        }
    }

    let missing = |what: &str| MagrefError::schema(source, format!("could not parse {} from RAxML-NG log", what));
    let summary = RaxmlLogSummary {
        patterns: patterns.ok_or_else(|| missing("alignment patterns"))?,
        base_frequencies: base_frequencies.ok_or_else(|| missing("base frequencies"))?,
        substitution_rates: substitution_rates.ok_or_else(|| missing("substitution rates"))?,
        final_log_likelihood: final_log_likelihood.ok_or_else(|| missing("final log-likelihood"))?,
        elapsed: elapsed.unwrap_or_else(|| "0.0".to_string()),
        called_line: called_line.ok_or_else(|| missing("the 'RAxML-NG was called at' line"))?,
        command_line: command_line.ok_or_else(|| missing("the command line"))?,
    };
    Ok(summary)
}

/// Render a RAxML 7.x style info file, the format PICRUSt2 and SEPP expect
/// alongside a reference tree.
pub fn render_raxml_info(summary: &RaxmlLogSummary) -> String {
    let lines = vec![
        "This is RAxML version 7.7.2 released by Alexandros Stamatakis on July 31 2013.".to_string(),
        String::new(),
        "This is a RAxML_info file from an --evaluate run, manually reformatted".to_string(),
        String::new(),
        "Partition: 0".to_string(),
        format!("Alignment Patterns: {}", summary.patterns),
        "Name: No Name Provided".to_string(),
        "DataType: DNA".to_string(),
        "Substitution Matrix: GTR".to_string(),
        String::new(),
        summary.called_line.clone(),
        String::new(),
        summary.command_line.clone(),
        String::new(),
        format!("Base frequencies: {}", summary.base_frequencies.join(" ")),
        String::new(),
        format!(
            "Inference[0]: Time {} CAT-based likelihood -0000, best rearrangement setting 5",
            summary.elapsed
        ),
        format!(
            "alpha[0]: 1.000000 rates[0] ac ag at cg ct gt: {}",
            summary.substitution_rates.join(" ")
        ),
        String::new(),
        String::new(),
        "NOT conducting any final model optimizations on all 1 trees under CAT-based".to_string(),
        "model ....".to_string(),
        String::new(),
        format!("Final GAMMA  likelihood: {}", summary.final_log_likelihood),
        String::new(),
    ];
    lines.join("\n")
}

/// Read a RAxML-NG log and write the matching RAxML info file.
pub fn write_raxml_info(log: &Path, info: &Path) -> Result<RaxmlLogSummary> {
    if !log.exists() {
        return Err(MagrefError::MissingInput {
            path: log.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(log).map_err(|e| MagrefError::io(log, e))?;
    let summary = parse_raxml_log(&content, log)?;
    std::fs::write(info, render_raxml_info(&summary)).map_err(|e| MagrefError::io(info, e))?;
    info!("Wrote RAxML info file {}", info.display());
    Ok(summary)
}
