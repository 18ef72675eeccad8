use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{MagrefError, Result};

/// Header names accepted for the column holding original file names / IDs.
pub const ORIGINAL_ID_COLUMNS: [&str; 5] =
    ["original_filename", "original", "raw_id", "old_id", "user_genome"];
/// Header names accepted for the column holding reformatted IDs.
pub const NEW_ID_COLUMNS: [&str; 4] = ["new_id", "formatted_id", "mag_id", "id"];

/// Reduce a genome file name or identifier to its canonical genome ID.
///
/// The basename is taken, then the first matching suffix in `suffixes` is
/// removed. When no suffix matches, the last dot-delimited extension is
/// dropped instead, and a name without any dot is returned as is. Note that
/// the fallback means a stem which itself contains dots (e.g. `bin.1`) is
/// shortened again on a second pass.
pub fn strip_genome_suffix<S: AsRef<str>>(raw: &str, suffixes: &[S]) -> String {
    let base = basename(raw.trim());
    if let Some(stem) = known_suffix_stem(base, suffixes) {
        return stem.to_string();
    }
    match base.rfind('.') {
        Some(i) => base[..i].to_string(),
        None => base.to_string(),
    }
}

/// Basename with the first matching suffix in `suffixes` removed, or the
/// basename unchanged. Dots inside a name are never touched.
pub fn strip_known_suffix<S: AsRef<str>>(raw: &str, suffixes: &[S]) -> String {
    let base = basename(raw.trim());
    known_suffix_stem(base, suffixes).unwrap_or(base).to_string()
}

fn known_suffix_stem<'a, S: AsRef<str>>(base: &'a str, suffixes: &[S]) -> Option<&'a str> {
    suffixes.iter().find_map(|suffix| {
        let suffix = suffix.as_ref();
        if base.len() > suffix.len() {
            base.strip_suffix(suffix)
        } else {
            None
        }
    })
}

/// Remove a trailing `.fa`, `.fna` or `.fasta`, optionally followed by
/// `.gz`, in any letter case. Anything else is left untouched, unlike
/// [`strip_genome_suffix`].
pub fn strip_fasta_extension(genome_id: &str) -> String {
    let trimmed = genome_id.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_gz = if lower.ends_with(".gz") {
        &lower[..lower.len() - 3]
    } else {
        &lower[..]
    };
    for ext in &[".fasta", ".fna", ".fa"] {
        if without_gz.ends_with(ext) && without_gz.len() > ext.len() {
            return trimmed[..without_gz.len() - ext.len()].to_string();
        }
    }
    trimmed.to_string()
}

pub fn strip_genomic_tag(genome_id: &str) -> &str {
    genome_id.strip_suffix("_genomic").unwrap_or(genome_id)
}

/// GTDB accessions carry a database prefix (`RS_GCF_...`, `GB_GCA_...`)
/// which genome file names lack.
pub fn strip_gtdb_accession_prefix(accession: &str) -> &str {
    accession
        .strip_prefix("RS_")
        .or_else(|| accession.strip_prefix("GB_"))
        .unwrap_or(accession)
}

fn basename(raw: &str) -> &str {
    Path::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(raw)
}

/// Operator supplied association between original genome names and the IDs
/// they were reformatted to.
#[derive(Debug, Default, Clone)]
pub struct IdentifierMap {
    original_to_new: BTreeMap<String, String>,
    suffixes: Vec<String>,
}

impl IdentifierMap {
    pub fn new<S: AsRef<str>>(suffixes: &[S]) -> IdentifierMap {
        IdentifierMap {
            original_to_new: BTreeMap::new(),
            suffixes: suffixes.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Read a tab separated map with a header line. The original and new ID
    /// columns are found by name (case insensitive); a table of exactly two
    /// unrecognised columns is read positionally.
    pub fn from_path<S: AsRef<str>>(path: &Path, suffixes: &[S]) -> Result<IdentifierMap> {
        if !path.exists() {
            return Err(MagrefError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| MagrefError::csv(path, e))?;
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| MagrefError::csv(path, e))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let (original_col, new_col) = match (
            find_column(&headers, &ORIGINAL_ID_COLUMNS),
            find_column(&headers, &NEW_ID_COLUMNS),
        ) {
            (Some(o), Some(n)) if o != n => (o, n),
            _ if headers.len() == 2 => {
                warn!(
                    "ID map {} has unrecognised headers {:?}, using first column as original and second as new ID",
                    path.display(),
                    headers
                );
                (0, 1)
            }
            _ => {
                return Err(MagrefError::schema(
                    path,
                    format!(
                        "ID map needs an original ID column (one of {:?}) and a new ID column (one of {:?}), found {:?}",
                        ORIGINAL_ID_COLUMNS, NEW_ID_COLUMNS, headers
                    ),
                ))
            }
        };
        debug!(
            "Reading ID map {} using columns '{}' -> '{}'",
            path.display(),
            headers[original_col],
            headers[new_col]
        );

        let mut map = IdentifierMap::new(suffixes);
        for result in rdr.records() {
            let record = result.map_err(|e| MagrefError::csv(path, e))?;
            match (record.get(original_col), record.get(new_col)) {
                (Some(original), Some(new)) if !original.trim().is_empty() => {
                    if let Some(existing) = map.insert(original, new.trim()) {
                        return Err(MagrefError::schema(
                            path,
                            format!(
                                "original ID '{}' maps to both '{}' and '{}' once file extensions are removed",
                                original.trim(),
                                existing,
                                new.trim()
                            ),
                        ));
                    }
                }
                _ => trace!("Skipping ID map line {:?}", record),
            }
        }
        info!("Read {} ID mappings from {}", map.len(), path.display());
        Ok(map)
    }

    /// Add a mapping keyed on the original name without its FASTA suffix.
    /// When that key already maps to a different ID nothing is changed and
    /// the existing ID is returned.
    pub fn insert(&mut self, original: &str, new_id: &str) -> Option<String> {
        let key = strip_known_suffix(original, &self.suffixes);
        match self.original_to_new.get(&key) {
            Some(existing) if existing != new_id => Some(existing.clone()),
            Some(_) => None,
            None => {
                self.original_to_new.insert(key, new_id.to_string());
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.original_to_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_to_new.is_empty()
    }

    fn lookup(&self, raw: &str) -> Option<&String> {
        self.original_to_new
            .get(raw.trim())
            .or_else(|| self.original_to_new.get(&strip_known_suffix(raw, &self.suffixes)))
    }

    /// Mapped ID when known, otherwise the input unchanged. For display and
    /// best-effort matching only.
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        match self.lookup(raw) {
            Some(new_id) => new_id.as_str(),
            None => raw,
        }
    }

    /// Mapped ID, failing when the input is not in the map. Used where a
    /// silent pass-through would corrupt an output table.
    pub fn resolve_strict(&self, raw: &str, context: &str) -> Result<&str> {
        self.lookup(raw)
            .map(|s| s.as_str())
            .ok_or_else(|| MagrefError::UnmappedIdentifier {
                id: raw.to_string(),
                context: context.to_string(),
            })
    }
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}
