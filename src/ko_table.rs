use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{MagrefError, Result};
use crate::genome_files::{create_dir, list_file_names, require_dir};
use crate::identifiers::IdentifierMap;

/// Genome → KO → copy number.
pub type KoCounts = BTreeMap<String, BTreeMap<String, u32>>;

const ANNOTATION_MARKER: &str = ".emapper.annotations";
const KO_COLUMN: &str = "KEGG_ko";

/// Genome ID of an eggNOG-mapper annotation file: everything before
/// `.emapper`, or before the first dot when there is no `.emapper`.
pub fn genome_id_of_annotation_file(file_name: &str) -> &str {
    match file_name.find(".emapper") {
        Some(i) => &file_name[..i],
        None => file_name.split('.').next().unwrap_or(file_name),
    }
}

fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "-" || value.eq_ignore_ascii_case("NA")
}

/// KEGG orthologs in a `KEGG_ko` field. Multiple KOs are separated by commas
/// or, failing that, pipes; `ko:` prefixes are dropped and anything not of
/// the form `K` plus five digits is ignored.
pub fn parse_ko_field(field: &str) -> Vec<&str> {
    let field = field.trim();
    if is_blank(field) {
        return vec![];
    }
    let separator = if field.contains(',') {
        ','
    } else if field.contains('|') {
        '|'
    } else {
        return parse_single_ko(field).into_iter().collect();
    };
    field.split(separator).filter_map(parse_single_ko).collect()
}

fn parse_single_ko(raw: &str) -> Option<&str> {
    let ko = raw.trim();
    if is_blank(ko) {
        return None;
    }
    let ko = ko.strip_prefix("ko:").unwrap_or(ko);
    if ko.len() == 6 && ko.starts_with('K') && ko[1..].bytes().all(|b| b.is_ascii_digit()) {
        Some(ko)
    } else {
        None
    }
}

/// Count KOs in one annotation file. Comment lines start with `#`; the one
/// whose tab separated columns include `KEGG_ko` is the header, and must
/// come before any data line.
pub fn count_kos<R: BufRead>(reader: R, source: &Path) -> Result<BTreeMap<String, u32>> {
    let mut ko_column = None;
    let mut counts = BTreeMap::new();
    for line in reader.lines() {
        let line = line.map_err(|e| MagrefError::io(source, e))?;
        if let Some(comment) = line.strip_prefix('#') {
            if let Some(i) = comment.split('\t').position(|c| c == KO_COLUMN) {
                ko_column = Some(i);
            }
            continue;
        }
        let ko_column = ko_column.ok_or_else(|| {
            MagrefError::schema(source, format!("no header line containing '{}' before data", KO_COLUMN))
        })?;
        let field = match line.split('\t').nth(ko_column) {
            Some(f) => f,
            None => continue,
        };
        for ko in parse_ko_field(field) {
            *counts.entry(ko.to_string()).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn open_maybe_gzipped(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MagrefError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => MagrefError::io(path, e),
    })?;
    let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Count KOs for every `*.emapper.annotations*` file in a directory.
pub fn read_annotation_directory(dir: &Path) -> Result<KoCounts> {
    require_dir(dir)?;
    let files: Vec<String> = list_file_names(dir)?
        .into_iter()
        .filter(|n| n.contains(ANNOTATION_MARKER))
        .collect();
    if files.is_empty() {
        warn!("No *{}* files found in {}", ANNOTATION_MARKER, dir.display());
    }
    let mut to_return = KoCounts::new();
    for file_name in files {
        let path = dir.join(&file_name);
        let genome_id = genome_id_of_annotation_file(&file_name);
        debug!("Processing {} -> genome_id {}", path.display(), genome_id);
        let counts = count_kos(open_maybe_gzipped(&path)?, &path)?;
        let genome_counts = to_return.entry(genome_id.to_string()).or_default();
        for (ko, n) in counts {
            *genome_counts.entry(ko).or_insert(0) += n;
        }
    }
    Ok(to_return)
}

/// Write a gzipped genome by KO matrix: an `assembly` column then one
/// `ko:<KO>` column per KO seen anywhere, both axes sorted, zeros filled.
pub fn write_ko_table(counts: &KoCounts, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    let all_kos: BTreeSet<&String> = counts.values().flat_map(|c| c.keys()).collect();

    let file = File::create(path).map_err(|e| MagrefError::io(path, e))?;
    let mut out = BufWriter::new(GzEncoder::new(file, Compression::default()));
    let write = |out: &mut BufWriter<GzEncoder<File>>, fields: Vec<String>| {
        writeln!(out, "{}", fields.join("\t")).map_err(|e| MagrefError::io(path, e))
    };

    let mut header = vec!["assembly".to_string()];
    header.extend(all_kos.iter().map(|ko| format!("ko:{}", ko)));
    write(&mut out, header)?;
    for (genome_id, genome_counts) in counts {
        let mut row = vec![genome_id.clone()];
        row.extend(
            all_kos
                .iter()
                .map(|ko| genome_counts.get(*ko).copied().unwrap_or(0).to_string()),
        );
        write(&mut out, row)?;
    }
    let encoder = out
        .into_inner()
        .map_err(|e| MagrefError::io(path, e.into_error()))?;
    encoder.finish().map_err(|e| MagrefError::io(path, e))?;
    info!(
        "Wrote KO matrix with {} genomes and {} KOs to {}",
        counts.len(),
        all_kos.len(),
        path.display()
    );
    Ok(())
}

/// Rewrite the genome IDs of a gzipped KO table through an ID map. The
/// header line is copied; in every other line the first field is replaced by
/// its mapped ID and the rest copied verbatim, so both the long
/// `genome\tko\tcount` layout and the wide matrix are supported. A genome
/// missing from the map is an error.
pub fn rename_ko_table(input: &Path, id_map: &IdentifierMap, output: &Path) -> Result<usize> {
    let reader = open_maybe_gzipped(input)?;
    let context = input.display().to_string();

    let file = File::create(output).map_err(|e| MagrefError::io(output, e))?;
    let mut out = BufWriter::new(GzEncoder::new(file, Compression::default()));
    let mut num_rows = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| MagrefError::io(input, e))?;
        if i == 0 {
            writeln!(out, "{}", line).map_err(|e| MagrefError::io(output, e))?;
            continue;
        }
        let (genome_id, rest) = line
            .split_once('\t')
            .ok_or_else(|| MagrefError::schema(input, format!("line {} has a single field", i + 1)))?;
        let new_id = id_map.resolve_strict(genome_id, &context)?;
        writeln!(out, "{}\t{}", new_id, rest).map_err(|e| MagrefError::io(output, e))?;
        num_rows += 1;
    }
    let encoder = out
        .into_inner()
        .map_err(|e| MagrefError::io(output, e.into_error()))?;
    encoder.finish().map_err(|e| MagrefError::io(output, e))?;
    info!("Corrected KO table written to {} ({} rows)", output.display(), num_rows);
    Ok(num_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn read_gz(path: &Path) -> String {
        let mut s = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut s)
            .unwrap();
        s
    }

    fn write_gz(path: &Path, content: &str) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.write_all(content.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn test_genome_id_of_annotation_file() {
        assert_eq!(
            "NNF_AD15_mmlongv091.bin.1.1",
            genome_id_of_annotation_file("NNF_AD15_mmlongv091.bin.1.1.emapper.annotations")
        );
        assert_eq!("MAG0001", genome_id_of_annotation_file("MAG0001.annotations.tsv"));
    }

    #[test]
    fn test_parse_ko_field() {
        assert_eq!(vec!["K00001"], parse_ko_field("ko:K00001"));
        assert_eq!(vec!["K00001", "K00002"], parse_ko_field("ko:K00001,ko:K00002"));
        assert_eq!(vec!["K00001", "K00003"], parse_ko_field("K00001|K0002|K00003"));
        assert!(parse_ko_field("-").is_empty());
        assert!(parse_ko_field("na").is_empty());
        assert!(parse_ko_field("").is_empty());
        assert!(parse_ko_field("M00001").is_empty());
    }

    #[test]
    fn test_count_kos_requires_header() {
        init();
        let content = "## emapper-2.1.12\nquery\t-\n";
        assert!(matches!(
            count_kos(content.as_bytes(), Path::new("x.emapper.annotations")),
            Err(MagrefError::Schema { .. })
        ));
    }

    #[test]
    fn test_read_annotation_directory() {
        init();
        let counts = read_annotation_directory(Path::new("tests/data/eggnog")).unwrap();
        assert_eq!(vec!["MAG0001", "MAG0002"], counts.keys().collect::<Vec<_>>());
        let mag1 = &counts["MAG0001"];
        assert_eq!(Some(&2), mag1.get("K00001"));
        assert_eq!(Some(&1), mag1.get("K00002"));
        assert_eq!(Some(&1), counts["MAG0002"].get("K00003"));
    }

    #[test]
    fn test_write_ko_table() {
        init();
        let mut counts = KoCounts::new();
        counts
            .entry("MAG2".to_string())
            .or_default()
            .insert("K00003".to_string(), 2);
        let mag1 = counts.entry("MAG1".to_string()).or_default();
        mag1.insert("K00001".to_string(), 1);
        mag1.insert("K00003".to_string(), 4);

        let td = tempfile::TempDir::new().unwrap();
        let out = td.path().join("default_files/bacteria/ko.txt.gz");
        write_ko_table(&counts, &out).unwrap();
        assert_eq!(
            "assembly\tko:K00001\tko:K00003\nMAG1\t1\t4\nMAG2\t0\t2\n",
            read_gz(&out)
        );
    }

    #[test]
    fn test_rename_ko_table() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let input = td.path().join("ko_long.txt.gz");
        write_gz(
            &input,
            "genome\tko\tcount\nS1_bin.1\tK00001\t2\nS2_bin.1\tK00002\t1\n",
        );
        let map = IdentifierMap::from_path(
            &PathBuf::from("tests/data/id_map/id_map.tsv"),
            &crate::pipeline_config::GENOME_SUFFIXES,
        )
        .unwrap();
        let output = td.path().join("ko_renamed.txt.gz");
        assert_eq!(2, rename_ko_table(&input, &map, &output).unwrap());
        assert_eq!(
            "genome\tko\tcount\nMAG0001\tK00001\t2\nMAG0003\tK00002\t1\n",
            read_gz(&output)
        );

        write_gz(&input, "genome\tko\tcount\nbin.7\tK00001\t2\n");
        match rename_ko_table(&input, &map, &output) {
            Err(MagrefError::UnmappedIdentifier { id, .. }) => assert_eq!("bin.7", id),
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
