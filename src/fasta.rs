use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use needletail::parse_fastx_file;

use crate::error::{MagrefError, Result};

const LINE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    /// Header text up to the first whitespace.
    pub id: String,
    /// Rest of the header line, if any.
    pub description: Option<String>,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    pub fn new(id: &str, seq: &[u8]) -> FastaRecord {
        FastaRecord {
            id: id.to_string(),
            description: None,
            seq: seq.to_vec(),
        }
    }

    pub fn from_header(header: &str, seq: Vec<u8>) -> FastaRecord {
        let header = header.trim();
        let (id, description) = match header.find(char::is_whitespace) {
            Some(i) => (&header[..i], Some(header[i..].trim().to_string())),
            None => (header, None),
        };
        FastaRecord {
            id: id.to_string(),
            description: description.filter(|d| !d.is_empty()),
            seq,
        }
    }

    /// ID and description as one string, for header matching.
    pub fn header(&self) -> String {
        match &self.description {
            Some(d) => format!("{} {}", self.id, d),
            None => self.id.clone(),
        }
    }
}

/// Read every record of a FASTA file, plain or gzipped. An empty file gives
/// no records.
pub fn read_fasta(path: &Path) -> Result<Vec<FastaRecord>> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MagrefError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => MagrefError::io(path, e),
    })?;
    if metadata.len() == 0 {
        debug!("FASTA file {} is empty", path.display());
        return Ok(vec![]);
    }

    let mut reader = parse_fastx_file(path).map_err(|e| MagrefError::Fasta {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut records = vec![];
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| MagrefError::Fasta {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let header = String::from_utf8_lossy(record.id()).to_string();
        records.push(FastaRecord::from_header(&header, record.seq().to_vec()));
    }
    trace!("Read {} sequences from {}", records.len(), path.display());
    Ok(records)
}

/// Write records with only their ID on the header line, sequences wrapped
/// at 60 characters.
pub fn write_fasta(path: &Path, records: &[FastaRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| MagrefError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        write_record(&mut writer, record).map_err(|e| MagrefError::io(path, e))?;
    }
    writer.flush().map_err(|e| MagrefError::io(path, e))?;
    debug!("Wrote {} sequences to {}", records.len(), path.display());
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, record: &FastaRecord) -> std::io::Result<()> {
    writeln!(writer, ">{}", record.id)?;
    for chunk in record.seq.chunks(LINE_WIDTH) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
