use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MagrefError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveredInput {
    Found(PathBuf),
    NotFound { searched: Vec<PathBuf> },
}

impl DiscoveredInput {
    pub fn first_existing<P: AsRef<Path>>(candidates: &[P]) -> DiscoveredInput {
        for candidate in candidates {
            if candidate.as_ref().exists() {
                return DiscoveredInput::Found(candidate.as_ref().to_path_buf());
            }
        }
        DiscoveredInput::NotFound {
            searched: candidates.iter().map(|c| c.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn of_path(path: &Path) -> DiscoveredInput {
        DiscoveredInput::first_existing(&[path])
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            DiscoveredInput::Found(p) => Some(p),
            DiscoveredInput::NotFound { .. } => None,
        }
    }

    pub fn required(self) -> Result<PathBuf> {
        match self {
            DiscoveredInput::Found(p) => Ok(p),
            DiscoveredInput::NotFound { searched } => {
                for s in &searched {
                    debug!("Searched for input at {}", s.display());
                }
                Err(MagrefError::MissingInput {
                    path: searched.into_iter().next().unwrap_or_default(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceMode {
    Symlink,
    Hardlink,
    Copy,
    Move,
}

impl PlaceMode {
    pub fn from_name(name: &str) -> Option<PlaceMode> {
        match name {
            "symlink" => Some(PlaceMode::Symlink),
            "hardlink" => Some(PlaceMode::Hardlink),
            "copy" => Some(PlaceMode::Copy),
            "move" => Some(PlaceMode::Move),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed,
    AlreadyPresent,
    Copied,
}

/// Put `src` at `dst`. An existing destination (including a dangling
/// symlink) is never overwritten.
pub fn place_file(src: &Path, dst: &Path, mode: PlaceMode) -> Result<PlaceOutcome> {
    if fs::symlink_metadata(dst).is_ok() {
        trace!("Destination {} already exists, not placing", dst.display());
        return Ok(PlaceOutcome::AlreadyPresent);
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| MagrefError::io(parent, e))?;
    }

    let link_result = match mode {
        PlaceMode::Symlink => {
            let target = fs::canonicalize(src).map_err(|e| MagrefError::io(src, e))?;
            std::os::unix::fs::symlink(&target, dst)
        }
        PlaceMode::Hardlink => fs::hard_link(src, dst),
        PlaceMode::Copy => {
            fs::copy(src, dst).map_err(|e| MagrefError::io(dst, e))?;
            return Ok(PlaceOutcome::Placed);
        }
        PlaceMode::Move => match fs::rename(src, dst) {
            Ok(()) => return Ok(PlaceOutcome::Placed),
            Err(_) => {
                // Different filesystems, fall back to copy then delete.
                fs::copy(src, dst).map_err(|e| MagrefError::io(dst, e))?;
                fs::remove_file(src).map_err(|e| MagrefError::io(src, e))?;
                return Ok(PlaceOutcome::Placed);
            }
        },
    };
    match link_result {
        Ok(()) => Ok(PlaceOutcome::Placed),
        Err(e) => {
            warn!("Link failed ({}); falling back to copy for {}", e, dst.display());
            fs::copy(src, dst).map_err(|e| MagrefError::io(dst, e))?;
            Ok(PlaceOutcome::Copied)
        }
    }
}

pub fn find_file_with_suffixes<S: AsRef<str>>(dir: &Path, base: &str, suffixes: &[S]) -> DiscoveredInput {
    let candidates: Vec<PathBuf> = suffixes
        .iter()
        .map(|s| dir.join(format!("{}{}", base, s.as_ref())))
        .collect();
    DiscoveredInput::first_existing(&candidates)
}

const FASTA_EXTENSIONS: [&str; 3] = [".fa", ".fna", ".fasta"];
const GZIP_SUFFIXES: [&str; 2] = ["", ".gz"];

#[derive(Debug)]
pub struct GenomeFileIndex {
    root: PathBuf,
    files: Vec<(String, PathBuf)>,
}

impl GenomeFileIndex {
    pub fn build(root: &Path) -> Result<GenomeFileIndex> {
        let mut files = vec![];
        collect_files(root, &mut files)?;
        files.sort_by(|a: &(String, PathBuf), b| a.1.cmp(&b.1));
        debug!("Found {} files under {}", files.len(), root.display());
        Ok(GenomeFileIndex {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn num_fasta_files(&self) -> usize {
        self.files
            .iter()
            .filter(|(name, _)| {
                FASTA_EXTENSIONS.iter().any(|ext| {
                    GZIP_SUFFIXES
                        .iter()
                        .any(|gz| name.ends_with(&format!("{}{}", ext, gz)))
                })
            })
            .count()
    }

    /// Exact `<id>.<ext>` names are tried before prefix matches, for both the
    /// `<id>` and `<id>_genomic` spellings.
    pub fn find_genome(&self, genome_id: &str) -> DiscoveredInput {
        let mut prefixes = vec![genome_id.to_string()];
        let untagged = genome_id.strip_suffix("_genomic").unwrap_or(genome_id);
        for p in &[untagged.to_string(), format!("{}_genomic", untagged)] {
            if !prefixes.contains(p) {
                prefixes.push(p.clone());
            }
        }

        let endings: Vec<String> = FASTA_EXTENSIONS
            .iter()
            .flat_map(|ext| GZIP_SUFFIXES.iter().map(move |gz| format!("{}{}", ext, gz)))
            .collect();

        for prefix in &prefixes {
            for ending in &endings {
                let exact = format!("{}{}", prefix, ending);
                if let Some((_, path)) = self.files.iter().find(|(name, _)| *name == exact) {
                    return DiscoveredInput::Found(path.clone());
                }
            }
        }
        // A prefix must end at a separator so MAG1 never picks up MAG10.
        for prefix in &prefixes {
            for ending in &endings {
                let found = self.files.iter().find(|(name, _)| {
                    name.ends_with(ending.as_str())
                        && name.starts_with(prefix.as_str())
                        && name[prefix.len()..]
                            .chars()
                            .next()
                            .map_or(false, |c| !c.is_ascii_alphanumeric())
                });
                if let Some((_, path)) = found {
                    return DiscoveredInput::Found(path.clone());
                }
            }
        }
        DiscoveredInput::NotFound {
            searched: vec![self.root.join(genome_id)],
        }
    }
}

fn collect_files(dir: &Path, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| MagrefError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MagrefError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push((name.to_string(), path.clone()));
        }
    }
    Ok(())
}

pub fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = vec![];
    for entry in fs::read_dir(dir).map_err(|e| MagrefError::io(dir, e))? {
        let entry = entry.map_err(|e| MagrefError::io(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

pub fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| MagrefError::io(dir, e))
}

pub fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(MagrefError::MissingInput {
            path: dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, ">c\nACGT\n").unwrap();
    }

    #[test]
    fn test_discovered_input() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let present = td.path().join("b.tsv");
        touch(&present);
        let missing = td.path().join("a.tsv");
        assert_eq!(
            DiscoveredInput::Found(present.clone()),
            DiscoveredInput::first_existing(&[&missing, &present])
        );
        assert!(matches!(
            DiscoveredInput::of_path(&missing).required(),
            Err(MagrefError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_place_symlink_is_idempotent() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let src = td.path().join("src/MAG1.fa");
        touch(&src);
        let dst = td.path().join("bins/bacteria/MAG1.fa");
        assert_eq!(PlaceOutcome::Placed, place_file(&src, &dst, PlaceMode::Symlink).unwrap());
        assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
        assert_eq!(
            PlaceOutcome::AlreadyPresent,
            place_file(&src, &dst, PlaceMode::Copy).unwrap()
        );
        assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_place_copy_and_move() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let src = td.path().join("MAG1.fa");
        touch(&src);
        let copied = td.path().join("copy/MAG1.fa");
        place_file(&src, &copied, PlaceMode::Copy).unwrap();
        assert!(src.exists());
        assert_eq!(">c\nACGT\n", fs::read_to_string(&copied).unwrap());

        let moved = td.path().join("moved/MAG1.fa");
        place_file(&src, &moved, PlaceMode::Move).unwrap();
        assert!(!src.exists());
        assert!(moved.exists());
    }

    #[test]
    fn test_find_file_with_suffixes() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        touch(&td.path().join("MAG0002.fna.gz"));
        assert_eq!(
            DiscoveredInput::Found(td.path().join("MAG0002.fna.gz")),
            find_file_with_suffixes(td.path(), "MAG0002", &crate::pipeline_config::GENOME_SUFFIXES)
        );
        assert!(find_file_with_suffixes(td.path(), "MAG0003", &[".fa"])
            .path()
            .is_none());
    }

    #[test]
    fn test_genome_file_index() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        touch(&td.path().join("bacteria/MAG1_genomic.fna.gz"));
        touch(&td.path().join("archaea/deep/MAG2.fa"));
        touch(&td.path().join("archaea/MAG3.contigs.fasta"));
        touch(&td.path().join("notes.txt"));
        let index = GenomeFileIndex::build(td.path()).unwrap();
        assert_eq!(4, index.len());
        assert_eq!(3, index.num_fasta_files());
        assert_eq!(
            Some(td.path().join("bacteria/MAG1_genomic.fna.gz").as_path()),
            index.find_genome("MAG1").path()
        );
        assert_eq!(
            Some(td.path().join("archaea/deep/MAG2.fa").as_path()),
            index.find_genome("MAG2_genomic").path()
        );
        assert_eq!(
            Some(td.path().join("archaea/MAG3.contigs.fasta").as_path()),
            index.find_genome("MAG3").path()
        );
        assert!(index.find_genome("MAG4").path().is_none());
    }

    #[test]
    fn test_find_genome_prefers_exact_name() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        touch(&td.path().join("MAG1.fna"));
        touch(&td.path().join("MAG10.fa"));
        touch(&td.path().join("MAG2.contigs.fa"));
        touch(&td.path().join("MAG20.fa"));
        let index = GenomeFileIndex::build(td.path()).unwrap();
        assert_eq!(
            Some(td.path().join("MAG1.fna").as_path()),
            index.find_genome("MAG1").path()
        );
        assert_eq!(
            Some(td.path().join("MAG2.contigs.fa").as_path()),
            index.find_genome("MAG2").path()
        );
        assert!(index.find_genome("MAG").path().is_none());
    }
}
