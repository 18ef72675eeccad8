use std::path::PathBuf;

use bird_tool_utils::clap_utils::add_clap_verbosity_flags;
use clap::*;

use crate::choose_best_genome::{choose_best_genomes, default_output_directory, ChooseBestInputs};
use crate::domain_classification::{split_genomes_by_domain, DomainSplitInputs};
use crate::error::{MagrefError, Result};
use crate::genome_files::PlaceMode;
use crate::genome_metadata::Domain;
use crate::identifiers::IdentifierMap;
use crate::ko_table::{read_annotation_directory, rename_ko_table, write_ko_table};
use crate::phylogeny_files::{phylip_to_fasta, write_raxml_info};
use crate::pipeline_config::PipelineConfig;
use crate::quality_filter::{filter_by_quality, filter_reference_genomes, QualityFilterInputs, ReferenceFilterInputs};
use crate::rrna_copies::{count_16s_copies, default_copy_table_output, filter_copy_table, pick_single_16s, read_allow_list};

/// Parse a percentage argument, which must lie between 0 and 100.
pub fn parse_percentage(m: &ArgMatches, parameter: &str) -> std::result::Result<Option<f64>, String> {
    match m.try_get_one::<String>(parameter).ok().flatten() {
        Some(value) => {
            let percentage: f64 = value
                .parse()
                .map_err(|_| format!("Unable to parse --{} '{}' as a number", parameter, value))?;
            if !(0.0..=100.0).contains(&percentage) {
                error!("Invalid percentage: '{}'", percentage);
                return Err(format!(
                    "Invalid percentage specified for --{}: '{}'",
                    parameter, percentage
                ));
            }
            debug!("Using {} {}%", parameter, percentage);
            Ok(Some(percentage))
        }
        None => Ok(None),
    }
}

fn required_path(m: &ArgMatches, parameter: &str) -> Result<PathBuf> {
    m.get_one::<String>(parameter)
        .map(PathBuf::from)
        .ok_or_else(|| MagrefError::InvalidArgument(format!("--{} must be specified", parameter)))
}

fn optional_path(m: &ArgMatches, parameter: &str) -> Option<PathBuf> {
    m.try_get_one::<String>(parameter)
        .ok()
        .flatten()
        .map(PathBuf::from)
}

fn path_list(m: &ArgMatches, parameter: &str) -> Vec<PathBuf> {
    m.try_get_many::<String>(parameter)
        .ok()
        .flatten()
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default()
}

fn parse_domain(value: &str) -> Result<Domain> {
    match Domain::from_label(value) {
        Domain::Unknown => Err(MagrefError::InvalidArgument(format!(
            "Unknown domain '{}', expected 'bacteria' or 'archaea'",
            value
        ))),
        d => Ok(d),
    }
}

fn domain_list(m: &ArgMatches) -> Result<Vec<Domain>> {
    match m.get_many::<String>("domains") {
        Some(values) => values.map(|v| parse_domain(v)).collect(),
        None => Ok(vec![Domain::Bacteria, Domain::Archaea]),
    }
}

/// Build the pipeline configuration from whichever of the shared arguments
/// a subcommand defines, falling back to defaults.
pub fn pipeline_config_from_matches(m: &ArgMatches) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default();
    if let Some(c) = parse_percentage(m, "min-completeness").map_err(MagrefError::InvalidArgument)? {
        config.min_completeness = c;
    }
    if let Some(c) = parse_percentage(m, "max-contamination").map_err(MagrefError::InvalidArgument)? {
        config.max_contamination = c;
    }
    if let Some(mode) = m.try_get_one::<String>("place-mode").ok().flatten() {
        config.place_mode = PlaceMode::from_name(mode)
            .ok_or_else(|| MagrefError::InvalidArgument(format!("Unknown --place-mode '{}'", mode)))?;
    }
    if let Ok(Some(true)) = m.try_get_one::<bool>("append-genomic-suffix").map(|v| v.copied()) {
        config.append_genomic_suffix = true;
    }
    if let Some(max) = m.try_get_one::<u32>("max-copies").ok().flatten() {
        config.max_16s_copies = *max;
    }
    Ok(config)
}

fn common_args(cmd: Command) -> Command {
    add_clap_verbosity_flags(cmd).arg(
        Arg::new("log-file")
            .long("log-file")
            .help("Also append log messages to this file"),
    )
}

fn quality_threshold_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("min-completeness")
            .long("min-completeness")
            .help("Genomes with less than this percentage of completeness are excluded")
            .default_value(crate::DEFAULT_MIN_COMPLETENESS),
    )
    .arg(
        Arg::new("max-contamination")
            .long("max-contamination")
            .help("Genomes with greater than this percentage of contamination are excluded")
            .default_value(crate::DEFAULT_MAX_CONTAMINATION),
    )
}

fn place_mode_arg(default: &'static str) -> Arg {
    Arg::new("place-mode")
        .long("place-mode")
        .value_parser(["symlink", "hardlink", "copy", "move"])
        .default_value(default)
        .help("How genome files are put in place. Links fall back to copies when they cannot be made.")
}

fn domains_arg() -> Arg {
    Arg::new("domains")
        .long("domains")
        .num_args(1..)
        .value_parser(["bacteria", "archaea"])
        .help("Domains to process [default: bacteria archaea]")
}

pub fn add_classify_domains_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("classify-domains"))
            .about("Split reformatted genomes into bacterial and archaeal directories using GTDB-Tk")
            .arg(
                Arg::new("gtdbtk-summaries")
                    .long("gtdbtk-summaries")
                    .num_args(1..)
                    .required(true)
                    .help("GTDB-Tk summary files, e.g. gtdbtk.bac120.summary.tsv gtdbtk.ar53.summary.tsv"),
            )
            .arg(
                Arg::new("id-map")
                    .long("id-map")
                    .required(true)
                    .help("Tab separated map of original genome names to reformatted IDs"),
            )
            .arg(
                Arg::new("genome-directory")
                    .long("genome-directory")
                    .required(true)
                    .help("Directory of reformatted genome FASTA files"),
            )
            .arg(
                Arg::new("output-directory")
                    .long("output-directory")
                    .help("Where per-domain directories are made [default: <genome-directory>/genomes_to_search_barrnap]"),
            )
            .arg(place_mode_arg("move")),
    )
}

pub fn run_classify_domains_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let genome_directory = required_path(m, "genome-directory")?;
    let inputs = DomainSplitInputs {
        summaries: path_list(m, "gtdbtk-summaries"),
        id_map: required_path(m, "id-map")?,
        output_directory: optional_path(m, "output-directory")
            .unwrap_or_else(|| genome_directory.join("genomes_to_search_barrnap")),
        genome_directory,
    };
    split_genomes_by_domain(&inputs, &config)?;
    Ok(())
}

pub fn add_quality_filter_subcommand(app: Command) -> Command {
    app.subcommand(
        quality_threshold_args(common_args(Command::new("quality-filter")))
            .about("Filter genomes by CheckM completeness and contamination, split by domain")
            .arg(
                Arg::new("checkm-results")
                    .long("checkm-results")
                    .required(true)
                    .help("CheckM output: text table, --tab_table or three column genome/completeness/contamination"),
            )
            .arg(
                Arg::new("output-directory")
                    .long("output-directory")
                    .required(true)
                    .help("Directory for filtered tables, ID lists and bins/"),
            )
            .arg(
                Arg::new("genome-directories")
                    .long("genome-directories")
                    .num_args(1..)
                    .help("Candidate directories of genome FASTA files, the first existing is used. Without this no genome files are placed."),
            )
            .arg(place_mode_arg("symlink"))
            .arg(
                Arg::new("append-genomic-suffix")
                    .long("append-genomic-suffix")
                    .action(ArgAction::SetTrue)
                    .help("Write IDs in the domain lists as <id>_genomic"),
            ),
    )
}

pub fn run_quality_filter_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let inputs = QualityFilterInputs {
        checkm_table: required_path(m, "checkm-results")?,
        output_directory: required_path(m, "output-directory")?,
        genome_directories: path_list(m, "genome-directories"),
    };
    filter_by_quality(&inputs, &config)?;
    Ok(())
}

pub fn add_gtdb_filter_subcommand(app: Command) -> Command {
    app.subcommand(
        quality_threshold_args(common_args(Command::new("gtdb-filter")))
            .about("Move GTDB reference genomes failing quality thresholds out of the genome directories")
            .arg(
                Arg::new("gtdb-metadata")
                    .long("gtdb-metadata")
                    .num_args(1..)
                    .required(true)
                    .help("GTDB metadata tables, e.g. bac120_metadata_r220.tsv"),
            )
            .arg(
                Arg::new("genome-directories")
                    .long("genome-directories")
                    .num_args(1..)
                    .required(true)
                    .help("Directories of <accession>_genomic.fna.gz files"),
            )
            .arg(
                Arg::new("excluded-directory")
                    .long("excluded-directory")
                    .required(true)
                    .help("Where failing genome files are moved"),
            ),
    )
}

pub fn run_gtdb_filter_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let inputs = ReferenceFilterInputs {
        metadata_tables: path_list(m, "gtdb-metadata"),
        genome_directories: path_list(m, "genome-directories"),
        excluded_directory: required_path(m, "excluded-directory")?,
    };
    filter_reference_genomes(&inputs, &config)?;
    Ok(())
}

pub fn add_count_16s_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("count-16s"))
            .about("Count 16S genes per genome in barrnap output and split single from multiple copy genomes")
            .arg(
                Arg::new("root")
                    .long("root")
                    .required(true)
                    .help("Directory containing <domain>/<genome>_rRNA.fna files; outputs are written here too"),
            )
            .arg(domains_arg()),
    )
}

pub fn run_count_16s_subcommand(m: &ArgMatches) -> Result<()> {
    let root = required_path(m, "root")?;
    for domain in domain_list(m)? {
        count_16s_copies(&root, domain)?;
    }
    Ok(())
}

pub fn add_single_16s_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("single-16s"))
            .about("Pick the longest 16S sequence of each genome, preferring clustered centroids")
            .arg(
                Arg::new("root")
                    .long("root")
                    .required(true)
                    .help("Directory containing <domain>_16S_clustered and <domain>_16S_single"),
            )
            .arg(domains_arg())
            .arg(
                Arg::new("checkm-filtered")
                    .long("checkm-filtered")
                    .help("Only keep genomes listed in this quality table, e.g. checkm_filtered.tsv"),
            ),
    )
}

pub fn run_single_16s_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let root = required_path(m, "root")?;
    let allow_list = match optional_path(m, "checkm-filtered") {
        Some(path) => Some(read_allow_list(&path, &config)?),
        None => None,
    };
    for domain in domain_list(m)? {
        pick_single_16s(&root, domain, allow_list.as_ref())?;
    }
    Ok(())
}

pub fn add_choose_best_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("choose-best"))
            .about("Choose the best quality genome to represent each 16S cluster and relabel the aligned centroids")
            .arg(
                Arg::new("clusters")
                    .long("clusters")
                    .required(true)
                    .help("vsearch .uc file, or a table whose last two columns are representative and member"),
            )
            .arg(
                Arg::new("aligned-fasta")
                    .long("aligned-fasta")
                    .required(true)
                    .help("Aligned 16S centroid sequences"),
            )
            .arg(
                Arg::new("metadata")
                    .long("metadata")
                    .required(true)
                    .help("Genome quality table, e.g. checkm_filtered.tsv"),
            )
            .arg(
                Arg::new("domain")
                    .long("domain")
                    .required(true)
                    .value_parser(["bacteria", "archaea"])
                    .help("Domain of the clustered sequences"),
            )
            .arg(
                Arg::new("id-map")
                    .long("id-map")
                    .help("Map of original genome names to the IDs used in the sequences"),
            )
            .arg(
                Arg::new("output-directory")
                    .long("output-directory")
                    .help("Output directory [default: directory of --aligned-fasta]"),
            ),
    )
}

pub fn run_choose_best_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let aligned_fasta = required_path(m, "aligned-fasta")?;
    let domain = parse_domain(
        m.get_one::<String>("domain")
            .map(|s| s.as_str())
            .unwrap_or_default(),
    )?;
    let inputs = ChooseBestInputs {
        clusters: required_path(m, "clusters")?,
        metadata: required_path(m, "metadata")?,
        id_map: optional_path(m, "id-map"),
        output_directory: optional_path(m, "output-directory")
            .unwrap_or_else(|| default_output_directory(&aligned_fasta)),
        domain,
        aligned_fasta,
    };
    choose_best_genomes(&inputs, &config)?;
    Ok(())
}

pub fn add_phylip_to_fasta_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("phylip-to-fasta"))
            .about("Convert a relaxed PHYLIP alignment to FASTA")
            .arg(Arg::new("phylip").long("phylip").required(true).help("Relaxed PHYLIP input, e.g. *.raxml.reduced.phy"))
            .arg(Arg::new("output-fasta").long("output-fasta").required(true).help("FASTA output path")),
    )
}

pub fn run_phylip_to_fasta_subcommand(m: &ArgMatches) -> Result<()> {
    phylip_to_fasta(&required_path(m, "phylip")?, &required_path(m, "output-fasta")?)?;
    Ok(())
}

pub fn add_raxml_info_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("raxml-info"))
            .about("Write a RAxML 7 style info file from a RAxML-NG --evaluate log")
            .arg(Arg::new("raxml-log").long("raxml-log").required(true).help("RAxML-NG log, e.g. bacteria_raxml.raxml.log"))
            .arg(Arg::new("output-info").long("output-info").required(true).help("Info file to write, e.g. bacteria_raxml.raxml_info")),
    )
}

pub fn run_raxml_info_subcommand(m: &ArgMatches) -> Result<()> {
    write_raxml_info(&required_path(m, "raxml-log")?, &required_path(m, "output-info")?)?;
    Ok(())
}

pub fn add_filter_copies_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("filter-copies"))
            .about("Restrict a 16S copy number table to the genomes of a reference FASTA")
            .arg(
                Arg::new("reference-fasta")
                    .long("reference-fasta")
                    .required(true)
                    .help("Final reference sequences, e.g. bac_ref.fna"),
            )
            .arg(
                Arg::new("copies")
                    .long("copies")
                    .required(true)
                    .help("Headerless <genome> <count> table from count-16s"),
            )
            .arg(
                Arg::new("domain")
                    .long("domain")
                    .value_parser(["bacteria", "archaea"])
                    .default_value("bacteria")
                    .help("Domain, used to name the default output"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .help("Output table [default: <domain>_16S_copies.txt beside --reference-fasta]"),
            )
            .arg(
                Arg::new("max-copies")
                    .long("max-copies")
                    .value_parser(value_parser!(u32))
                    .default_value(crate::DEFAULT_MAX_16S_COPIES)
                    .help("Cap copy numbers at this value"),
            ),
    )
}

pub fn run_filter_copies_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let reference_fasta = required_path(m, "reference-fasta")?;
    let domain = parse_domain(
        m.get_one::<String>("domain")
            .map(|s| s.as_str())
            .unwrap_or("bacteria"),
    )?;
    let output = optional_path(m, "output").unwrap_or_else(|| default_copy_table_output(&reference_fasta, domain));
    filter_copy_table(&reference_fasta, &required_path(m, "copies")?, &output, &config)?;
    Ok(())
}

pub fn add_ko_table_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("ko-table"))
            .about("Build a gzipped genome by KO copy number table from eggNOG-mapper annotations")
            .arg(
                Arg::new("annotation-directory")
                    .long("annotation-directory")
                    .required(true)
                    .help("Directory of <genome>.emapper.annotations files"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .required(true)
                    .help("Output path, e.g. default_files/bacteria/ko.txt.gz"),
            ),
    )
}

pub fn run_ko_table_subcommand(m: &ArgMatches) -> Result<()> {
    let counts = read_annotation_directory(&required_path(m, "annotation-directory")?)?;
    write_ko_table(&counts, &required_path(m, "output")?)
}

pub fn add_rename_ko_subcommand(app: Command) -> Command {
    app.subcommand(
        common_args(Command::new("rename-ko"))
            .about("Rewrite the genome IDs of a gzipped KO table through an ID map")
            .arg(Arg::new("ko-table").long("ko-table").required(true).help("Gzipped KO table with original IDs"))
            .arg(
                Arg::new("id-map")
                    .long("id-map")
                    .required(true)
                    .help("Tab separated map of original genome names to new IDs"),
            )
            .arg(Arg::new("output").long("output").required(true).help("Gzipped KO table to write")),
    )
}

pub fn run_rename_ko_subcommand(m: &ArgMatches) -> Result<()> {
    let config = pipeline_config_from_matches(m)?;
    let id_map = IdentifierMap::from_path(&required_path(m, "id-map")?, &config.genome_suffixes)?;
    rename_ko_table(&required_path(m, "ko-table")?, &id_map, &required_path(m, "output")?)?;
    Ok(())
}

/// Add every subcommand to the top level command.
pub fn add_subcommands(app: Command) -> Command {
    let app = add_classify_domains_subcommand(app);
    let app = add_quality_filter_subcommand(app);
    let app = add_gtdb_filter_subcommand(app);
    let app = add_count_16s_subcommand(app);
    let app = add_single_16s_subcommand(app);
    let app = add_choose_best_subcommand(app);
    let app = add_phylip_to_fasta_subcommand(app);
    let app = add_raxml_info_subcommand(app);
    let app = add_filter_copies_subcommand(app);
    let app = add_ko_table_subcommand(app);
    add_rename_ko_subcommand(app)
}

/// Run the named subcommand.
pub fn run_subcommand(name: &str, m: &ArgMatches) -> Result<()> {
    match name {
        "classify-domains" => run_classify_domains_subcommand(m),
        "quality-filter" => run_quality_filter_subcommand(m),
        "gtdb-filter" => run_gtdb_filter_subcommand(m),
        "count-16s" => run_count_16s_subcommand(m),
        "single-16s" => run_single_16s_subcommand(m),
        "choose-best" => run_choose_best_subcommand(m),
        "phylip-to-fasta" => run_phylip_to_fasta_subcommand(m),
        "raxml-info" => run_raxml_info_subcommand(m),
        "filter-copies" => run_filter_copies_subcommand(m),
        "ko-table" => run_ko_table_subcommand(m),
        "rename-ko" => run_rename_ko_subcommand(m),
        _ => Err(MagrefError::InvalidArgument(format!("Unknown subcommand '{}'", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> Command {
        add_subcommands(Command::new("magref"))
    }

    fn sub_matches(args: &[&str]) -> ArgMatches {
        let matches = cli().try_get_matches_from(args).unwrap();
        matches.subcommand().unwrap().1.clone()
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let m = sub_matches(&["magref", "quality-filter", "--checkm-results", "c.txt", "--output-directory", "o"]);
        let config = pipeline_config_from_matches(&m).unwrap();
        assert_eq!(PipelineConfig::default(), config);
    }

    #[test]
    fn test_pipeline_config_overrides() {
        let m = sub_matches(&[
            "magref",
            "quality-filter",
            "--checkm-results",
            "c.txt",
            "--output-directory",
            "o",
            "--min-completeness",
            "80",
            "--max-contamination",
            "5.5",
            "--place-mode",
            "copy",
            "--append-genomic-suffix",
        ]);
        let config = pipeline_config_from_matches(&m).unwrap();
        assert_eq!(80.0, config.min_completeness);
        assert_eq!(5.5, config.max_contamination);
        assert_eq!(PlaceMode::Copy, config.place_mode);
        assert!(config.append_genomic_suffix);

        let m = sub_matches(&["magref", "filter-copies", "--reference-fasta", "r", "--copies", "c", "--max-copies", "7"]);
        assert_eq!(7, pipeline_config_from_matches(&m).unwrap().max_16s_copies);
    }

    #[test]
    fn test_invalid_percentage() {
        let m = sub_matches(&[
            "magref",
            "gtdb-filter",
            "--gtdb-metadata",
            "m.tsv",
            "--genome-directories",
            "g",
            "--excluded-directory",
            "x",
            "--max-contamination",
            "101",
        ]);
        assert!(parse_percentage(&m, "max-contamination").is_err());
        assert!(matches!(
            pipeline_config_from_matches(&m),
            Err(MagrefError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_domain_list() {
        let m = sub_matches(&["magref", "count-16s", "--root", "r"]);
        assert_eq!(vec![Domain::Bacteria, Domain::Archaea], domain_list(&m).unwrap());
        let m = sub_matches(&["magref", "count-16s", "--root", "r", "--domains", "archaea"]);
        assert_eq!(vec![Domain::Archaea], domain_list(&m).unwrap());
    }
}
