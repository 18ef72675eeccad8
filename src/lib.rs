pub mod choose_best_genome;
pub mod cluster_membership;
pub mod domain_classification;
pub mod error;
pub mod fasta;
pub mod genome_files;
pub mod genome_metadata;
pub mod identifiers;
pub mod ko_table;
pub mod logging;
pub mod phylogeny_files;
pub mod pipeline_config;
pub mod quality_filter;
pub mod representative_selection;
pub mod rrna_copies;
pub mod sequence_rewriter;
pub mod subcommand_parsing;

#[macro_use]
extern crate log;
extern crate clap;
#[macro_use]
extern crate lazy_static;

pub const DEFAULT_MIN_COMPLETENESS: &str = "90";
pub const DEFAULT_MAX_CONTAMINATION: &str = "10";
pub const DEFAULT_MAX_16S_COPIES: &str = "10";

pub const AUTHOR: &str = "magref developers";
