extern crate magref;

extern crate clap;
use clap::*;

#[macro_use]
extern crate log;

static PROGRAM_NAME: &str = "magref";

fn main() {
    let app = build_cli();
    let matches = app.clone().get_matches();

    let (name, m) = match matches.subcommand() {
        Some(s) => s,
        None => {
            eprintln!("No subcommand given, see --help");
            std::process::exit(1);
        }
    };
    if let Err(e) = magref::logging::init_logging_from_matches(m, PROGRAM_NAME, crate_version!()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = magref::subcommand_parsing::run_subcommand(name, m) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn build_cli() -> Command {
    let app = Command::new("magref")
        .version(crate_version!())
        .author(magref::AUTHOR)
        .about("Build PICRUSt2-compatible reference databases from metagenome assembled genomes")
        .arg_required_else_help(true);

    magref::subcommand_parsing::add_subcommands(app)
}
