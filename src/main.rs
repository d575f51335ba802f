use clap::Parser;
use kvfetch::cli::{commands, output, Cli};

fn main() {
    let cli = Cli::parse();
    kvfetch::logging::init(cli.verbose);

    if let Err(e) = commands::get::execute(&cli) {
        output::error(&e.to_string());
        if let Some(tip) = commands::get::tip_for(&e) {
            output::tip(tip);
        }
        std::process::exit(1);
    }
}
