// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stderr: CLI tools are expected to report failures on stderr.
// - exit: Calling `std::process::exit()` is how the detection outcome reaches the shell.
#![allow(clippy::print_stderr, clippy::exit)]

use std::io;

use clap::Parser;
use hdetect_cli::{Cli, logging, run};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let code = match run(&cli, &mut io::stdout().lock(), &mut io::stderr().lock()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
