use std::io;
use std::process;

use validate_ccpn::checker::{CheckOptions, ProjectChecker};
use validate_ccpn::cli::Cli;
use validate_ccpn::output::Output;

fn main() {
    let cli = Cli::parse_args();
    let options = CheckOptions::from_cli(&cli);
    let report = ProjectChecker::new(options).run(&cli.project_path);

    let stderr = io::stderr();
    let mut sink = stderr.lock();
    let _ = Output::new().render(&report, &mut sink);

    process::exit(report.status().code());
}
