mod cli;
mod jq_exec;

use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
