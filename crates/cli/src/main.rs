use std::process::ExitCode;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = lingoforge_cli::Cli::parse();
    lingoforge_observability::init_with(cli.log_format);

    lingoforge_cli::run(cli).await
}
