use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = mdbinder::cli::Cli::parse();
    mdbinder::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let invocation = if cli.has_action() {
        cli.invocation()
    } else {
        mdbinder::wizard::run(&cli).context("interactive setup")?
    };
    tracing::debug!(?invocation, "resolved invocation");

    if invocation.build {
        mdbinder::scan::run(&invocation.build_args()).context("build")?;
    }
    if invocation.export {
        mdbinder::export::run(&invocation.export_args()).context("export")?;
    }
    if !invocation.build && !invocation.export {
        tracing::info!("nothing selected; exiting");
    }

    Ok(())
}
