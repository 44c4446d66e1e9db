use clap::Parser;
use strata_settings::{Cli, init_logger, initialize, run};
use strata_storage::watcher;
use tracing::debug;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ctx = initialize(&cli)?;
    let _log = init_logger(&cli, ctx.settings())?;

    let stdout = std::io::stdout();
    let result = run(&cli, &ctx, &mut stdout.lock());

    let stopped = watcher::shutdown();
    debug!(stopped, "File watchers stopped");
    result
}
