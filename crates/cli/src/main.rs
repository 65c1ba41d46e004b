use bridge_cli::{cli::Cli, commands, context::CommandContext, logging};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let ctx = CommandContext::new(&cli);
	if let Err(err) = commands::dispatch(cli.command, &ctx).await {
		error!(target = "bridge", error = %err, "command failed");
		std::process::exit(1);
	}
}
