use bridge::Request;
use tracing::info;

use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{ResultBuilder, print_result};

/// Sends one typed request and prints its reply.
pub async fn run<R: Request>(ctx: &CommandContext, command: &str, request: &R) -> Result<()> {
	let builder = ResultBuilder::new(command);
	let outcome = fetch(ctx, request).await;
	print_result(&builder.finish(&outcome), ctx.format);
	outcome.map(|_| ())
}

async fn fetch<R: Request>(ctx: &CommandContext, request: &R) -> Result<R::Reply> {
	let bridge = ctx.bridge();
	bridge.connect()?;
	let message_type = R::TYPE;
	info!(target = "bridge", %message_type, "sending request");
	let reply = bridge.request(request).await;
	bridge.disconnect();
	Ok(reply?)
}
