use std::time::Duration;

use bridge::{Envelope, MessageType};
use serde_json::Value;

use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{ResultBuilder, print_result};

/// Time for the socket task to write a fire-and-forget message before exit.
const FLUSH_GRACE: Duration = Duration::from_millis(100);

pub async fn run(ctx: &CommandContext, message_type: MessageType, payload: Option<&str>, wait: bool) -> Result<()> {
	let builder = ResultBuilder::new("send");
	let outcome = send(ctx, message_type, payload, wait).await;
	print_result(&builder.finish(&outcome), ctx.format);
	outcome.map(|_| ())
}

async fn send(ctx: &CommandContext, message_type: MessageType, payload: Option<&str>, wait: bool) -> Result<Envelope> {
	let payload = parse_payload(payload)?;

	if wait {
		let bridge = ctx.bridge();
		bridge.connect()?;
		let reply = bridge.send_raw_and_wait_for_reply(message_type, payload, None).await;
		bridge.disconnect();
		return Ok(reply?);
	}

	let bridge = ctx.connect_ready().await?;
	let sent = bridge.send_raw(message_type, payload)?;
	tokio::time::sleep(FLUSH_GRACE).await;
	bridge.disconnect();
	Ok(sent)
}

fn parse_payload(payload: Option<&str>) -> Result<Value> {
	match payload {
		Some(text) => serde_json::from_str(text).map_err(CliError::InvalidPayload),
		None => Ok(Value::Null),
	}
}
