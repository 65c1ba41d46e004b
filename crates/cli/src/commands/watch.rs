use std::time::Duration;

use anyhow::Context;
use bridge::{BridgeEvent, Envelope, Listener};
use colored::Colorize;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord<'a> {
	event: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	reconnecting: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<&'a Envelope>,
}

pub async fn run(ctx: &CommandContext, reconnect_delay_ms: Option<u64>) -> Result<()> {
	let bridge = ctx.bridge();
	let (tx, mut rx) = mpsc::unbounded_channel();
	forward_events(&bridge, tx);
	bridge.connect()?;

	loop {
		let event = tokio::select! {
			event = rx.recv() => event,
			signal = interrupted() => {
				signal?;
				info!(target = "bridge", "interrupted");
				bridge.disconnect();
				return Ok(());
			}
		};
		let Some(event) = event else {
			return Ok(());
		};
		print_event(&event, ctx.format);

		if let BridgeEvent::Disconnected { reconnecting: false } = event {
			let Some(delay) = reconnect_delay_ms else {
				return Ok(());
			};
			tokio::select! {
				_ = tokio::time::sleep(Duration::from_millis(delay)) => bridge.connect()?,
				signal = interrupted() => return Ok(signal?),
			}
		}
	}
}

async fn interrupted() -> anyhow::Result<()> {
	tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")
}

fn forward_events(bridge: &bridge::Bridge, tx: mpsc::UnboundedSender<BridgeEvent>) {
	let sender = tx.clone();
	bridge.on(Listener::connecting(move || {
		let _ = sender.send(BridgeEvent::Connecting);
	}));
	let sender = tx.clone();
	bridge.on(Listener::connected(move || {
		let _ = sender.send(BridgeEvent::Connected);
	}));
	let sender = tx.clone();
	bridge.on(Listener::disconnected(move |reconnecting| {
		let _ = sender.send(BridgeEvent::Disconnected { reconnecting });
	}));
	bridge.on(Listener::message(move |envelope| {
		let _ = tx.send(BridgeEvent::Message(envelope.clone()));
	}));
}

fn print_event(event: &BridgeEvent, format: OutputFormat) {
	match format {
		OutputFormat::Json => print_json(&record(event), format),
		OutputFormat::Pretty => println!("{}", pretty_line(event)),
	}
}

fn record(event: &BridgeEvent) -> EventRecord<'_> {
	EventRecord {
		event: event.name(),
		reconnecting: match event {
			BridgeEvent::Disconnected { reconnecting } => Some(*reconnecting),
			_ => None,
		},
		message: match event {
			BridgeEvent::Message(envelope) => Some(envelope),
			_ => None,
		},
	}
}

fn pretty_line(event: &BridgeEvent) -> String {
	match event {
		BridgeEvent::Connecting => format!("{}", "connecting".yellow()),
		BridgeEvent::Connected => format!("{}", "connected".green().bold()),
		BridgeEvent::Disconnected { reconnecting } => format!("{} (reconnecting: {reconnecting})", "disconnected".red()),
		BridgeEvent::Message(envelope) => {
			let payload = serde_json::to_string(&envelope.payload).unwrap_or_default();
			let reply = envelope.reply_to.as_deref().map(|id| format!(" reply to {id}")).unwrap_or_default();
			format!("{} {}{} {}", envelope.when.dimmed(), envelope.message_type.as_str().cyan(), reply.dimmed(), payload)
		}
	}
}
