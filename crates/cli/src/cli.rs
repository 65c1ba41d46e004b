use bridge::MessageType;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(about = "Talk to the in-game bridge from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Bridge host
	#[arg(long, global = true, env = "BRIDGE_HOST", default_value = bridge::DEFAULT_HOST)]
	pub host: String,

	/// Bridge port
	#[arg(long, global = true, env = "BRIDGE_PORT", default_value_t = bridge::DEFAULT_PORT)]
	pub port: u16,

	/// Reply timeout in milliseconds
	#[arg(long, global = true, env = "BRIDGE_TIMEOUT_MS", default_value_t = 10_000)]
	pub timeout_ms: u64,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Print lifecycle events and inbound messages until interrupted
	Watch {
		/// Reconnect after this many milliseconds instead of exiting on disconnect
		#[arg(long, value_name = "MS")]
		reconnect_delay_ms: Option<u64>,
	},

	/// Show the camera position
	Camera,

	/// Move the camera
	MoveCamera {
		#[arg(long, allow_negative_numbers = true)]
		x: f64,
		#[arg(long, allow_negative_numbers = true)]
		y: f64,
		#[arg(long)]
		zoom: f64,
	},

	/// List agents
	Agents {
		/// Leave out agents assigned to departments
		#[arg(long)]
		no_active: bool,
		/// Leave out agents in reserve
		#[arg(long)]
		no_reserve: bool,
	},

	/// Show one agent
	Agent { id: i64 },

	/// List departments
	#[command(alias = "depts")]
	Departments,

	/// Show energy and meltdown progress for the current day
	Progress,

	/// Leave the preparation phase and start the day
	StartManaging,

	/// Send any catalog message
	Send {
		/// Message type, e.g. CameraQuery
		message_type: MessageType,
		/// Payload fields as a JSON object
		#[arg(long, value_name = "JSON")]
		payload: Option<String>,
		/// Wait for the reply and print it
		#[arg(long)]
		wait: bool,
	},
}
