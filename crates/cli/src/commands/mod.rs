mod query;
mod send;
mod watch;

use bridge::protocol::{
	AgentDetailsQuery, AgentListQuery, CameraQuery, DepartmentListQuery, ManageProgressQuery, MoveCameraCommand, StartManagingCommand,
};

use crate::cli::Commands;
use crate::context::CommandContext;
use crate::error::Result;

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<()> {
	match command {
		Commands::Watch { reconnect_delay_ms } => watch::run(ctx, reconnect_delay_ms).await,
		Commands::Camera => query::run(ctx, "camera", &CameraQuery {}).await,
		Commands::MoveCamera { x, y, zoom } => query::run(ctx, "move-camera", &MoveCameraCommand { x, y, zoom }).await,
		Commands::Agents { no_active, no_reserve } => {
			let request = AgentListQuery {
				include_active: no_active.then_some(false),
				include_reserve: no_reserve.then_some(false),
			};
			query::run(ctx, "agents", &request).await
		}
		Commands::Agent { id } => query::run(ctx, "agent", &AgentDetailsQuery { agent_id: id }).await,
		Commands::Departments => query::run(ctx, "departments", &DepartmentListQuery {}).await,
		Commands::Progress => query::run(ctx, "progress", &ManageProgressQuery {}).await,
		Commands::StartManaging => query::run(ctx, "start-managing", &StartManagingCommand {}).await,
		Commands::Send { message_type, payload, wait } => send::run(ctx, message_type, payload.as_deref(), wait).await,
	}
}
