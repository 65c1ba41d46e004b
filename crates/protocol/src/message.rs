//! Message catalog: the closed set of message types and their payloads.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::{AgentDetails, AgentSummary, DepartmentSummary, OrdealType, QliphothMeltdownDetails};

/// A payload record that travels inside an [`Envelope`](crate::Envelope).
pub trait Payload: Serialize + DeserializeOwned {
	/// Type tag written to the envelope's `type` field.
	const TYPE: MessageType;
}

/// A payload the bridge answers with a specific reply type.
pub trait Request: Payload {
	type Reply: Payload;
}

macro_rules! message_types {
	($($name:ident),+ $(,)?) => {
		/// Every message type the bridge understands.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		pub enum MessageType {
			$($name),+
		}

		impl MessageType {
			/// All message types in catalog order.
			pub const ALL: &'static [MessageType] = &[$(MessageType::$name),+];

			/// Wire name of this type.
			pub fn as_str(self) -> &'static str {
				match self {
					$(MessageType::$name => stringify!($name)),+
				}
			}
		}
	};
}

message_types! {
	Ready,
	Error,
	EnterPrepPhase,
	ExitPrepPhase,
	EnterManagePhase,
	ExitManagePhase,
	CameraQuery,
	CameraResponse,
	MoveCameraCommand,
	MoveCameraResult,
	AgentListQuery,
	AgentListResponse,
	AgentDetailsQuery,
	AgentDetailsResponse,
	DepartmentListQuery,
	DepartmentListResponse,
	ManageProgressQuery,
	ManageProgressResponse,
	StartManagingCommand,
	StartManagingResult,
}

impl fmt::Display for MessageType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Unrecognized message type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
	type Err = UnknownMessageType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		MessageType::ALL
			.iter()
			.copied()
			.find(|ty| ty.as_str() == s)
			.ok_or_else(|| UnknownMessageType(s.to_string()))
	}
}

macro_rules! payload {
	($($ty:ident => $tag:ident),+ $(,)?) => {
		$(impl Payload for $ty {
			const TYPE: MessageType = MessageType::$tag;
		})+
	};
}

macro_rules! request {
	($($req:ident => $reply:ident),+ $(,)?) => {
		$(impl Request for $req {
			type Reply = $reply;
		})+
	};
}

/// Handshake sent by the bridge; the envelope carries the assigned `clientID`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ready {}

/// Failure reply to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
	pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterPrepPhase {
	pub day: i64,
	pub lob_points: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitPrepPhase {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterManagePhase {
	pub day: i64,
	pub energy_quota: f64,
	pub max_ordeal_type: OrdealType,
	pub core_suppression_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitManagePhase {}

/// Asks for the current camera position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraQuery {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraResponse {
	pub x: f64,
	pub y: f64,
	pub zoom: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveCameraCommand {
	pub x: f64,
	pub y: f64,
	pub zoom: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveCameraResult {}

/// Lists agents. `None` leaves the filter to the bridge's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentListQuery {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub include_active: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub include_reserve: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentListResponse {
	pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDetailsQuery {
	#[serde(rename = "agentID")]
	pub agent_id: i64,
}

/// `agent` is `None` when no agent has the requested id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDetailsResponse {
	pub agent: Option<AgentDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentListQuery {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentListResponse {
	pub departments: Vec<DepartmentSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManageProgressQuery {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageProgressResponse {
	pub current_energy: f64,
	pub energy_quota: f64,
	pub qliphoth_meltdown: QliphothMeltdownDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartManagingCommand {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartManagingResult {
	pub starting: bool,
	pub can_start: bool,
	pub department_with_missing_agents: Option<String>,
}

payload! {
	Ready => Ready,
	ErrorReply => Error,
	EnterPrepPhase => EnterPrepPhase,
	ExitPrepPhase => ExitPrepPhase,
	EnterManagePhase => EnterManagePhase,
	ExitManagePhase => ExitManagePhase,
	CameraQuery => CameraQuery,
	CameraResponse => CameraResponse,
	MoveCameraCommand => MoveCameraCommand,
	MoveCameraResult => MoveCameraResult,
	AgentListQuery => AgentListQuery,
	AgentListResponse => AgentListResponse,
	AgentDetailsQuery => AgentDetailsQuery,
	AgentDetailsResponse => AgentDetailsResponse,
	DepartmentListQuery => DepartmentListQuery,
	DepartmentListResponse => DepartmentListResponse,
	ManageProgressQuery => ManageProgressQuery,
	ManageProgressResponse => ManageProgressResponse,
	StartManagingCommand => StartManagingCommand,
	StartManagingResult => StartManagingResult,
}

request! {
	CameraQuery => CameraResponse,
	MoveCameraCommand => MoveCameraResult,
	AgentListQuery => AgentListResponse,
	AgentDetailsQuery => AgentDetailsResponse,
	DepartmentListQuery => DepartmentListResponse,
	ManageProgressQuery => ManageProgressResponse,
	StartManagingCommand => StartManagingResult,
}
