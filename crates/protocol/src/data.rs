//! Game state records carried by query responses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
	pub id: i64,
	pub name: String,
	pub level: i64,
	pub health: AgentHealth,
	pub stat_levels: AgentStats,
	pub weapon: WeaponSummary,
	pub armor: ArmorSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetails {
	pub id: i64,
	pub name: String,
	pub title_prefix: String,
	pub title_suffix: String,
	pub level: i64,
	pub current_health: AgentHealth,
	pub max_health: AgentHealth,
	pub stat_levels: AgentStats,
	pub base_stats: AgentStats,
	pub effective_stats: AgentStats,
	pub stat_exp: AgentStats,
	#[serde(rename = "departmentID")]
	pub department_id: String,
	pub department_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
	pub hp: f64,
	pub sanity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
	pub fortitude: f64,
	pub prudence: f64,
	pub temperance: f64,
	pub justice: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
	pub id: String,
	pub name: String,
	pub is_opened: bool,
	/// The bridge spells this field `assignedAgnts`.
	#[serde(rename = "assignedAgnts")]
	pub assigned_agents: Vec<AgentSummary>,
	pub open_agent_slots: i64,
	pub abnormalities: Vec<AbnormalitySummary>,
	pub core_suppression: CoreSuppressionDetails,
	pub mission: DepartmentMissionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSuppressionDetails {
	pub completed: bool,
	pub active: bool,
	pub available: bool,
	pub not_available_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMissionDetails {
	pub current: Option<MissionDetails>,
	pub available: Option<MissionDetails>,
	pub not_available_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionDetails {
	pub id: i64,
	pub title: String,
	pub desc: String,
	pub completed: bool,
	pub in_progress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbnormalitySummary {
	pub id: i64,
	pub name: String,
	pub rank: Rank,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponSummary {
	pub id: i64,
	pub name: String,
	pub rank: Rank,
	pub damage: DamageRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmorSummary {
	pub id: i64,
	pub name: String,
	pub rank: Rank,
	pub defenses: Defenses,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageRange {
	#[serde(rename = "type")]
	pub damage_type: DamageType,
	pub min: f64,
	pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defenses {
	pub red: DefenseType,
	pub white: DefenseType,
	pub black: DefenseType,
	pub pale: DefenseType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefenseValues {
	pub red: f64,
	pub white: f64,
	pub black: f64,
	pub pale: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QliphothMeltdownDetails {
	pub level: i64,
	pub steps_completed: i64,
	pub total_steps_until_meltdown: i64,
	pub upcoming_overload_count: Option<i64>,
	pub upcoming_ordeal: Option<OrdealDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrdealDetails {
	#[serde(rename = "type")]
	pub ordeal_type: String,
	pub name: String,
	pub rank: Rank,
	pub difficulty: OrdealType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
	Zayin,
	Teth,
	He,
	Waw,
	Aleph,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
	Red,
	White,
	Black,
	Pale,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefenseType {
	Vulnerable,
	Weak,
	Normal,
	Endure,
	Resistant,
	Immune,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdealType {
	Dawn,
	Noon,
	Dusk,
	Midnight,
	#[default]
	#[serde(other)]
	Unknown,
}
