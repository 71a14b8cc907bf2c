//! Shared data types: control positions, roles, usage, artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// XY pad coordinates driving prompt construction.
///
/// `density` is the horizontal axis (0 = summary, 1 = verbose).
/// `creativity` is the vertical axis (0 = factual, 1 = creative), already
/// inverted from screen space by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPosition {
    pub density: f64,
    pub creativity: f64,
}

impl ControlPosition {
    pub fn new(density: f64, creativity: f64) -> Self {
        Self {
            density,
            creativity,
        }
    }

    /// Clamp both axes into [0, 1]. Pointer overshoot and NaN are forgiven
    /// rather than rejected; NaN falls back to the pad center.
    pub fn clamped(self) -> Self {
        Self {
            density: clamp_axis(self.density),
            creativity: clamp_axis(self.creativity),
        }
    }
}

impl Default for ControlPosition {
    fn default() -> Self {
        Self {
            density: 0.5,
            creativity: 0.5,
        }
    }
}

fn clamp_axis(v: f64) -> f64 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Agent persona selecting the base prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    #[default]
    Analyst,
    Writer,
    Researcher,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Analyst => "analyst",
            AgentRole::Writer => "writer",
            AgentRole::Researcher => "researcher",
        }
    }

    pub fn base_prompt(&self) -> &'static str {
        match self {
            AgentRole::Analyst => {
                "You are a financial analyst agent specialized in data-driven insights and market analysis."
            }
            AgentRole::Writer => {
                "You are a creative writer agent focused on compelling narratives and engaging content."
            }
            AgentRole::Researcher => {
                "You are a research agent that gathers, synthesizes, and analyzes information from multiple sources."
            }
        }
    }
}

/// A named agent node as proposed by roster generation. Not persisted;
/// lives only as data attached to UI nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRoleConfig {
    pub id: String,
    pub role: AgentRole,
    pub name: String,
    /// Machine-suggested pad position for this agent.
    pub suggested_position: ControlPosition,
}

/// Terminal token accounting for one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// USD, full precision; rounding is a display concern.
    pub estimated_cost: f64,
}

/// Immutable record of a completed execution's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    pub execution_id: String,
    pub filename: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_overshoot_into_unit_interval() {
        let p = ControlPosition::new(1.4, -0.2).clamped();
        assert_eq!(p.density, 1.0);
        assert_eq!(p.creativity, 0.0);
    }

    #[test]
    fn clamps_nan_to_center() {
        let p = ControlPosition::new(f64::NAN, 0.3).clamped();
        assert_eq!(p.density, 0.5);
        assert_eq!(p.creativity, 0.3);
    }

    #[test]
    fn in_range_positions_pass_through() {
        let p = ControlPosition::new(0.25, 0.75);
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn role_deserializes_from_lowercase() {
        let role: AgentRole = serde_json::from_str("\"writer\"").unwrap();
        assert_eq!(role, AgentRole::Writer);
    }
}
