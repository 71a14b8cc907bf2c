//! Roster generation: a natural-language goal becomes a team of agents
//!
//! One non-streaming upstream call with a fixed meta-prompt, reusing the
//! gateway's request path. The model writes JSON; anything unparseable
//! falls back to a single general analyst so the UI always gets a roster.

use serde::{Deserialize, Serialize};

use crate::client::{self, ChatParams};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AgentRole, AgentRoleConfig, ControlPosition};

/// Low temperature keeps the structured output parseable.
const ROSTER_TEMPERATURE: f32 = 0.3;
const ROSTER_MAX_TOKENS: u32 = 1024;

const META_PROMPT: &str = r#"You are an AI architect that designs agent teams.

Given a user's goal, output a JSON configuration for a team of AI agents.

RULES:
1. Use 1-3 agents maximum (keep it simple)
2. Each agent must have:
   - id: unique identifier (e.g., "agent-1")
   - role: one of ["analyst", "writer", "researcher"]
   - name: descriptive name (e.g., "Market Analyst")
   - suggested_position: recommended pad position as {"density": 0.0-1.0, "creativity": 0.0-1.0}
     - density: 0 = summary, 1 = verbose
     - creativity: 0 = factual, 1 = creative

OUTPUT FORMAT (strict JSON):
{
  "agents": [
    {
      "id": "agent-1",
      "role": "researcher",
      "name": "Data Researcher",
      "suggested_position": {"density": 0.6, "creativity": 0.2}
    }
  ],
  "suggested_query": "A refined version of the user's goal as a clear task"
}

IMPORTANT: Output ONLY valid JSON, no markdown, no explanation."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub agents: Vec<AgentRoleConfig>,
    pub suggested_query: String,
}

/// Generate a roster for a goal via the upstream model.
pub async fn generate_roster(config: &Config, goal: &str) -> Result<Roster> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(Error::Validation("goal must not be empty".into()));
    }

    let api_key = config.require_api_key()?.to_string();
    let response = client::complete_simple(ChatParams {
        api_key,
        model: config.model.clone(),
        system_prompt: META_PROMPT.to_string(),
        user_message: goal.to_string(),
        temperature: ROSTER_TEMPERATURE,
        max_tokens: ROSTER_MAX_TOKENS,
    })
    .await?;

    Ok(parse_roster(&response, goal))
}

/// Parse the model's JSON, tolerating markdown code fences. Unparseable
/// output degrades to the single-analyst fallback rather than an error.
pub fn parse_roster(response: &str, goal: &str) -> Roster {
    let cleaned = strip_code_fences(response.trim());
    match serde_json::from_str::<Roster>(cleaned) {
        Ok(roster) if !roster.agents.is_empty() => roster,
        _ => {
            tracing::warn!("roster output unparseable, using fallback agent");
            fallback_roster(goal)
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn fallback_roster(goal: &str) -> Roster {
    Roster {
        agents: vec![AgentRoleConfig {
            id: "agent-1".into(),
            role: AgentRole::Analyst,
            name: "General Agent".into(),
            suggested_position: ControlPosition::default(),
        }],
        suggested_query: goal.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "agents": [
            {"id": "agent-1", "role": "researcher", "name": "Crypto Researcher",
             "suggested_position": {"density": 0.6, "creativity": 0.2}},
            {"id": "agent-2", "role": "writer", "name": "Report Writer",
             "suggested_position": {"density": 0.3, "creativity": 0.7}}
        ],
        "suggested_query": "Research crypto equities and draft a risk report"
    }"#;

    #[test]
    fn parses_plain_json() {
        let roster = parse_roster(VALID, "goal");
        assert_eq!(roster.agents.len(), 2);
        assert_eq!(roster.agents[0].role, AgentRole::Researcher);
        assert_eq!(roster.agents[1].suggested_position.creativity, 0.7);
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        let roster = parse_roster(&fenced, "goal");
        assert_eq!(roster.agents.len(), 2);
    }

    #[test]
    fn garbage_degrades_to_fallback() {
        let roster = parse_roster("I cannot help with that.", "research crypto");
        assert_eq!(roster.agents.len(), 1);
        assert_eq!(roster.agents[0].role, AgentRole::Analyst);
        assert_eq!(roster.suggested_query, "research crypto");
    }

    #[test]
    fn empty_agent_list_degrades_to_fallback() {
        let roster = parse_roster(r#"{"agents": [], "suggested_query": "q"}"#, "goal");
        assert_eq!(roster.agents.len(), 1);
    }
}
