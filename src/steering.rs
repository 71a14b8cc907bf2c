//! Prompt steering: maps a pad position onto prompt text and temperature
//!
//! Pure and deterministic: identical inputs yield byte-identical prompts.
//! Band wording is shown verbatim to the user as a transparency guarantee,
//! so changing it is a breaking change.

use serde::{Deserialize, Serialize};

use crate::models::{AgentRole, ControlPosition};

/// Temperature at creativity = 0.
pub const TEMP_MIN: f32 = 0.2;
/// Temperature at creativity = 1.
pub const TEMP_MAX: f32 = 0.9;

/// Band boundaries on both axes.
const BAND_LOW: f64 = 0.3;
const BAND_HIGH: f64 = 0.7;

const DENSITY_SUMMARY: &str = "\
OUTPUT_DENSITY: EXECUTIVE_SUMMARY
- Provide only key insights and conclusions
- Maximum 3-5 bullet points or brief paragraphs
- Avoid technical details unless absolutely critical
- Focus on actionable recommendations
- Keep total response under 200 words";

const DENSITY_DETAILED: &str = "\
OUTPUT_DENSITY: DETAILED_REPORT
- Provide comprehensive analysis with supporting evidence
- Include relevant context and methodology
- Balance depth with readability
- Use structured formatting (headings, lists, paragraphs)
- Target 300-500 words with clear organization";

const DENSITY_VERBOSE: &str = "\
OUTPUT_DENSITY: RAW_VERBOSE
- Include all relevant data points and calculations
- Show your reasoning process step-by-step
- Provide extensive context and background information
- Include data sources, assumptions, and confidence levels
- Aim for thorough coverage (500+ words if needed)";

const CREATIVITY_FACTUAL: &str = "\
CREATIVITY_LEVEL: STRICTLY_FACTUAL
- Base all statements on verified data and established facts
- Avoid speculation or hypothetical scenarios
- Use conservative, evidence-based language (e.g., \"data shows\" rather than \"might indicate\")
- Cite sources or note data limitations when appropriate
- Maintain objectivity and avoid interpretive leaps";

const CREATIVITY_BALANCED: &str = "\
CREATIVITY_LEVEL: BALANCED_INSIGHT
- Blend factual analysis with reasonable inferences
- Use moderate speculation, clearly labeled as such
- Consider multiple perspectives and interpretations
- Balance empirical data with thoughtful extrapolation
- Acknowledge uncertainty where it exists";

const CREATIVITY_SPECULATIVE: &str = "\
CREATIVITY_LEVEL: SPECULATIVE_CREATIVE
- Generate novel insights and unexpected connections
- Explore hypothetical scenarios and \"what-if\" thinking
- Use creative framing, metaphors, and analogies
- Challenge conventional interpretations
- Embrace imaginative reasoning while noting speculative elements";

const CONSTRAINTS: &str = "\
CONSTRAINTS:
- Respond in Markdown format for readability
- Be transparent about uncertainty and assumptions
- Maintain professional tone while matching the creativity level";

/// Density axis band instruction.
pub fn density_instruction(density: f64) -> &'static str {
    if density < BAND_LOW {
        DENSITY_SUMMARY
    } else if density < BAND_HIGH {
        DENSITY_DETAILED
    } else {
        DENSITY_VERBOSE
    }
}

/// Creativity axis band instruction.
pub fn creativity_instruction(creativity: f64) -> &'static str {
    if creativity < BAND_LOW {
        CREATIVITY_FACTUAL
    } else if creativity < BAND_HIGH {
        CREATIVITY_BALANCED
    } else {
        CREATIVITY_SPECULATIVE
    }
}

/// Affine map from the creativity axis to sampling temperature.
pub fn temperature(creativity: f64) -> f32 {
    TEMP_MIN + (creativity as f32) * (TEMP_MAX - TEMP_MIN)
}

/// The fully assembled steering output for one request, broken into its
/// components so the UI can show exactly what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPlan {
    pub base_prompt: String,
    pub creativity_modifier: String,
    pub density_modifier: String,
    pub system_prompt: String,
    pub user_query: String,
    pub temperature: f32,
}

impl PromptPlan {
    /// Build the plan for a query at a pad position. Out-of-range and NaN
    /// axes are clamped, never rejected. No I/O, no state.
    pub fn build(query: &str, position: ControlPosition, role: AgentRole) -> Self {
        let position = position.clamped();

        let base_prompt = role.base_prompt();
        let creativity_modifier = creativity_instruction(position.creativity);
        let density_modifier = density_instruction(position.density);

        let system_prompt = format!(
            "{base_prompt}\n\n{creativity_modifier}\n\n{density_modifier}\n\n{CONSTRAINTS}\n"
        );

        Self {
            base_prompt: base_prompt.to_string(),
            creativity_modifier: creativity_modifier.to_string(),
            density_modifier: density_modifier.to_string(),
            system_prompt,
            user_query: query.to_string(),
            temperature: temperature(position.creativity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(d: f64, c: f64) -> PromptPlan {
        PromptPlan::build(
            "Analyze crypto market risks",
            ControlPosition::new(d, c),
            AgentRole::Analyst,
        )
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let a = plan(0.42, 0.67);
        let b = plan(0.42, 0.67);
        assert_eq!(a.system_prompt, b.system_prompt);
        assert_eq!(a.temperature, b.temperature);
    }

    #[test]
    fn bottom_left_corner_is_factual_summary() {
        let p = plan(0.0, 0.0);
        assert!(p.system_prompt.contains("STRICTLY_FACTUAL"));
        assert!(p.system_prompt.contains("EXECUTIVE_SUMMARY"));
        assert!((p.temperature - 0.2).abs() < 0.01);
    }

    #[test]
    fn top_right_corner_is_speculative_verbose() {
        let p = plan(1.0, 1.0);
        assert!(p.system_prompt.contains("SPECULATIVE_CREATIVE"));
        assert!(p.system_prompt.contains("RAW_VERBOSE"));
        assert!((p.temperature - 0.9).abs() < 0.01);
    }

    #[test]
    fn center_is_balanced_detail() {
        let p = plan(0.5, 0.5);
        assert!(p.system_prompt.contains("BALANCED_INSIGHT"));
        assert!(p.system_prompt.contains("DETAILED_REPORT"));
        assert!((p.temperature - 0.55).abs() < 0.01);
    }

    #[test]
    fn band_boundaries_are_half_open() {
        // 0.3 falls into the middle band, 0.7 into the high band
        assert!(density_instruction(0.3).contains("DETAILED_REPORT"));
        assert!(density_instruction(0.7).contains("RAW_VERBOSE"));
        assert!(creativity_instruction(0.3).contains("BALANCED_INSIGHT"));
        assert!(creativity_instruction(0.7).contains("SPECULATIVE_CREATIVE"));
    }

    #[test]
    fn overshoot_is_clamped_not_rejected() {
        let p = plan(1.4, -0.2);
        assert!(p.system_prompt.contains("RAW_VERBOSE"));
        assert!(p.system_prompt.contains("STRICTLY_FACTUAL"));
        assert!((p.temperature - 0.2).abs() < 0.01);
    }

    #[test]
    fn system_prompt_embeds_all_components() {
        let p = plan(0.5, 0.5);
        assert!(p.system_prompt.contains(&p.base_prompt));
        assert!(p.system_prompt.contains(&p.creativity_modifier));
        assert!(p.system_prompt.contains(&p.density_modifier));
        assert!(p.system_prompt.contains("CONSTRAINTS:"));
    }
}
