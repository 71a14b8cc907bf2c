//! Token and cost estimation
//!
//! Pure arithmetic against a static per-model price table. Used as the
//! fallback when the provider omits usage in its final stream chunk.

/// USD per million tokens, (input, output), by model id prefix.
/// Rates are a snapshot; the default row covers unlisted models.
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    ("google/gemini-flash-1.5", 0.075, 0.30),
    ("google/gemini-pro-1.5", 1.25, 5.00),
    ("meta-llama/llama-3.1-8b-instruct:free", 0.0, 0.0),
    ("openai/gpt-4o-mini", 0.15, 0.60),
];

/// Fallback pricing for models missing from the table.
const DEFAULT_PRICE: (f64, f64) = (0.075, 0.30);

/// (input, output) USD per million tokens for a model.
pub fn price_for(model: &str) -> (f64, f64) {
    PRICE_TABLE
        .iter()
        .find(|(id, _, _)| *id == model)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(DEFAULT_PRICE)
}

/// Estimated USD cost. Full precision; rounding is a display concern.
pub fn estimate_cost(
    input_tokens: u32,
    output_tokens: u32,
    price_per_million_input: f64,
    price_per_million_output: f64,
) -> f64 {
    input_tokens as f64 / 1e6 * price_per_million_input
        + output_tokens as f64 / 1e6 * price_per_million_output
}

/// Rough token count (~4 chars per token). Good enough for cost estimates
/// when the provider reports nothing; exact counts need the tokenizer.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}
