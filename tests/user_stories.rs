//! User Story Integration Tests
//!
//! Each test traces a complete workflow from the user's perspective:
//! - "As a user, I want to..."
//! - Tests verify the expected output/behavior
//! - Logs are captured for debugging

use std::sync::Arc;

use synapse::artifacts::ArtifactStore;
use synapse::models::{AgentRole, ControlPosition, TokenUsage};
use synapse::registry::{ExecutionStatus, Registry};
use synapse::steering::PromptPlan;
use synapse::Error;
use tempfile::TempDir;

/// Test helper to capture and display trace logs
struct TestTracer {
    name: String,
}

impl TestTracer {
    fn new(name: &str) -> Self {
        eprintln!("\n╔═══════════════════════════════════════════════════════════════");
        eprintln!("║ USER STORY: {}", name);
        eprintln!("╚═══════════════════════════════════════════════════════════════\n");
        Self {
            name: name.to_string(),
        }
    }

    fn step(&self, description: &str) {
        eprintln!("  → {}", description);
    }

    fn expect(&self, condition: bool, description: &str) {
        let status = if condition { "✓" } else { "✗" };
        eprintln!("    {} {}", status, description);
        assert!(condition, "FAILED: {}", description);
    }

    fn done(&self) {
        eprintln!("\n  ══════════════════════════════════════════════════════");
        eprintln!("  ✓ Story completed: {}", self.name);
        eprintln!();
    }
}

async fn fresh_registry() -> (TempDir, Arc<ArtifactStore>, Registry) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path()).await.unwrap());
    let registry = Registry::new(store.clone(), 32, std::time::Duration::from_secs(60));
    (dir, store, registry)
}

// ═══════════════════════════════════════════════════════════════
// STORY: User previews the prompt before running anything
// ═══════════════════════════════════════════════════════════════

#[test]
fn story_preview_shows_exactly_what_will_be_sent() {
    let t = TestTracer::new("Preview is deterministic and transparent");

    t.step("Given a query and a pad position in the factual/summary corner");
    let position = ControlPosition::new(0.1, 0.1);

    t.step("When the prompt is previewed twice");
    let first = PromptPlan::build("Analyze Q4 crypto risks", position, AgentRole::Analyst);
    let second = PromptPlan::build("Analyze Q4 crypto risks", position, AgentRole::Analyst);

    t.expect(
        first.system_prompt == second.system_prompt,
        "prompt text is byte-identical across calls",
    );
    t.expect(
        first.temperature == second.temperature,
        "temperature is identical across calls",
    );
    t.expect(
        first.system_prompt.contains("STRICTLY_FACTUAL"),
        "factual band wording is present",
    );
    t.expect(
        first.system_prompt.contains("EXECUTIVE_SUMMARY"),
        "summary band wording is present",
    );
    t.expect(
        (first.temperature - 0.27).abs() < 0.01,
        "temperature follows the affine creativity map",
    );
    t.done();
}

// ═══════════════════════════════════════════════════════════════
// STORY: Pad steering changes the instructions, corner to corner
// ═══════════════════════════════════════════════════════════════

#[test]
fn story_dragging_the_pad_changes_the_instructions() {
    let t = TestTracer::new("Opposite pad corners produce opposite prompts");

    t.step("Given the same query at (0,0) and (1,1)");
    let low = PromptPlan::build("q", ControlPosition::new(0.0, 0.0), AgentRole::Writer);
    let high = PromptPlan::build("q", ControlPosition::new(1.0, 1.0), AgentRole::Writer);

    t.expect(
        low.system_prompt != high.system_prompt,
        "prompts differ between corners",
    );
    t.expect(
        high.system_prompt.contains("SPECULATIVE_CREATIVE")
            && high.system_prompt.contains("RAW_VERBOSE"),
        "top-right corner selects creative + verbose bands",
    );
    t.expect(
        (low.temperature - 0.2).abs() < 0.01 && (high.temperature - 0.9).abs() < 0.01,
        "temperature spans the published 0.2..0.9 range",
    );
    t.done();
}

// ═══════════════════════════════════════════════════════════════
// STORY: A run streams, completes, and leaves an artifact behind
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn story_full_execution_lifecycle() {
    let t = TestTracer::new("Execution streams to completion with an artifact");
    let (_dir, store, registry) = fresh_registry().await;

    t.step("Given a submitted query");
    let execution = registry
        .create(
            "Summarize AI chip supply risks",
            ControlPosition::new(0.6, 0.4),
            AgentRole::Researcher,
        )
        .await
        .unwrap();
    t.expect(
        execution.status == ExecutionStatus::Pending,
        "execution starts pending",
    );

    t.step("When the subscriber claims the stream and tokens arrive in order");
    registry.begin_streaming(&execution.id).await.unwrap();
    let second_subscriber = registry.begin_streaming(&execution.id).await;
    t.expect(
        matches!(second_subscriber, Err(Error::Validation(_))),
        "a second subscriber cannot claim the same run",
    );
    for token in ["Supply ", "is ", "tight."] {
        registry.append_token(&execution.id, token).await.unwrap();
    }
    let usage = TokenUsage {
        prompt_tokens: 120,
        completion_tokens: 3,
        total_tokens: 123,
        estimated_cost: 0.00001,
    };
    let artifact = registry.complete(&execution.id, usage).await.unwrap();

    t.expect(
        artifact.content == "Supply is tight.",
        "artifact text equals concatenated tokens in delivery order",
    );

    t.step("Then the artifact is retrievable and listed most-recent-first");
    let fetched = store.get(&artifact.artifact_id).await.unwrap();
    t.expect(
        fetched.execution_id == execution.id,
        "artifact points back at its execution",
    );
    let listing = store.list(5).await;
    t.expect(
        listing.first().map(|a| a.artifact_id.as_str()) == Some(artifact.artifact_id.as_str()),
        "newest artifact leads the listing",
    );

    t.step("And the execution is terminal and immutable");
    let done = registry.get(&execution.id).await.unwrap();
    t.expect(done.status == ExecutionStatus::Complete, "status is complete");
    let late = registry.append_token(&execution.id, "late token").await;
    t.expect(
        matches!(late, Err(Error::StaleExecution { .. })),
        "late tokens are signalled as stale, not applied",
    );
    t.done();
}

// ═══════════════════════════════════════════════════════════════
// STORY: A failed run keeps its partial output, but no artifact
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn story_interrupted_run_preserves_partial_output() {
    let t = TestTracer::new("Interrupted run keeps partial text, makes no artifact");
    let (_dir, store, registry) = fresh_registry().await;

    t.step("Given a run that streamed some output");
    let execution = registry
        .create("Draft a memo", ControlPosition::new(0.5, 0.5), AgentRole::Writer)
        .await
        .unwrap();
    registry.append_token(&execution.id, "Dear team,").await.unwrap();

    t.step("When the upstream stream drops mid-delivery");
    registry
        .fail(&execution.id, "upstream interrupted: connection reset")
        .await
        .unwrap();

    let failed = registry.get(&execution.id).await.unwrap();
    t.expect(failed.status == ExecutionStatus::Error, "status is error");
    t.expect(
        failed.output == "Dear team,",
        "partial output stays queryable",
    );
    t.expect(failed.artifact_id.is_none(), "no artifact was created");
    t.expect(store.list(5).await.is_empty(), "store holds nothing");

    t.step("And a duplicate terminal event is rejected as stale");
    let dup = registry.fail(&execution.id, "again").await;
    t.expect(
        matches!(dup, Err(Error::StaleExecution { .. })),
        "second terminal event is stale",
    );
    t.done();
}

// ═══════════════════════════════════════════════════════════════
// STORY: Concurrent runs stay independent
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn story_concurrent_executions_do_not_interleave() {
    let t = TestTracer::new("Concurrent executions keep their outputs separate");
    let (_dir, _store, registry) = fresh_registry().await;
    let registry = Arc::new(registry);

    t.step("Given ten executions appending tokens concurrently");
    let mut handles = Vec::new();
    for i in 0..10 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let e = registry
                .create(
                    &format!("query {i}"),
                    ControlPosition::new(0.5, 0.5),
                    AgentRole::Analyst,
                )
                .await
                .unwrap();
            for part in 0..20 {
                registry
                    .append_token(&e.id, &format!("{i}:{part} "))
                    .await
                    .unwrap();
            }
            let artifact = registry
                .complete(&e.id, TokenUsage::default())
                .await
                .unwrap();
            (i, e.id, artifact)
        }));
    }

    t.step("When they all complete");
    let mut artifact_ids = std::collections::HashSet::new();
    for handle in handles {
        let (i, id, artifact) = handle.await.unwrap();
        let expected: String = (0..20).map(|p| format!("{i}:{p} ")).collect();
        let done = registry.get(&id).await.unwrap();
        assert_eq!(done.output, expected, "run {i} output is uninterleaved");
        assert!(
            artifact_ids.insert(artifact.artifact_id.clone()),
            "artifact ids are unique"
        );
    }

    t.expect(artifact_ids.len() == 10, "ten distinct artifacts exist");
    t.done();
}

// ═══════════════════════════════════════════════════════════════
// STORY: Malformed input never creates an execution
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn story_validation_rejects_before_any_state_exists() {
    let t = TestTracer::new("Bad input is rejected before an execution exists");
    let (_dir, _store, registry) = fresh_registry().await;

    t.step("When an empty query is submitted");
    let empty = registry
        .create("", ControlPosition::new(0.5, 0.5), AgentRole::Analyst)
        .await;
    t.expect(
        matches!(empty, Err(Error::Validation(_))),
        "empty query is a validation error",
    );

    t.step("When a wildly out-of-range position is submitted");
    let overshoot = registry
        .create("ok", ControlPosition::new(7.0, -3.0), AgentRole::Analyst)
        .await
        .unwrap();
    t.expect(
        overshoot.position.density == 1.0 && overshoot.position.creativity == 0.0,
        "position was clamped, not rejected",
    );

    t.expect(registry.list().await.len() == 1, "only the valid run exists");
    t.done();
}
