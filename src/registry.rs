//! Execution registry: the single source of truth for live runs
//!
//! Status moves one way: pending -> streaming -> {complete | error}.
//! The pending -> streaming transition is an exclusive claim taken under
//! the write lock, so a second subscriber loses deterministically instead
//! of racing. Terminal events arriving out of order surface as
//! StaleExecution so the streaming path can log and drop them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::error::{Error, Result};
use crate::models::{AgentRole, Artifact, ControlPosition, TokenUsage};
use crate::steering::PromptPlan;

/// Maximum accepted query length, matching the request schema.
pub const MAX_QUERY_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Streaming,
    Complete,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Complete | ExecutionStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Streaming => "streaming",
            ExecutionStatus::Complete => "complete",
            ExecutionStatus::Error => "error",
        }
    }
}

/// One query's lifecycle from submission to terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub id: String,
    pub query: String,
    pub position: ControlPosition,
    pub role: AgentRole,
    pub system_prompt: String,
    pub temperature: f32,
    pub status: ExecutionStatus,
    /// Accumulated output; grows monotonically while streaming and is kept
    /// as-is on interruption so partial text stays queryable.
    pub output: String,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
    pub artifact_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set while a terminal transition is persisting its artifact, so
    /// concurrent events become stale without committing a state the save
    /// could still contradict.
    #[serde(skip)]
    pub(crate) finalizing: bool,
}

/// Summary row for the executions listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub role: AgentRole,
    pub position: ControlPosition,
    pub created_at: DateTime<Utc>,
}

struct Inner {
    executions: HashMap<String, Execution>,
    order: VecDeque<String>,
}

pub struct Registry {
    store: Arc<ArtifactStore>,
    cap: usize,
    /// Pending runs older than this are expired on the next create, so
    /// abandoned execute calls cannot pin the table open forever.
    pending_ttl: Duration,
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new(store: Arc<ArtifactStore>, cap: usize, pending_ttl: Duration) -> Self {
        Self {
            store,
            cap: cap.max(1),
            pending_ttl,
            inner: RwLock::new(Inner {
                executions: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Create a pending execution: validates the query, computes the prompt
    /// plan, and returns synchronously without touching the network.
    pub async fn create(
        &self,
        query: &str,
        position: ControlPosition,
        role: AgentRole,
    ) -> Result<Execution> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::Validation(format!(
                "query exceeds {MAX_QUERY_CHARS} characters"
            )));
        }

        let position = position.clamped();
        let plan = PromptPlan::build(query, position, role);

        let execution = Execution {
            id: format!("exec_{}", &Uuid::new_v4().simple().to_string()[..12]),
            query: query.to_string(),
            position,
            role,
            system_prompt: plan.system_prompt,
            temperature: plan.temperature,
            status: ExecutionStatus::Pending,
            output: String::new(),
            usage: None,
            error: None,
            artifact_id: None,
            created_at: Utc::now(),
            finalizing: false,
        };

        let mut inner = self.inner.write().await;
        expire_pending(&mut inner, self.pending_ttl);
        inner.order.push_back(execution.id.clone());
        inner
            .executions
            .insert(execution.id.clone(), execution.clone());
        evict_terminal(&mut inner, self.cap);

        Ok(execution)
    }

    pub async fn get(&self, id: &str) -> Result<Execution> {
        self.inner
            .read()
            .await
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("execution {id}")))
    }

    pub async fn list(&self) -> Vec<ExecutionSummary> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.executions.get(id))
            .map(|e| ExecutionSummary {
                execution_id: e.id.clone(),
                status: e.status,
                role: e.role,
                position: e.position,
                created_at: e.created_at,
            })
            .collect()
    }

    /// Exclusively claim the pending -> streaming transition. Exactly one
    /// caller wins under the write lock; everyone else gets a validation
    /// error, so concurrent subscribers can never both drive one run.
    pub async fn begin_streaming(&self, id: &str) -> Result<Execution> {
        let mut inner = self.inner.write().await;
        let execution = entry_mut(&mut inner, id)?;
        if execution.status != ExecutionStatus::Pending {
            return Err(Error::Validation(format!(
                "execution {} already started (status {})",
                execution.id,
                execution.status.as_str()
            )));
        }
        execution.status = ExecutionStatus::Streaming;
        Ok(execution.clone())
    }

    /// Append incremental text. Signals StaleExecution after a terminal
    /// event so a racing token cannot mutate finished output.
    pub async fn append_token(&self, id: &str, text: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let execution = entry_mut(&mut inner, id)?;
        if execution.status.is_terminal() || execution.finalizing {
            return Err(stale(execution));
        }
        execution.status = ExecutionStatus::Streaming;
        execution.output.push_str(text);
        Ok(())
    }

    /// Terminal success: persists exactly one artifact for the accumulated
    /// output, then commits `complete` with usage and the artifact id. If
    /// persistence fails the execution lands in `error` instead, so the
    /// registry and the wire never disagree about the outcome.
    pub async fn complete(&self, id: &str, usage: TokenUsage) -> Result<Artifact> {
        // Claim the finalizing flag first so duplicate terminal events and
        // racing tokens become stale while the save is in flight, without
        // committing a terminal status the save could still contradict.
        let output = {
            let mut inner = self.inner.write().await;
            let execution = entry_mut(&mut inner, id)?;
            if execution.status.is_terminal() || execution.finalizing {
                return Err(stale(execution));
            }
            execution.finalizing = true;
            execution.output.clone()
        };

        let saved = self.store.save(id, &output).await;

        let mut inner = self.inner.write().await;
        let Some(execution) = inner.executions.get_mut(id) else {
            // evicted mid-save; surface the artifact if we made one
            return saved;
        };
        execution.finalizing = false;
        match saved {
            Ok(artifact) => {
                execution.status = ExecutionStatus::Complete;
                execution.usage = Some(usage);
                execution.artifact_id = Some(artifact.artifact_id.clone());
                Ok(artifact)
            }
            Err(e) => {
                execution.status = ExecutionStatus::Error;
                execution.error = Some(format!("artifact persistence failed: {e}"));
                Err(e)
            }
        }
    }

    /// Terminal failure. Accumulated output is preserved; no artifact is
    /// created.
    pub async fn fail(&self, id: &str, message: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let execution = entry_mut(&mut inner, id)?;
        if execution.status.is_terminal() || execution.finalizing {
            return Err(stale(execution));
        }
        execution.status = ExecutionStatus::Error;
        execution.error = Some(message.to_string());
        Ok(())
    }
}

fn entry_mut<'a>(inner: &'a mut Inner, id: &str) -> Result<&'a mut Execution> {
    inner
        .executions
        .get_mut(id)
        .ok_or_else(|| Error::NotFound(format!("execution {id}")))
}

fn stale(execution: &Execution) -> Error {
    Error::StaleExecution {
        id: execution.id.clone(),
        status: execution.status.as_str(),
    }
}

/// Force-fail pending runs nobody ever subscribed to, once they outlive the
/// TTL. They become terminal and therefore evictable.
fn expire_pending(inner: &mut Inner, ttl: Duration) {
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        return;
    };
    let cutoff = Utc::now() - ttl;
    for execution in inner.executions.values_mut() {
        if execution.status == ExecutionStatus::Pending && execution.created_at < cutoff {
            execution.status = ExecutionStatus::Error;
            execution.error = Some("expired before streaming started".into());
        }
    }
}

/// Evict oldest terminal executions beyond the cap. Live entries are never
/// evicted; the table may exceed the cap while that many runs are in flight.
fn evict_terminal(inner: &mut Inner, cap: usize) {
    while inner.order.len() > cap {
        let Some(pos) = inner
            .order
            .iter()
            .position(|id| {
                inner
                    .executions
                    .get(id)
                    .map(|e| e.status.is_terminal())
                    .unwrap_or(true)
            })
        else {
            break;
        };
        if let Some(id) = inner.order.remove(pos) {
            inner.executions.remove(&id);
        }
    }
}
