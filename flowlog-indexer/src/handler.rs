//! Invocation handler: one trigger event in, one response out.

use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::IndexingError;
use flowlog_indexer_pipeline::Orchestrator;
use flowlog_indexer_shared::{InvocationResponse, ObjectCreatedEvent};

/// Run one invocation for `event` and build the response for the caller.
///
/// Internal faults are turned into a 500 response without an outcome; every
/// other failure is already accounted for in the outcome.
#[instrument(skip_all, fields(records = event.records.len()))]
pub async fn handle_event(
    orchestrator: &Orchestrator,
    event: &ObjectCreatedEvent,
    deadline: Option<Instant>,
) -> InvocationResponse {
    let objects = event.object_references();

    let ignored = event.records.len() - objects.len();
    if ignored > 0 {
        warn!(
            ignored = ignored,
            "Ignoring records that do not announce a created object"
        );
    }
    info!(objects = objects.len(), "Received trigger event");

    match orchestrator.run(objects, deadline).await {
        Ok(outcome) => InvocationResponse::from_outcome(outcome),
        Err(e) => {
            error!(error = %e, "Invocation aborted by internal fault");
            InvocationResponse::internal_fault(e.to_string())
        }
    }
}

/// Serialize `response` as the single JSON line printed for the caller.
pub fn render_response(response: &InvocationResponse) -> Result<String, IndexingError> {
    serde_json::to_string(response).map_err(IndexingError::ResponseError)
}
