// Executor module
// The script runtime is an external collaborator; the engine only hands work to it

use crate::errors::ExecutorError;
use crate::models::{EventData, Macro, TriggerEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// MacroExecutor runs macro bodies and functions on behalf of the scheduler
#[async_trait]
pub trait MacroExecutor: Send + Sync {
    /// Begin running a macro, returning once the run has been accepted
    async fn start(&self, macro_ref: Arc<Macro>) -> Result<(), ExecutorError>;

    async fn pause(&self, macro_id: &str) -> Result<(), ExecutorError>;

    async fn resume(&self, macro_id: &str) -> Result<(), ExecutorError>;

    /// Stop a running or paused macro and release its resources
    async fn stop(&self, macro_id: &str) -> Result<(), ExecutorError>;

    /// Begin executing one function of a macro with the event payload
    async fn execute_function(
        &self,
        macro_id: &str,
        function_name: &str,
        event: TriggerEvent,
        data: EventData,
    ) -> Result<(), ExecutorError>;
}

/// Executor that only logs the requests it receives
#[derive(Debug, Default, Clone)]
pub struct LogExecutor;

impl LogExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MacroExecutor for LogExecutor {
    async fn start(&self, macro_ref: Arc<Macro>) -> Result<(), ExecutorError> {
        info!(
            macro_id = %macro_ref.id,
            macro_name = %macro_ref.name,
            macro_type = %macro_ref.macro_type,
            "Macro start requested"
        );
        Ok(())
    }

    async fn pause(&self, macro_id: &str) -> Result<(), ExecutorError> {
        info!(macro_id = macro_id, "Macro pause requested");
        Ok(())
    }

    async fn resume(&self, macro_id: &str) -> Result<(), ExecutorError> {
        info!(macro_id = macro_id, "Macro resume requested");
        Ok(())
    }

    async fn stop(&self, macro_id: &str) -> Result<(), ExecutorError> {
        info!(macro_id = macro_id, "Macro stop requested");
        Ok(())
    }

    async fn execute_function(
        &self,
        macro_id: &str,
        function_name: &str,
        event: TriggerEvent,
        data: EventData,
    ) -> Result<(), ExecutorError> {
        info!(
            macro_id = macro_id,
            function = function_name,
            event = %event,
            payload_keys = data.len(),
            "Function execution requested"
        );
        Ok(())
    }
}
