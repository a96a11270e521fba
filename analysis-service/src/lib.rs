pub mod agents;
pub mod errors;
pub mod moderator;
pub mod routes;
pub mod telemetry;

pub use agents::{AgentAdapter, AgentCollaborators, Agents};
pub use crate::errors::{ServiceError, ServiceResult};
pub use moderator::{AnalysisReport, AnalyzeOptions, Moderator, PipelineStage, StageOutcome};
pub use routes::router;

use cg_core::DocumentExtractor;
use config::Config;
use gateway::Gateway;
use std::sync::Arc;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub agents: Arc<Agents>,
    pub moderator: Arc<Moderator>,
    pub max_body_bytes: usize
}

impl AppState {
    pub fn new(
        config: &Config,
        collaborators: AgentCollaborators,
        extractor: Arc<dyn DocumentExtractor>
    ) -> Self {
        let gateway = Arc::new(Gateway::from_config(config));
        let agents = Arc::new(Agents::new(config, gateway.clone(), collaborators));
        let moderator = Arc::new(Moderator::new(&config.pipeline, agents.clone(), extractor));

        Self {
            gateway,
            agents,
            moderator,
            max_body_bytes: config.server.max_body_bytes
        }
    }
}
