use axum::extract::FromRef;

use crate::auth::RequestVerifier;
use crate::background_jobs::SchedulerHandle;
use crate::commands::CommandService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCommandService = Arc<CommandService>;
pub type GuardedRequestVerifier = Arc<RequestVerifier>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub commands: GuardedCommandService,
    pub scheduler_handle: SchedulerHandle,
    pub verifier: GuardedRequestVerifier,
}

impl FromRef<ServerState> for GuardedCommandService {
    fn from_ref(input: &ServerState) -> Self {
        input.commands.clone()
    }
}

impl FromRef<ServerState> for GuardedRequestVerifier {
    fn from_ref(input: &ServerState) -> Self {
        input.verifier.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
