use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{error, info};

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{log_requests, state::*, verify_slack_signature};
use crate::error::LearnerResult;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub obligations: usize,
    pub running: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Slash command form as posted by the chat platform. Other fields are ignored.
#[derive(Deserialize, Debug)]
struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug)]
struct SlackReply {
    response_type: &'static str,
    text: String,
}

fn in_channel(text: impl Into<String>) -> Json<SlackReply> {
    Json(SlackReply {
        response_type: "in_channel",
        text: text.into(),
    })
}

fn reply_with(result: LearnerResult<String>) -> Json<SlackReply> {
    match result {
        Ok(text) => in_channel(text),
        Err(err) => {
            error!("Command failed: {}", err);
            in_channel(format!("Oh oh! An error occurred - {}", err))
        }
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        obligations: state.scheduler_handle.obligation_count().await,
        running: state.scheduler_handle.running_count().await,
    })
}

async fn hello() -> impl IntoResponse {
    in_channel("Hello!")
}

async fn reset_schedule(State(commands): State<GuardedCommandService>) -> impl IntoResponse {
    reply_with(commands.reset().await)
}

async fn handle_slash_command(
    State(commands): State<GuardedCommandService>,
    Form(slash): Form<SlashCommand>,
) -> impl IntoResponse {
    info!("Slash command {} '{}'", slash.command, slash.text);
    let text = slash.text.trim();

    match slash.command.as_str() {
        "/readme" if text.is_empty() => {
            in_channel("Oh Sorry! You need to specify the book name you want to search!")
        }
        "/readme" => reply_with(commands.subscribe_book(text).await),
        "/tips" => reply_with(commands.subscribe_topic(text).await),
        "/list" => reply_with(commands.overview().await),
        "/run" => reply_with(commands.run_all().await),
        other => in_channel(format!(
            "Oh Sorry! the command {} is not available yet",
            other
        )),
    }
}

pub fn make_app(state: ServerState) -> Router {
    let slack_routes: Router = Router::new()
        .route("/hello", post(hello))
        .route("/reset_schedule", post(reset_schedule))
        .route("/events", post(handle_slash_command))
        .layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            verify_slack_signature,
        ))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .nest("/slack", slack_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
}

pub async fn run_server(state: ServerState, shutdown_token: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    info!("Server stopped");
    Ok(())
}
