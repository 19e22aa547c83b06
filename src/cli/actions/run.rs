use crate::cli::actions::{edge, secret, server, Action};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::GenerateSecret => secret::execute(),
        Action::RenderEdge(args) => edge::render(args).await,
        Action::PublishSecret(args) => edge::publish(args).await,
    }
}
