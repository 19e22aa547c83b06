use crate::{
    config::SigningSecret,
    distribution::{
        inline,
        kv::{publish_secret, FileKvStore, HttpKvStore, KeyValueStore},
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use tracing::info;
use url::Url;

const KV_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct RenderArgs {
    pub secret: SigningSecret,
    pub auth_route_prefix: String,
    pub cookie_name: String,
    pub template: Option<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug)]
pub enum KvTarget {
    Http { url: Url, token: Option<SecretString> },
    Dir(PathBuf),
}

#[derive(Debug)]
pub struct PublishArgs {
    pub secret: SigningSecret,
    pub key: String,
    pub target: KvTarget,
}

/// Render the edge configuration with the secret inlined.
/// # Errors
/// Returns an error if the template is unusable, the self-check fails, or the output
/// cannot be written.
pub async fn render(args: RenderArgs) -> Result<()> {
    let template = match &args.template {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read template {}", path.display()))?,
        None => inline::DEFAULT_TEMPLATE.to_string(),
    };

    let artifact = inline::render(
        &template,
        args.secret.expose(),
        &args.auth_route_prefix,
        &args.cookie_name,
    )?;
    artifact
        .verify_secret(args.secret.expose())
        .context("rendered configuration does not carry the signing secret")?;

    tokio::fs::write(&args.output, artifact.as_str())
        .await
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(output = %args.output.display(), "edge configuration rendered");
    Ok(())
}

/// Publish the secret to a key/value store and confirm it reads back unchanged.
/// # Errors
/// Returns an error if the store rejects the write or the read-back differs.
pub async fn publish(args: PublishArgs) -> Result<()> {
    let store: Box<dyn KeyValueStore> = match args.target {
        KvTarget::Http { url, token } => Box::new(HttpKvStore::new(url, token, KV_TIMEOUT)?),
        KvTarget::Dir(dir) => Box::new(FileKvStore::new(dir)),
    };

    publish_secret(store.as_ref(), &args.key, args.secret.expose())
        .await
        .with_context(|| format!("failed to publish secret under {}", args.key))?;

    info!(key = %args.key, "secret published");
    Ok(())
}
