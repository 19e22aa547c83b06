use crate::{
    api::{self, Protected},
    config::Config,
    distribution::kv::FileKvStore,
    edge::{CachedKeyValue, EdgeGuard, EdgeSecret, Upstream, DEFAULT_SECRET_CACHE_TTL},
    issuer::Issuer,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub config: Config,
    pub upstream: Option<Url>,
    pub edge_secret_store: Option<PathBuf>,
    pub edge_secret_key: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the HTTP clients cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = Arc::new(args.config);
    let issuer = Arc::new(Issuer::new(config.clone()).context("failed to build issuer")?);

    let protected = match args.upstream {
        Some(origin) => {
            let secret = match args.edge_secret_store {
                Some(dir) => EdgeSecret::KeyValue {
                    store: Arc::new(CachedKeyValue::new(
                        Arc::new(FileKvStore::new(dir)),
                        DEFAULT_SECRET_CACHE_TTL,
                    )),
                    key: args.edge_secret_key,
                },
                None => EdgeSecret::Inline(config.signing_secret().clone()),
            };
            Some(Protected {
                guard: EdgeGuard::from_config(&config, secret),
                upstream: Upstream::new(origin, UPSTREAM_TIMEOUT)
                    .context("failed to build upstream client")?,
            })
        }
        None => None,
    };

    api::new(args.port, issuer, protected).await
}

fn log_startup_args(args: &Args) {
    let config = &args.config;
    let edge_secret = match (&args.upstream, &args.edge_secret_store) {
        (None, _) => "n/a".to_string(),
        (Some(_), None) => "inline".to_string(),
        (Some(_), Some(dir)) => format!("{}/{}", dir.display(), args.edge_secret_key),
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("issuer_url", config.issuer_url().to_string()),
        ("client_id", config.client_id().to_string()),
        (
            "client_secret_set",
            config.client_secret().is_some().to_string(),
        ),
        ("scope", config.scope().to_string()),
        ("redirect_uri", config.redirect_uri()),
        ("auth_route_prefix", config.auth_route_prefix().to_string()),
        ("cookie_name", config.cookie_name().to_string()),
        ("cookie_same_site", config.same_site().to_string()),
        ("token_ttl_seconds", config.token_ttl_seconds().to_string()),
        ("cookie_ttl_seconds", config.cookie_ttl_seconds().to_string()),
        ("idp_timeout", format!("{:?}", config.idp_timeout())),
        (
            "upstream",
            args.upstream
                .as_ref()
                .map_or_else(|| "none".to_string(), ToString::to_string),
        ),
        ("edge_secret", edge_secret),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    BANNER.replace(
        "{VERSION}",
        &format!(
            " - {} - {}",
            env!("CARGO_PKG_VERSION"),
            short_commit(crate::GIT_COMMIT_HASH)
        ),
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

const BANNER: &str = r"
      ______
     /      \
    |  .--.  |
    |  |  |  |   E D G E W A R D {VERSION}
  __|__|__|__|__
 /______________\";
