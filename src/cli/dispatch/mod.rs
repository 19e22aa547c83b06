use crate::{
    cli::actions::{
        edge::{KvTarget, PublishArgs, RenderArgs},
        server, Action,
    },
    config::{normalize_route_prefix, valid_cookie_name, Config, SameSite, SecretInput, SigningSecret},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("serve", sub_m)) => serve(sub_m),
        Some(("secret", sub_m)) => match sub_m.subcommand_name() {
            Some("generate") => Ok(Action::GenerateSecret),
            other => Err(anyhow!("unknown secret command: {other:?}")),
        },
        Some(("edge", sub_m)) => match sub_m.subcommand() {
            Some(("render", m)) => render(m),
            Some(("publish", m)) => publish(m),
            other => Err(anyhow!("unknown edge command: {:?}", other.map(|(name, _)| name))),
        },
        _ => bail!("no command given, see --help"),
    }
}

fn string(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn signing_secret(matches: &ArgMatches) -> Result<SigningSecret> {
    let raw = string(matches, "jwt-secret")?;
    let secret = SecretInput::parse(&raw)
        .and_then(SecretInput::into_secret)
        .context("invalid --jwt-secret")?;
    Ok(secret)
}

fn serve(matches: &ArgMatches) -> Result<Action> {
    let same_site: SameSite = string(matches, "cookie-same-site")?
        .parse()
        .context("invalid --cookie-same-site")?;

    let config = Config::builder()
        .with_issuer_url(string(matches, "issuer-url")?)
        .with_client_id(string(matches, "client-id")?)
        .with_client_secret(
            matches
                .get_one::<String>("client-secret")
                .map(|secret| SecretString::from(secret.clone())),
        )
        .with_scope(string(matches, "scope")?)
        .with_public_url(string(matches, "public-url")?)
        .with_signing_secret(
            SecretInput::parse(&string(matches, "jwt-secret")?).context("invalid --jwt-secret")?,
        )
        .with_auth_route_prefix(string(matches, "auth-route-prefix")?)
        .with_cookie_name(string(matches, "cookie-name")?)
        .with_same_site(same_site)
        .with_token_ttl_seconds(
            matches
                .get_one::<i64>("token-ttl-seconds")
                .copied()
                .context("missing --token-ttl-seconds")?,
        )
        .with_cookie_ttl_seconds(
            matches
                .get_one::<i64>("cookie-ttl-seconds")
                .copied()
                .context("missing --cookie-ttl-seconds")?,
        )
        .with_landing_path(string(matches, "landing-path")?)
        .with_idp_timeout_seconds(
            matches
                .get_one::<u64>("idp-timeout-seconds")
                .copied()
                .context("missing --idp-timeout-seconds")?,
        )
        .build()
        .context("invalid configuration")?;

    let upstream = matches
        .get_one::<String>("upstream")
        .map(|raw| Url::parse(raw))
        .transpose()
        .context("invalid --upstream")?;

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        config,
        upstream,
        edge_secret_store: matches
            .get_one::<String>("edge-secret-store")
            .map(PathBuf::from),
        edge_secret_key: string(matches, "edge-secret-key")?,
    }))
}

fn render(matches: &ArgMatches) -> Result<Action> {
    let auth_route_prefix = normalize_route_prefix(&string(matches, "auth-route-prefix")?)?;
    let cookie_name = string(matches, "cookie-name")?;
    if !valid_cookie_name(&cookie_name) {
        bail!("invalid --cookie-name: {cookie_name}");
    }

    Ok(Action::RenderEdge(RenderArgs {
        secret: signing_secret(matches)?,
        auth_route_prefix,
        cookie_name,
        template: matches.get_one::<String>("template").map(PathBuf::from),
        output: PathBuf::from(string(matches, "output")?),
    }))
}

fn publish(matches: &ArgMatches) -> Result<Action> {
    let target = if let Some(url) = matches.get_one::<String>("kv-url") {
        KvTarget::Http {
            url: Url::parse(url).context("invalid --kv-url")?,
            token: matches
                .get_one::<String>("kv-token")
                .map(|token| SecretString::from(token.clone())),
        }
    } else {
        KvTarget::Dir(PathBuf::from(string(matches, "kv-dir")?))
    };

    let key = string(matches, "key")?;
    crate::distribution::kv::validate_key(&key)?;

    Ok(Action::PublishSecret(PublishArgs {
        secret: signing_secret(matches)?,
        key,
        target,
    }))
}
