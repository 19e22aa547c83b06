use crate::config::{DEFAULT_LANDING_PATH, DEFAULT_SCOPE};
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser, ValueParser,
    },
    Arg, ArgGroup, ColorChoice, Command,
};
use edge_verifier::{DEFAULT_AUTH_ROUTE_PREFIX, DEFAULT_COOKIE_NAME};

const DEFAULT_SECRET_KEY: &str = crate::distribution::kv::DEFAULT_SECRET_KEY;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 4 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

fn jwt_secret() -> Arg {
    Arg::new("jwt-secret")
        .long("jwt-secret")
        .help("Shared signing secret: a bare string, or {\"value\": ..., \"encoding\": \"raw|base64url|hex\"}")
        .env("EDGEWARD_JWT_SECRET")
        .hide_env_values(true)
        .required(true)
}

fn auth_route_prefix() -> Arg {
    Arg::new("auth-route-prefix")
        .long("auth-route-prefix")
        .help("Path prefix of the auth routes; failed checks redirect to {prefix}/oidc/authorize")
        .env("EDGEWARD_AUTH_ROUTE_PREFIX")
        .default_value(DEFAULT_AUTH_ROUTE_PREFIX)
}

fn cookie_name() -> Arg {
    Arg::new("cookie-name")
        .long("cookie-name")
        .help("Name of the session cookie")
        .env("EDGEWARD_COOKIE_NAME")
        .default_value(DEFAULT_COOKIE_NAME)
}

fn serve() -> Command {
    Command::new("serve")
        .about("Run the session issuer")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("EDGEWARD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("issuer-url")
                .long("issuer-url")
                .help("OpenID provider issuer, example: https://idp.tld/realms/main")
                .env("EDGEWARD_ISSUER_URL")
                .required(true),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .help("OAuth client id")
                .env("EDGEWARD_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new("client-secret")
                .long("client-secret")
                .help("OAuth client secret, for confidential clients")
                .env("EDGEWARD_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("scope")
                .long("scope")
                .help("Requested scopes")
                .env("EDGEWARD_SCOPE")
                .default_value(DEFAULT_SCOPE),
        )
        .arg(jwt_secret())
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("External origin of this service, used for the redirect URI")
                .env("EDGEWARD_PUBLIC_URL")
                .required(true),
        )
        .arg(auth_route_prefix())
        .arg(cookie_name())
        .arg(
            Arg::new("cookie-same-site")
                .long("cookie-same-site")
                .help("SameSite policy of the session cookie")
                .env("EDGEWARD_COOKIE_SAME_SITE")
                .default_value("lax")
                .value_parser(PossibleValuesParser::new(["lax", "strict", "none"])),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Lifetime of the session token")
                .env("EDGEWARD_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("cookie-ttl-seconds")
                .long("cookie-ttl-seconds")
                .help("Max-Age of the session cookie")
                .env("EDGEWARD_COOKIE_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("landing-path")
                .long("landing-path")
                .help("Where to send the browser after login when no return path was given")
                .env("EDGEWARD_LANDING_PATH")
                .default_value(DEFAULT_LANDING_PATH),
        )
        .arg(
            Arg::new("idp-timeout-seconds")
                .long("idp-timeout-seconds")
                .help("Timeout for each call to the provider")
                .env("EDGEWARD_IDP_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("upstream")
                .long("upstream")
                .help("Origin to proxy to; every other route then requires a valid session")
                .env("EDGEWARD_UPSTREAM"),
        )
        .arg(
            Arg::new("edge-secret-store")
                .long("edge-secret-store")
                .help("Directory key/value store the edge guard reads its secret from")
                .env("EDGEWARD_EDGE_SECRET_STORE")
                .requires("upstream"),
        )
        .arg(
            Arg::new("edge-secret-key")
                .long("edge-secret-key")
                .help("Key of the secret in the edge secret store")
                .env("EDGEWARD_EDGE_SECRET_KEY")
                .default_value(DEFAULT_SECRET_KEY),
        )
}

fn secret() -> Command {
    Command::new("secret")
        .about("Signing secret helpers")
        .subcommand_required(true)
        .subcommand(
            Command::new("generate")
                .about("Print a new random secret (32 bytes, base64url without padding)"),
        )
}

fn edge() -> Command {
    Command::new("edge")
        .about("Distribute the signing secret to the edge")
        .subcommand_required(true)
        .subcommand(
            Command::new("render")
                .about("Render the edge configuration with the secret inlined")
                .arg(jwt_secret())
                .arg(auth_route_prefix())
                .arg(cookie_name())
                .arg(
                    Arg::new("template")
                        .long("template")
                        .help("Template to render instead of the built-in one"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("File to write the rendered configuration to")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("publish")
                .about("Write the secret to a key/value store read by the edge")
                .arg(jwt_secret())
                .arg(
                    Arg::new("key")
                        .long("key")
                        .help("Key to store the secret under")
                        .env("EDGEWARD_KV_KEY")
                        .default_value(DEFAULT_SECRET_KEY),
                )
                .arg(
                    Arg::new("kv-url")
                        .long("kv-url")
                        .help("Base URL of an HTTP key/value store")
                        .env("EDGEWARD_KV_URL"),
                )
                .arg(
                    Arg::new("kv-token")
                        .long("kv-token")
                        .help("Bearer token for the HTTP key/value store")
                        .env("EDGEWARD_KV_TOKEN")
                        .hide_env_values(true)
                        .requires("kv-url"),
                )
                .arg(
                    Arg::new("kv-dir")
                        .long("kv-dir")
                        .help("Directory of a local key/value store")
                        .env("EDGEWARD_KV_DIR"),
                )
                .group(
                    ArgGroup::new("store")
                        .args(["kv-url", "kv-dir"])
                        .required(true),
                ),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("edgeward")
        .about("OIDC sessions validated at the edge")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(serve())
        .subcommand(secret())
        .subcommand(edge())
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("EDGEWARD_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
