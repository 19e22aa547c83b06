use crate::api::handlers::{health, oidc};
use utoipa::{
    openapi::{Contact, InfoBuilder, License},
    OpenApi,
};

/// Path prefix the `oidc` routes are documented under.
const DOCUMENTED_PREFIX: &str = "/auth";

#[derive(OpenApi)]
#[openapi(
    paths(health::health, oidc::authorize, oidc::callback, oidc::logout),
    components(schemas(health::Health, oidc::ErrorBody)),
    tags(
        (name = "health", description = "Service status"),
        (name = "oidc", description = "Authorization-code flow and session cookie issuance")
    )
)]
struct ApiDoc;

/// `OpenAPI` document with the `oidc` routes under `auth_route_prefix`.
#[must_use]
pub fn openapi(auth_route_prefix: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();

    if auth_route_prefix != DOCUMENTED_PREFIX {
        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| match path.strip_prefix(DOCUMENTED_PREFIX) {
                Some(rest) if rest.starts_with("/oidc/") => {
                    (format!("{auth_route_prefix}{rest}"), item)
                }
                _ => (path, item),
            })
            .collect();
    }

    doc
}

fn cargo_info() -> utoipa::openapi::Info {
    // Cargo.toml metadata rather than the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // authors are `;` separated, each possibly "Name <email>"
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> { Some(s.trim()).filter(|s| !s.is_empty()) }
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
