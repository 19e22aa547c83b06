pub mod health;
pub mod oidc;
