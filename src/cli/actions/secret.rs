use anyhow::Result;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

pub const SECRET_BYTES: usize = 32;

/// 32 bytes from the OS RNG, base64url without padding.
#[must_use]
pub fn generate() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Print a new secret to stdout.
/// # Errors
/// Never fails; returns `Result` to fit the action dispatch.
#[allow(clippy::unnecessary_wraps)]
pub fn execute() -> Result<()> {
    println!("{}", generate());
    Ok(())
}
