use edge_verifier::{base64url, sign_into, verify_token, TimeBounds, TokenError};

const SECRET: &[u8] = b"s3cr3t-32-bytes-minimum-xxxxxxxx";
const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

fn encode(bytes: &[u8]) -> String {
    let mut out = vec![0u8; base64url::encoded_len(bytes.len())];
    let n = base64url::encode(bytes, &mut out).expect("buffer sized by encoded_len");
    out.truncate(n);
    String::from_utf8(out).expect("base64url is ascii")
}

fn mint(claims: &str, secret: &[u8]) -> String {
    let payload = encode(claims.as_bytes());
    let signature = sign_into(HEADER.as_bytes(), payload.as_bytes(), secret).expect("sign");
    format!(
        "{HEADER}.{payload}.{}",
        std::str::from_utf8(&signature).expect("ascii")
    )
}

#[test]
fn round_trip_inside_validity_window() {
    let token = mint(r#"{"sub":"user-42","iat":100,"nbf":100,"exp":200}"#, SECRET);
    for now in [100, 150, 200] {
        assert_eq!(
            verify_token(&token, SECRET, now),
            Ok(TimeBounds {
                exp: Some(200),
                nbf: Some(100)
            }),
            "now = {now}"
        );
    }
}

#[test]
fn every_single_bit_flip_in_signature_fails() {
    let token = mint(r#"{"sub":"user-42","exp":200}"#, SECRET);
    let signature_start = token.rfind('.').expect("three segments") + 1;

    for index in signature_start..token.len() {
        for bit in 0..8 {
            let mut bytes = token.clone().into_bytes();
            bytes[index] ^= 1 << bit;
            let Ok(flipped) = String::from_utf8(bytes) else {
                continue;
            };
            let result = verify_token(&flipped, SECRET, 150);
            assert!(
                result.is_err(),
                "flip of bit {bit} at {index} accepted: {flipped}"
            );
        }
    }
}

#[test]
fn tampered_payload_fails_signature() {
    let token = mint(r#"{"sub":"user-42","exp":200}"#, SECRET);
    let forged_payload = encode(br#"{"sub":"admin","exp":200}"#);
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = &forged_payload;
    assert_eq!(
        verify_token(&parts.join("."), SECRET, 150),
        Err(TokenError::SignatureInvalid)
    );
}

#[test]
fn boundaries_are_in_epoch_seconds() {
    let now = 1_700_000_000;
    let expired = mint(&format!(r#"{{"sub":"u","exp":{}}}"#, now - 1), SECRET);
    let edge = mint(&format!(r#"{{"sub":"u","exp":{now}}}"#), SECRET);
    let early = mint(&format!(r#"{{"sub":"u","nbf":{}}}"#, now + 1), SECRET);

    assert_eq!(verify_token(&expired, SECRET, now), Err(TokenError::Expired));
    assert!(verify_token(&edge, SECRET, now).is_ok());
    assert_eq!(verify_token(&early, SECRET, now), Err(TokenError::NotYetValid));
}

#[test]
fn oversized_payload_is_malformed() {
    let filler = "x".repeat(edge_verifier::MAX_PAYLOAD_LEN);
    let token = mint(&format!(r#"{{"sub":"{filler}"}}"#), SECRET);
    assert_eq!(
        verify_token(&token, SECRET, 0),
        Err(TokenError::MalformedToken)
    );
}
