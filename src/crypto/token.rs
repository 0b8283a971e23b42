use rand::RngCore;
use rand::rngs::OsRng;

/// The size of a session token in bytes (256 bits).
const SESSION_TOKEN_SIZE: usize = 32;

/// Generates a new random session token.
///
/// # Returns
///
/// A hex-encoded token carrying 256 bits of entropy.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    hex::encode(token)
}

/// Digest under which a session token is stored and looked up.
///
/// The raw token only ever lives in the client and in the request that carries it.
pub fn hash_session_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
