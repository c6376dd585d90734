pub mod url_validator;

pub use url_validator::validate_url;

/// 短码字母表：62 个字母数字字符
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 短码固定长度
pub const CODE_LENGTH: usize = 8;

/// Generate a uniformly random short code over [`CODE_ALPHABET`].
///
/// Uses the thread RNG, which is cryptographically strong; codes are the
/// public lookup key, so predictability matters. Uniqueness is NOT checked
/// here, the registry enforces it on insert.
pub fn generate_random_code() -> String {
    use std::iter;

    iter::repeat_with(|| CODE_ALPHABET[rand::random_range(0..CODE_ALPHABET.len())] as char)
        .take(CODE_LENGTH)
        .collect()
}

/// Check that a code has the expected length and stays inside the alphabet.
pub fn is_valid_short_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
