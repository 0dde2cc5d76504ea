//! Text encryption commands.

use cachebox::crypto::{decrypt_base64, encrypt_base64, AesKey};

use crate::error::CliError;

/// Encrypt `text` and print the base64 cipher.
pub fn encrypt(key: &str, text: &str) -> Result<(), CliError> {
    let key = AesKey::from_hex(key)?;
    println!("{}", encrypt_base64(text, &key)?);
    Ok(())
}

/// Decrypt a base64 cipher and print the text.
pub fn decrypt(key: &str, cipher: &str) -> Result<(), CliError> {
    let key = AesKey::from_hex(key)?;
    println!("{}", decrypt_base64(cipher, &key)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_commands_accept_valid_key() {
        assert!(encrypt(KEY, "hello").is_ok());
    }

    #[test]
    fn test_commands_reject_short_key() {
        assert!(matches!(encrypt("abcd", "hello"), Err(CliError::Crypto(_))));
        assert!(matches!(decrypt("abcd", "AAAA"), Err(CliError::Crypto(_))));
    }
}
