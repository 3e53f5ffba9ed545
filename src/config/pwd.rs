//! Encrypted config leaves.
//!
//! An encrypted leaf is an object `{"enc": "<hex nonce||ciphertext>"}`.
//! Keys are derived from operator-supplied passwords (SHA-256, AES-256-GCM);
//! every password is tried in declaration order. Decryption happens between
//! load and freeze; an undecryptable leaf is logged and left in place so the
//! failure surfaces at its point of use instead of aborting the whole load.

use std::fs;
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use log::warn;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::Result;

const NONCE_LEN: usize = 12;

/// Reads a password file: one password per line, blank lines skipped.
pub fn read_password_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Walks the tree and decrypts every encrypted leaf in place.
/// Returns the number of leaves decrypted.
pub fn decrypt_tree(node: &mut Value, pwds: &[String]) -> usize {
    match node {
        Value::Object(map) => {
            if let Some(payload) = encrypted_payload(map) {
                return match try_decrypt(&payload, pwds) {
                    Some(plain) => {
                        *node = Value::String(plain);
                        1
                    }
                    None => {
                        warn!("unable to decrypt config entry with provided password(s)");
                        0
                    }
                };
            }
            map.values_mut().map(|v| decrypt_tree(v, pwds)).sum()
        }
        Value::Array(items) => items.iter_mut().map(|v| decrypt_tree(v, pwds)).sum(),
        _ => 0,
    }
}

fn encrypted_payload(map: &serde_json::Map<String, Value>) -> Option<String> {
    if map.len() != 1 {
        return None;
    }
    map.get("enc").and_then(Value::as_str).map(str::to_string)
}

fn try_decrypt(payload: &str, pwds: &[String]) -> Option<String> {
    let bytes = hex::decode(payload).ok()?;
    if bytes.len() <= NONCE_LEN {
        return None;
    }
    let (nonce, ct) = bytes.split_at(NONCE_LEN);
    for pwd in pwds {
        let key = Sha256::digest(pwd.as_bytes());
        let cipher = match Aes256Gcm::new_from_slice(&key) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if let Ok(plain) = cipher.decrypt(Nonce::from_slice(nonce), ct) {
            if let Ok(s) = String::from_utf8(plain) {
                return Some(s);
            }
        }
    }
    None
}

/// Encrypts a string into the leaf form understood by [`decrypt_tree`].
/// The nonce is derived from password and plaintext, so the output is
/// deterministic for a given pair.
pub fn encrypt_value(plain: &str, pwd: &str) -> Result<Value> {
    let key = Sha256::digest(pwd.as_bytes());
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|_| crate::errors::Error::config("invalid derived key length"))?;
    let nonce_bytes = Sha256::digest([plain.as_bytes(), pwd.as_bytes()].concat());
    let nonce = Nonce::from_slice(&nonce_bytes[..NONCE_LEN]);
    let ct = cipher
        .encrypt(nonce, plain.as_bytes())
        .map_err(|_| crate::errors::Error::config("encryption failed"))?;
    let mut payload = nonce.to_vec();
    payload.extend(ct);
    Ok(serde_json::json!({"enc": hex::encode(payload)}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_round_trip_with_second_password() {
        let leaf = encrypt_value("s3cret-uri", "pw2").unwrap();
        let mut tree = json!({"resource": {"extcat": {"uri": leaf}}});
        let n = decrypt_tree(&mut tree, &["pw1".into(), "pw2".into()]);
        assert_eq!(n, 1);
        assert_eq!(
            tree["resource"]["extcat"]["uri"],
            Value::String("s3cret-uri".into())
        );
    }

    #[test]
    fn test_wrong_password_leaves_leaf_in_place() {
        let leaf = encrypt_value("hidden", "right").unwrap();
        let mut tree = json!({"a": leaf.clone()});
        let n = decrypt_tree(&mut tree, &["wrong".into()]);
        assert_eq!(n, 0);
        assert_eq!(tree["a"], leaf);
    }

    #[test]
    fn test_plain_objects_untouched() {
        let mut tree = json!({"enc_like": {"enc": 5}, "other": {"a": 1, "enc": "00"}});
        let snapshot = tree.clone();
        assert_eq!(decrypt_tree(&mut tree, &["pw".into()]), 0);
        assert_eq!(tree, snapshot);
    }

    #[test]
    fn test_read_password_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "first\n\n  second  ").unwrap();
        let pwds = read_password_file(f.path()).unwrap();
        assert_eq!(pwds, vec!["first".to_string(), "second".to_string()]);
    }
}
