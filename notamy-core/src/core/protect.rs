//! Password protection of note content.
//!
//! The comment, linked file and body of a protected note are sealed with
//! AES-256-GCM. Each note gets a random 96-bit IV, stored hex encoded in the
//! record's `iv` field, and each field its own key derived with HKDF-SHA256
//! from the password, salted with the IV and bound to the field name. Sealed
//! fields are base64 encoded so they stay valid record text.

use crate::{NoteRecord, NotamyError, Result};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Placeholder shown instead of protected content.
pub const MASK: &str = "*****";

/// Hex SHA-512 of `password`, the form kept in the settings file.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

/// True when `password` hashes to `stored_hash`.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    hash_password(password).eq_ignore_ascii_case(stored_hash)
}

fn field_key(password: &str, iv: &[u8], field: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hk = Hkdf::<Sha256>::new(Some(iv), password.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(field.as_bytes(), &mut key[..])
        .map_err(|_| NotamyError::Cipher("key derivation failed".to_string()))?;
    Ok(key)
}

fn cipher_for(password: &str, iv: &[u8], field: &str) -> Result<Aes256Gcm> {
    let key = field_key(password, iv, field)?;
    Ok(Aes256Gcm::new(GenericArray::from_slice(&key[..])))
}

fn seal(password: &str, iv: &[u8], field: &str, value: &mut String) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let sealed = cipher_for(password, iv, field)?
        .encrypt(Nonce::from_slice(iv), value.as_bytes())
        .map_err(|_| NotamyError::Cipher(format!("cannot encrypt {field}")))?;
    *value = BASE64.encode(sealed);
    Ok(())
}

fn open(password: &str, iv: &[u8], field: &str, value: &mut String) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let sealed = BASE64
        .decode(value.as_bytes())
        .map_err(|_| NotamyError::Cipher(format!("{field} is not sealed data")))?;
    let plain = cipher_for(password, iv, field)?
        .decrypt(Nonce::from_slice(iv), sealed.as_slice())
        .map_err(|_| NotamyError::WrongPassword)?;
    *value = String::from_utf8(plain)
        .map_err(|_| NotamyError::Cipher(format!("{field} is not text")))?;
    Ok(())
}

/// Seals the sensitive fields of `record` in place and marks it protected.
///
/// # Errors
///
/// Returns [`NotamyError::Cipher`] if encryption fails.
pub fn encrypt_fields(record: &mut NoteRecord, password: &str) -> Result<()> {
    let mut iv = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut iv);

    seal(password, &iv, "comment", &mut record.comment)?;
    seal(password, &iv, "link_file", &mut record.link_file)?;
    if let Some(body) = record.body.as_mut() {
        seal(password, &iv, "body", body)?;
    }
    record.iv = hex::encode(iv);
    record.protected = true;
    Ok(())
}

/// Opens the sealed fields of a protected `record` in place.
///
/// The record keeps its protected flag and IV so it can be resealed.
///
/// # Errors
///
/// Returns [`NotamyError::WrongPassword`] if authentication fails and
/// [`NotamyError::Cipher`] for a malformed IV or field.
pub fn decrypt_fields(record: &mut NoteRecord, password: &str) -> Result<()> {
    if !record.protected {
        return Ok(());
    }
    let iv = hex::decode(&record.iv)
        .ok()
        .filter(|iv| iv.len() == NONCE_SIZE)
        .ok_or_else(|| NotamyError::Cipher("malformed IV".to_string()))?;

    open(password, &iv, "comment", &mut record.comment)?;
    open(password, &iv, "link_file", &mut record.link_file)?;
    if let Some(body) = record.body.as_mut() {
        open(password, &iv, "body", body)?;
    }
    Ok(())
}

/// Replaces every non-empty sensitive field with [`MASK`].
pub fn mask_fields(record: &mut NoteRecord) {
    for value in [&mut record.comment, &mut record.link_file] {
        if !value.is_empty() {
            *value = MASK.to_string();
        }
    }
    if record.body.is_some() {
        record.body = Some(MASK.to_string());
    }
}
