//! OpenSSL `enc` compatible encryption of the sudo password
//!
//! Produces exactly what
//! `openssl enc -aes-128-cbc -md sha256 -a -A -pass pass:PASSPHRASE` would:
//! base64 (single line) of `Salted__` + 8 byte salt + AES-128-CBC/PKCS#7
//! ciphertext, with key and IV derived by EVP_BytesToKey (SHA-256, one round).
//! The remote askpass helper undoes it with [`decrypt_command`].

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{ProvisionError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const MAGIC: &[u8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 16;
const IV_LEN: usize = 16;

/// Encrypt `plaintext` under `passphrase`, returning single-line base64.
pub fn encrypt(plaintext: &str, passphrase: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encrypt_with_salt(plaintext, passphrase, salt)
}

fn encrypt_with_salt(plaintext: &str, passphrase: &str, salt: [u8; SALT_LEN]) -> String {
    let (mut key, mut iv) = derive_key_iv(passphrase.as_bytes(), &salt);
    let ciphertext = Aes128CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    key.zeroize();
    iv.zeroize();

    let mut blob = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&ciphertext);
    STANDARD.encode(blob)
}

/// Decrypt what [`encrypt`] (or `openssl enc -a -A`) produced.
///
/// # Errors
/// `ProvisionError::Cipher` for malformed input, a wrong passphrase (bad
/// padding) or a plaintext that is not UTF-8.
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<Zeroizing<String>> {
    let blob = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProvisionError::cipher(format!("invalid base64: {}", e)))?;

    if blob.len() < MAGIC.len() + SALT_LEN || &blob[..MAGIC.len()] != MAGIC {
        return Err(ProvisionError::cipher("missing salt header"));
    }
    let salt = &blob[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let ciphertext = &blob[MAGIC.len() + SALT_LEN..];

    let (mut key, mut iv) = derive_key_iv(passphrase.as_bytes(), salt);
    let plaintext = Aes128CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ProvisionError::cipher("bad decrypt"));
    key.zeroize();
    iv.zeroize();

    let plaintext = String::from_utf8(plaintext?)
        .map_err(|_| ProvisionError::cipher("plaintext is not UTF-8"))?;
    Ok(Zeroizing::new(plaintext))
}

/// Remote command decrypting base64 ciphertext on stdin, passphrase taken from `env_name`.
pub fn decrypt_command(env_name: &str) -> String {
    format!(
        "openssl enc -aes-128-cbc -md sha256 -d -a -A -pass env:{}",
        env_name
    )
}

/// EVP_BytesToKey with SHA-256 and a single iteration. One digest covers
/// both the 16 byte key and the 16 byte IV.
fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    hasher.update(salt);
    let mut digest = hasher.finalize();

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    iv.copy_from_slice(&digest[KEY_LEN..KEY_LEN + IV_LEN]);
    digest.as_mut_slice().zeroize();
    (key, iv)
}
