//! OpenSSL `enc` stream decryption
//!
//! Format: `Salted__` + 8-byte salt + AES-256-CBC ciphertext (PKCS#7).
//! Key and IV come from `EVP_BytesToKey` with a single iteration. Older
//! `openssl enc` defaults to MD5 for the derivation, 1.1+ to SHA-256, so
//! both are tried in that order. Valid padding alone does not identify the
//! right digest; a candidate is kept only when it decrypts to text.

use std::path::Path;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::classify::{ContentType, classify};
use crate::error::{KubeError, Result};

/// Header of a salted OpenSSL stream
pub const SALT_MAGIC: &[u8] = b"Salted__";

const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Decrypt an OpenSSL salted stream with a passphrase
pub fn decrypt_symmetric_stream(data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let rest = data
        .strip_prefix(SALT_MAGIC)
        .ok_or_else(|| KubeError::decryption("missing Salted__ header"))?;

    if rest.len() < SALT_LEN {
        return Err(KubeError::decryption("truncated salt"));
    }
    let (salt, ciphertext) = rest.split_at(SALT_LEN);

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(KubeError::decryption(format!(
            "ciphertext length {} is not a multiple of the block size",
            ciphertext.len()
        )));
    }

    decrypt_with::<Md5>(passphrase.as_bytes(), salt, ciphertext)
        .filter(|out| is_plaintext(out))
        .or_else(|| {
            decrypt_with::<Sha256>(passphrase.as_bytes(), salt, ciphertext)
                .filter(|out| is_plaintext(out))
        })
        .ok_or_else(|| KubeError::decryption("bad decrypt (wrong key or corrupted data)"))
}

/// Read a file and decrypt it as an OpenSSL salted stream
pub fn decrypt_symmetric_file(path: &Path, passphrase: &str) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KubeError::NotFound {
            path: path.to_path_buf(),
        },
        _ => KubeError::Io(e),
    })?;
    decrypt_symmetric_stream(&data, passphrase)
}

fn is_plaintext(bytes: &[u8]) -> bool {
    matches!(classify(bytes), Ok(ContentType::Plaintext))
}

fn decrypt_with<D: Digest>(passphrase: &[u8], salt: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
    let (key, iv) = evp_bytes_to_key::<D>(passphrase, salt);
    let cipher = Aes256CbcDec::new_from_slices(&key, &iv).ok()?;
    cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).ok()
}

/// OpenSSL `EVP_BytesToKey` with one iteration
///
/// `D_i = H(D_{i-1} || passphrase || salt)`, concatenated until key and IV
/// are filled.
fn evp_bytes_to_key<D: Digest>(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN + 64);
    let mut previous: Vec<u8> = Vec::new();

    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = D::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Produce OpenSSL salted streams for tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    pub(crate) fn encrypt_md5(plaintext: &[u8], passphrase: &str, salt: [u8; SALT_LEN]) -> Vec<u8> {
        encrypt_with::<Md5>(plaintext, passphrase, salt)
    }

    pub(crate) fn encrypt_sha256(
        plaintext: &[u8],
        passphrase: &str,
        salt: [u8; SALT_LEN],
    ) -> Vec<u8> {
        encrypt_with::<Sha256>(plaintext, passphrase, salt)
    }

    fn encrypt_with<D: Digest>(
        plaintext: &[u8],
        passphrase: &str,
        salt: [u8; SALT_LEN],
    ) -> Vec<u8> {
        let (key, iv) = evp_bytes_to_key::<D>(passphrase.as_bytes(), &salt);
        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = SALT_MAGIC.to_vec();
        out.extend_from_slice(&salt);
        out.extend_from_slice(&ciphertext);
        out
    }
}
