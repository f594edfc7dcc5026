// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The operator credential.
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::fmt;

use mrv_registry_core::{Address, H256};

/// Reasons for a secret not being usable as a signing credential.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum KeyError {
    #[error("secret key is not valid hex")]
    InvalidHex,
    #[error("secret key must be 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("secret key is not a valid secp256k1 scalar")]
    InvalidScalar,
}

/// A secp256k1 key pair together with the account address derived from it.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the uncompressed public key.
#[derive(Clone)]
pub struct SigningAccount {
    key: SigningKey,
    address: Address,
}

impl SigningAccount {
    pub fn from_secret(secret: &[u8]) -> Result<Self, KeyError> {
        if secret.len() != 32 {
            return Err(KeyError::InvalidLength(secret.len()));
        }
        let key = SigningKey::from_slice(secret).map_err(|_| KeyError::InvalidScalar)?;
        let address = address_of(key.verifying_key());
        Ok(SigningAccount { key, address })
    }

    /// Parse a hex encoded secret with optional `0x` prefix.
    pub fn from_hex(secret: &str) -> Result<Self, KeyError> {
        let secret = secret.trim();
        let digits = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(digits).map_err(|_| KeyError::InvalidHex)?;
        Self::from_secret(&bytes)
    }

    pub fn generate() -> Self {
        let key = SigningKey::random(&mut rand::thread_rng());
        let address = address_of(key.verifying_key());
        SigningAccount { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn sign_prehash(
        &self,
        hash: &H256,
    ) -> Result<(Signature, RecoveryId), k256::ecdsa::Error> {
        self.key.sign_prehash_recoverable(hash.as_bytes())
    }
}

impl fmt::Debug for SigningAccount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SigningAccount")
            .field("address", &self.address)
            .finish()
    }
}

/// Account address controlled by `key`.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derives_address() {
        // Well-known development account
        let account = SigningAccount::from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            account.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn rejects_bad_secrets() {
        assert_eq!(
            SigningAccount::from_hex("0xzz").unwrap_err(),
            KeyError::InvalidHex
        );
        assert_eq!(
            SigningAccount::from_hex("0x0102").unwrap_err(),
            KeyError::InvalidLength(2)
        );
        assert_eq!(
            SigningAccount::from_secret(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidScalar
        );
    }

    #[test]
    fn debug_hides_secret() {
        let account = SigningAccount::generate();
        let debug = format!("{:?}", account);
        assert!(debug.contains(&account.address().to_string()));
        assert!(!debug.contains("key"));
    }
}
