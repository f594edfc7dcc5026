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

//! Signed ledger transactions.
//!
//! Transactions use the EIP-1559 envelope
//! `0x02 || rlp([chain_id, nonce, priority_fee, max_fee, gas_limit, to, value, data, access_list,
//! y_parity, r, s])`. The signature covers the Keccak-256 hash of the envelope without the three
//! signature fields. The sequence number of the signing account is the nonce.
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use rlp::{Rlp, RlpStream};

use mrv_registry_core::{Address, Call, TxHash, H256};

use crate::abi;
use crate::account::{address_of, SigningAccount};
use crate::builder::UnsignedRequest;
use crate::config::FeeBounds;
use crate::error::Error;

const TRANSACTION_TYPE: u8 = 0x02;

/// A signed and encoded transaction. Immutable once created.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedTransaction {
    chain_id: u64,
    sequence: u64,
    fees: FeeBounds,
    gas_limit: u64,
    to: Address,
    data: Vec<u8>,
    y_parity: u8,
    r: Vec<u8>,
    s: Vec<u8>,
    payload: Vec<u8>,
    hash: TxHash,
}

impl SignedTransaction {
    /// Sign `request` with `account`.
    ///
    /// Fails with [Error::Encoding] if the request has inconsistent fee parameters, a zero gas
    /// limit or a zero chain id.
    pub fn new_signed(account: &SigningAccount, request: &UnsignedRequest) -> Result<Self, Error> {
        if request.fees.priority_fee > request.fees.max_fee {
            return Err(Error::Encoding(format!(
                "priority fee {} exceeds the fee cap {}",
                request.fees.priority_fee, request.fees.max_fee
            )));
        }
        if request.gas_limit == 0 {
            return Err(Error::Encoding(String::from("gas limit must be positive")));
        }
        if request.chain_id == 0 {
            return Err(Error::Encoding(String::from("chain id must be positive")));
        }

        let mut transaction = SignedTransaction {
            chain_id: request.chain_id,
            sequence: request.sequence,
            fees: request.fees,
            gas_limit: request.gas_limit,
            to: request.to,
            data: request.data.clone(),
            y_parity: 0,
            r: Vec::new(),
            s: Vec::new(),
            payload: Vec::new(),
            hash: TxHash::default(),
        };
        let (signature, recovery_id) = account
            .sign_prehash(&transaction.signing_hash())
            .map_err(|e| Error::Encoding(format!("signing failed: {}", e)))?;
        let bytes = signature.to_bytes();
        transaction.y_parity = recovery_id.to_byte();
        transaction.r = strip_leading_zeros(&bytes[..32]);
        transaction.s = strip_leading_zeros(&bytes[32..]);
        transaction.payload = transaction.encode(true);
        transaction.hash = H256::keccak256(&transaction.payload);
        Ok(transaction)
    }

    /// Decode a transaction from its wire encoding.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let malformed = |detail: String| Error::Encoding(format!("malformed transaction: {}", detail));
        match payload.first() {
            Some(&TRANSACTION_TYPE) => (),
            _ => return Err(malformed(String::from("unsupported transaction type"))),
        }
        let rlp = Rlp::new(&payload[1..]);
        let decode_error = |e: rlp::DecoderError| malformed(e.to_string());
        if rlp.item_count().map_err(decode_error)? != 12 {
            return Err(malformed(String::from("expected 12 fields")));
        }
        let to: Vec<u8> = rlp.val_at(5).map_err(decode_error)?;
        let value: u128 = rlp.val_at(6).map_err(decode_error)?;
        if value != 0 {
            return Err(malformed(String::from("value transfers are not supported")));
        }
        Ok(SignedTransaction {
            chain_id: rlp.val_at(0).map_err(decode_error)?,
            sequence: rlp.val_at(1).map_err(decode_error)?,
            fees: FeeBounds {
                priority_fee: rlp.val_at(2).map_err(decode_error)?,
                max_fee: rlp.val_at(3).map_err(decode_error)?,
            },
            gas_limit: rlp.val_at(4).map_err(decode_error)?,
            to: Address::from_slice(&to).map_err(|e| malformed(e.to_string()))?,
            data: rlp.val_at(7).map_err(decode_error)?,
            y_parity: rlp.val_at(9).map_err(decode_error)?,
            r: rlp.val_at(10).map_err(decode_error)?,
            s: rlp.val_at(11).map_err(decode_error)?,
            payload: payload.to_vec(),
            hash: H256::keccak256(payload),
        })
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// The wire encoding.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decode the registry call carried by the transaction.
    pub fn call(&self) -> Result<Call, Error> {
        abi::decode_call(&self.data).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Recover the address of the signing account.
    pub fn sender(&self) -> Result<Address, Error> {
        let invalid = |detail: String| Error::Encoding(format!("invalid signature: {}", detail));
        if self.r.len() > 32 || self.s.len() > 32 {
            return Err(invalid(String::from("signature scalar too long")));
        }
        let mut bytes = [0u8; 64];
        bytes[32 - self.r.len()..32].copy_from_slice(&self.r);
        bytes[64 - self.s.len()..].copy_from_slice(&self.s);
        let signature = Signature::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
        let recovery_id = RecoveryId::from_byte(self.y_parity)
            .ok_or_else(|| invalid(String::from("invalid recovery id")))?;
        let key = VerifyingKey::recover_from_prehash(
            self.signing_hash().as_bytes(),
            &signature,
            recovery_id,
        )
        .map_err(|e| invalid(e.to_string()))?;
        Ok(address_of(&key))
    }

    fn signing_hash(&self) -> H256 {
        H256::keccak256(&self.encode(false))
    }

    fn encode(&self, with_signature: bool) -> Vec<u8> {
        let mut stream = RlpStream::new_list(if with_signature { 12 } else { 9 });
        stream.append(&self.chain_id);
        stream.append(&self.sequence);
        stream.append(&self.fees.priority_fee);
        stream.append(&self.fees.max_fee);
        stream.append(&self.gas_limit);
        stream.append(&self.to.as_bytes().to_vec());
        stream.append(&0u8);
        stream.append(&self.data);
        stream.begin_list(0);
        if with_signature {
            stream.append(&self.y_parity);
            stream.append(&self.r);
            stream.append(&self.s);
        }
        let mut encoded = vec![TRANSACTION_TYPE];
        encoded.extend_from_slice(&stream.out());
        encoded
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
