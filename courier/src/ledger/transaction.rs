/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! ERC-20 calldata and legacy (EIP-155) transaction signing.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{length_of_length, BufMut, Encodable, Header};
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::common::{LedgerError, LedgerResult};

/// `decimals()`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Parses a hex address, with or without `0x`.
pub fn parse_address(raw: &str) -> LedgerResult<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| LedgerError::InvalidInput(format!("invalid address {raw:?}: {e}")))
}

/// Parses a hex-encoded secp256k1 secret key.
pub fn parse_signing_key(raw: &str) -> LedgerResult<SigningKey> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|e| LedgerError::Signing(format!("credential is not hex: {e}")))?;
    SigningKey::from_slice(&bytes)
        .map_err(|e| LedgerError::Signing(format!("credential is not a valid key: {e}")))
}

/// The account controlled by `key`: the last 20 bytes of the Keccak-256 hash
/// of the uncompressed public key without its `0x04` prefix.
pub fn address_of(key: &SigningKey) -> Address {
    let encoded = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

pub fn decimals_calldata() -> Vec<u8> {
    DECIMALS_SELECTOR.to_vec()
}

pub fn balance_of_calldata(owner: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&address_word(owner));
    data
}

pub fn transfer_calldata(to: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&amount.to_be_bytes());
    data
}

/// A pre-EIP-2718 transaction replay-protected with its chain id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// RLP encoding of the signed transaction.
    pub raw: Vec<u8>,
    /// Keccak-256 of `raw`, the transaction hash.
    pub hash: [u8; 32],
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

// The six transaction fields followed by either (chain_id, 0, 0) for the
// signing payload or (v, r, s) once signed.
struct Envelope<'a> {
    tx: &'a LegacyTransaction,
    v: u64,
    r: U256,
    s: U256,
}

impl Envelope<'_> {
    fn payload_length(&self) -> usize {
        self.tx.nonce.length()
            + self.tx.gas_price.length()
            + self.tx.gas_limit.length()
            + self.tx.to.length()
            + self.tx.value.length()
            + self.tx.data.length()
            + self.v.length()
            + self.r.length()
            + self.s.length()
    }
}

impl Encodable for Envelope<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.tx.nonce.encode(out);
        self.tx.gas_price.encode(out);
        self.tx.gas_limit.encode(out);
        self.tx.to.encode(out);
        self.tx.value.encode(out);
        self.tx.data.encode(out);
        self.v.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

impl LegacyTransaction {
    /// The EIP-155 signing payload.
    pub fn signing_payload(&self) -> Vec<u8> {
        alloy_rlp::encode(Envelope {
            tx: self,
            v: self.chain_id,
            r: U256::ZERO,
            s: U256::ZERO,
        })
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// Signs with `key`, encoding the recovery id as `v = recid + 35 + 2 * chain_id`.
    pub fn sign(&self, key: &SigningKey) -> LedgerResult<SignedTransaction> {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&self.signing_hash())
            .map_err(|e| LedgerError::Signing(e.to_string()))?;

        let bytes = signature.to_bytes();
        let r = U256::from_be_slice(&bytes[..32]);
        let s = U256::from_be_slice(&bytes[32..]);
        let v = u64::from(recovery_id.to_byte())
            .checked_add(35)
            .and_then(|v| self.chain_id.checked_mul(2).and_then(|c| c.checked_add(v)))
            .ok_or_else(|| LedgerError::Signing(format!("chain id {} too large", self.chain_id)))?;

        let raw = alloy_rlp::encode(Envelope { tx: self, v, r, s });
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash, v, r, s })
    }
}
