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

//! Contract ABI encoding of registry calls and decoding of their return data.
//!
//! Only the types used by the registry contracts are supported: `uint256` values that fit into
//! 64 bits, `uint8`, `bool`, `address` and `string`.
use std::convert::TryFrom;

use mrv_registry_core::state::StatusCodeError;
use mrv_registry_core::{Address, Call, Operation, Project, ProjectId, ProjectStatus, H256};

use crate::event::Event;

const WORD: usize = 32;

/// Selector of the `Error(string)` revert payload.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AbiError {
    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("value at offset {0} does not fit into 64 bits")]
    Overflow(usize),

    #[error("value at offset {0} is not an address")]
    InvalidAddress(usize),

    #[error("value at offset {0} is not a boolean")]
    InvalidBool(usize),

    #[error("string data is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown function selector 0x{0}")]
    UnknownSelector(String),

    #[error("invalid project status: {0}")]
    InvalidStatus(#[from] StatusCodeError),
}

/// First four bytes of the Keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = H256::keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

/// Solidity signature of the contract function implementing `operation`.
pub fn signature(operation: Operation) -> &'static str {
    match operation {
        Operation::AddVerifier => "addVerifier(address)",
        Operation::RemoveVerifier => "removeVerifier(address)",
        Operation::SetUnderReview => "setUnderReview(uint256)",
        Operation::ApproveProject => "approveProject(uint256,uint256)",
        Operation::RejectProject => "rejectProject(uint256)",
        Operation::SubmitProject => "submitProject(string,uint256)",
        Operation::IssueCredits => "issueCredits(uint256,address)",
    }
}

/// A single ABI value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Token {
    Uint(u64),
    Address(Address),
    Bool(bool),
    String(String),
}

/// Encode `tokens` as a tuple following the ABI head/tail layout.
pub(crate) fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();
    for token in tokens {
        match token {
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Address(address) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(address.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::Bool(value) => head.extend_from_slice(&uint_word(*value as u64)),
            Token::String(value) => {
                let offset = tokens.len() * WORD + tail.len();
                head.extend_from_slice(&uint_word(offset as u64));
                tail.extend_from_slice(&uint_word(value.len() as u64));
                tail.extend_from_slice(value.as_bytes());
                let padding = (WORD - value.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }
    head.extend_from_slice(&tail);
    head
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for a state-changing call.
pub fn encode_call(call: &Call) -> Vec<u8> {
    let tokens = match call {
        Call::AddVerifier { verifier } | Call::RemoveVerifier { verifier } => {
            vec![Token::Address(*verifier)]
        }
        Call::SetUnderReview { project_id } | Call::RejectProject { project_id } => {
            vec![Token::Uint(*project_id)]
        }
        Call::ApproveProject {
            project_id,
            approved_amount,
        } => vec![Token::Uint(*project_id), Token::Uint(*approved_amount)],
        Call::SubmitProject {
            metadata_ref,
            claimed_amount,
        } => vec![
            Token::String(metadata_ref.clone()),
            Token::Uint(*claimed_amount),
        ],
        Call::IssueCredits {
            project_id,
            recipient,
        } => vec![Token::Uint(*project_id), Token::Address(*recipient)],
    };
    let mut data = selector(signature(call.operation())).to_vec();
    data.extend(encode_tokens(&tokens));
    data
}

/// Inverse of [encode_call].
pub fn decode_call(data: &[u8]) -> Result<Call, AbiError> {
    if data.len() < 4 {
        return Err(AbiError::TooShort {
            expected: 4,
            actual: data.len(),
        });
    }
    let operation = Operation::ALL
        .iter()
        .copied()
        .find(|operation| selector(signature(*operation)) == data[..4])
        .ok_or_else(|| AbiError::UnknownSelector(hex::encode(&data[..4])))?;
    let args = Decoder::new(&data[4..]);
    let call = match operation {
        Operation::AddVerifier => Call::AddVerifier {
            verifier: args.address(0)?,
        },
        Operation::RemoveVerifier => Call::RemoveVerifier {
            verifier: args.address(0)?,
        },
        Operation::SetUnderReview => Call::SetUnderReview {
            project_id: args.uint(0)?,
        },
        Operation::ApproveProject => Call::ApproveProject {
            project_id: args.uint(0)?,
            approved_amount: args.uint(1)?,
        },
        Operation::RejectProject => Call::RejectProject {
            project_id: args.uint(0)?,
        },
        Operation::SubmitProject => Call::SubmitProject {
            metadata_ref: args.string(0)?,
            claimed_amount: args.uint(1)?,
        },
        Operation::IssueCredits => Call::IssueCredits {
            project_id: args.uint(0)?,
            recipient: args.address(1)?,
        },
    };
    Ok(call)
}

/// Read-only contract functions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Read {
    Owner,
    NextProjectId,
    Project(ProjectId),
    IsVerifier(Address),
}

impl Read {
    pub fn encode(&self) -> Vec<u8> {
        let (signature, tokens) = match self {
            Read::Owner => ("owner()", vec![]),
            Read::NextProjectId => ("nextProjectId()", vec![]),
            Read::Project(id) => ("projects(uint256)", vec![Token::Uint(*id)]),
            Read::IsVerifier(address) => ("verifiers(address)", vec![Token::Address(*address)]),
        };
        let mut data = selector(signature).to_vec();
        data.extend(encode_tokens(&tokens));
        data
    }
}

pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    Decoder::new(data).address(0)
}

pub fn decode_uint(data: &[u8]) -> Result<u64, AbiError> {
    Decoder::new(data).uint(0)
}

pub fn decode_bool(data: &[u8]) -> Result<bool, AbiError> {
    Decoder::new(data).bool(0)
}

/// Decode the return data of `projects(uint256)`.
///
/// Returns `None` for ids the ledger never assigned. The ledger reports those as an all-zero
/// record with status code `0`.
pub fn decode_project(data: &[u8]) -> Result<Option<Project>, AbiError> {
    let fields = Decoder::new(data);
    let status_code = fields.uint(5)?;
    if status_code == 0 {
        return Ok(None);
    }
    let status_code = u8::try_from(status_code).map_err(|_| AbiError::Overflow(5 * WORD))?;
    Ok(Some(Project {
        id: fields.uint(0)?,
        submitter: fields.address(1)?,
        metadata_ref: fields.string(2)?,
        claimed_amount: fields.uint(3)?,
        approved_amount: fields.uint(4)?,
        status: ProjectStatus::from_code(status_code)?,
        submitted_at: fields.uint(6)?,
        updated_at: fields.uint(7)?,
    }))
}

/// Signature of the event the registry emits when it assigns a project id.
pub const PROJECT_SUBMITTED: &str = "ProjectSubmitted(uint256,address)";

/// A log entry of a transaction receipt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Log {
    /// Contract that emitted the log.
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

/// Decode a log emitted by the `registry` contract.
///
/// Returns `None` for logs of other contracts and for events the client does not interpret.
/// Parameters may be indexed or not: indexed ones are taken from the topics, the rest from the
/// data, both in declaration order.
pub fn decode_event(registry: Address, log: &Log) -> Result<Option<Event>, AbiError> {
    let is_submission = log.topics.first() == Some(&H256::keccak256(PROJECT_SUBMITTED.as_bytes()));
    if log.address != registry || !is_submission {
        return Ok(None);
    }
    let mut words = Vec::with_capacity((log.topics.len() - 1) * WORD + log.data.len());
    for topic in &log.topics[1..] {
        words.extend_from_slice(topic.as_bytes());
    }
    words.extend_from_slice(&log.data);
    let fields = Decoder::new(&words);
    Ok(Some(Event::ProjectSubmitted {
        project_id: fields.uint(0)?,
        submitter: fields.address(1)?,
    }))
}

/// Extract the reason string from `Error(string)` revert data.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != REVERT_SELECTOR {
        return None;
    }
    Decoder::new(&data[4..]).string(0).ok()
}

/// Random access to the words of ABI encoded data.
struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Decoder { data }
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8], AbiError> {
        let end = offset.checked_add(WORD).ok_or(AbiError::Overflow(offset))?;
        self.data.get(offset..end).ok_or(AbiError::TooShort {
            expected: end,
            actual: self.data.len(),
        })
    }

    fn uint_at(&self, offset: usize) -> Result<u64, AbiError> {
        let word = self.word_at(offset)?;
        if word[..WORD - 8].iter().any(|byte| *byte != 0) {
            return Err(AbiError::Overflow(offset));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&word[WORD - 8..]);
        Ok(u64::from_be_bytes(bytes))
    }

    fn uint(&self, index: usize) -> Result<u64, AbiError> {
        self.uint_at(index * WORD)
    }

    fn bool(&self, index: usize) -> Result<bool, AbiError> {
        match self.uint(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(AbiError::InvalidBool(index * WORD)),
        }
    }

    fn address(&self, index: usize) -> Result<Address, AbiError> {
        let offset = index * WORD;
        let word = self.word_at(offset)?;
        if word[..12].iter().any(|byte| *byte != 0) {
            return Err(AbiError::InvalidAddress(offset));
        }
        Address::from_slice(&word[12..]).map_err(|_| AbiError::InvalidAddress(offset))
    }

    fn string(&self, index: usize) -> Result<String, AbiError> {
        let offset = self.uint(index)? as usize;
        let len = self.uint_at(offset)? as usize;
        let start = offset + WORD;
        let end = start.checked_add(len).ok_or(AbiError::Overflow(offset))?;
        let bytes = self.data.get(start..end).ok_or(AbiError::TooShort {
            expected: end,
            actual: self.data.len(),
        })?;
        String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
    }
}
