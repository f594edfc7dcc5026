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

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use mrv_registry_core::{ArgumentError, EvidenceError, ProjectId, TransitionError, TxHash};

/// Error that may be returned by any of the [crate::ClientT] methods
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Arguments do not match the schema of the operation. Never reaches the network.
    #[error(transparent)]
    InvalidArgument(#[from] ArgumentError),

    /// Evidence is malformed or out of range. Never reaches the network.
    #[error(transparent)]
    InvalidEvidence(#[from] EvidenceError),

    /// The ledger could not be reached to read state or to resync the sequence number.
    #[error("Cannot reach the ledger: {0}")]
    Connectivity(String),

    /// The request could not be signed or encoded.
    #[error("Failed to encode request: {0}")]
    Encoding(String),

    /// Broadcasting the signed request failed. The ledger may or may not have accepted it.
    #[error("Failed to broadcast transaction: {0}")]
    Broadcast(String),

    /// The transaction was broadcast but not confirmed in time. The ledger may still include it.
    #[error("Transaction {tx_hash} was not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx_hash: TxHash, timeout: Duration },

    /// The ledger included the transaction and rejected it.
    #[error("Transaction {tx_hash} reverted: {reason}")]
    ExecutionReverted { tx_hash: TxHash, reason: String },

    /// The local lifecycle check rejected the operation.
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("Project {0} does not exist")]
    ProjectNotFound(ProjectId),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::InvalidEvidence(_) => ErrorKind::InvalidArgument,
            Error::Connectivity(_) => ErrorKind::Connectivity,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Broadcast(_) => ErrorKind::Broadcast,
            Error::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Error::ExecutionReverted { .. } => ErrorKind::ExecutionReverted,
            Error::IllegalTransition(_) => ErrorKind::IllegalTransition,
            Error::ProjectNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// `true` if a transaction may have been accepted by the ledger even though an error was
    /// returned. The account sequence number must be read again from the ledger afterwards.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            Error::Broadcast(_) | Error::ConfirmationTimeout { .. }
        )
    }
}

/// Classification of [Error]s shown to operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Connectivity,
    Encoding,
    Broadcast,
    ConfirmationTimeout,
    ExecutionReverted,
    IllegalTransition,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgumentError",
            ErrorKind::Connectivity => "ConnectivityError",
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::Broadcast => "BroadcastError",
            ErrorKind::ConfirmationTimeout => "ConfirmationTimeoutError",
            ErrorKind::ExecutionReverted => "ExecutionRevertedError",
            ErrorKind::IllegalTransition => "IllegalTransitionError",
            ErrorKind::NotFound => "NotFoundError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Connectivity(error.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mrv_registry_core::Operation;

    #[test]
    fn kinds() {
        let error = Error::from(ArgumentError::Arity {
            operation: Operation::RejectProject,
            expected: 1,
            actual: 0,
        });
        assert_eq!(error.kind().as_str(), "InvalidArgumentError");
        assert!(!error.outcome_unknown());

        let error = Error::ConfirmationTimeout {
            tx_hash: TxHash::default(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(error.kind(), ErrorKind::ConfirmationTimeout);
        assert!(error.outcome_unknown());
        assert!(Error::Broadcast(String::from("down")).outcome_unknown());
        assert!(!Error::ExecutionReverted {
            tx_hash: TxHash::default(),
            reason: String::new()
        }
        .outcome_unknown());
        assert_eq!(
            serde_json::to_string(&ErrorKind::IllegalTransition).unwrap(),
            "\"IllegalTransitionError\""
        );
    }
}
