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

//! Define trait for client backends and provide emulator and remote node implementation
use futures::future::BoxFuture;

use mrv_registry_core::{Address, Project, ProjectId, TxHash};

use crate::error::Error;
use crate::event::Event;
use crate::transaction::SignedTransaction;

pub mod emulator;
mod remote_node;

pub use emulator::Emulator;
pub use remote_node::RemoteNode;

/// Indicator that a transaction has been included in a block and has been executed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionIncluded {
    pub tx_hash: TxHash,
    /// Number of the block the transaction is included in.
    pub block_number: u64,
    pub outcome: Outcome,
}

/// Result of executing an included transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success {
        /// Events emitted by the transaction, if the backend can provide them.
        events: Vec<Event>,
    },
    Reverted {
        reason: String,
    },
}

/// Backend for talking to the registry ledger.
///
/// The interface is low-level. It knows about the registry contracts but nothing about sequence
/// numbers or the project lifecycle.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Broadcast a signed transaction.
    ///
    /// Returns once the ledger has accepted the transaction. The returned future resolves when
    /// the transaction has been included and executed. Fails with [Error::Broadcast] if the
    /// transaction could not be handed to the ledger.
    async fn submit(
        &self,
        transaction: SignedTransaction,
    ) -> Result<BoxFuture<'static, Result<TransactionIncluded, Error>>, Error>;

    async fn chain_id(&self) -> Result<u64, Error>;

    /// Number of confirmed transactions sent from `address`. This is the next sequence number
    /// the ledger expects from the account.
    async fn transaction_count(&self, address: Address) -> Result<u64, Error>;

    /// Owner of the registry contract.
    async fn owner(&self) -> Result<Address, Error>;

    /// Next unassigned project id.
    async fn next_project_id(&self) -> Result<ProjectId, Error>;

    /// Returns `None` for ids the ledger has not assigned.
    async fn project(&self, id: ProjectId) -> Result<Option<Project>, Error>;

    async fn is_verifier(&self, address: Address) -> Result<bool, Error>;
}
