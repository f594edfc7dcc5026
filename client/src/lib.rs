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

//! Client library to administer the MRV carbon-credit registry.
//!
//! The [Client] talks either to a node through the Ethereum JSON-RPC protocol or to an
//! in-memory [Emulator] of the registry contracts. Use [ClientT] for the operator surface.
//!
//! State-changing operations run through these stages:
//!
//! 1. The arguments are checked against the schema of the operation.
//! 2. The lifecycle of the affected project is checked against freshly read state.
//! 3. A sequence number is allocated from the [SequenceManager].
//! 4. The [RequestBuilder] fixes the request, and the [SubmissionPipeline] signs it, broadcasts
//!    it and waits for the confirmation.
//!
//! Nothing is retried automatically.
use futures::stream::BoxStream;
use std::sync::Arc;
use url::Url;

pub mod abi;
mod account;
pub mod backend;
mod builder;
mod config;
mod context;
mod error;
pub mod event;
mod interface;
mod pipeline;
mod query;
mod sequence;
mod transaction;

pub use crate::backend::{Backend, Emulator, RemoteNode};
pub use crate::builder::{RequestBuilder, UnsignedRequest};
pub use crate::context::Context;
pub use crate::interface::*;
pub use crate::pipeline::SubmissionPipeline;
pub use crate::query::QueryFacade;
pub use crate::sequence::{Reservation, SequenceManager};
pub use crate::transaction::SignedTransaction;

/// Client to administer the registry with a single signing account.
///
/// Implements [ClientT].
#[derive(Clone)]
pub struct Client {
    context: Context,
    sequences: Arc<SequenceManager>,
    builder: RequestBuilder,
    pipeline: Arc<SubmissionPipeline>,
    query: QueryFacade,
}

impl Client {
    /// Connect to the node at `url`.
    ///
    /// Fails with [Error::Connectivity] if the node cannot be reached.
    pub async fn create(
        url: Url,
        contracts: Contracts,
        account: SigningAccount,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        log::info!("Connecting to {}", url);
        let backend = RemoteNode::new(url, contracts, config.poll_interval)?;
        Self::with_backend(Arc::new(backend), contracts, account, config).await
    }

    /// Create a client for an arbitrary backend. Reads the chain id from the backend.
    pub async fn with_backend(
        backend: Arc<dyn Backend>,
        contracts: Contracts,
        account: SigningAccount,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        let chain_id = backend.chain_id().await?;
        let context = Context {
            backend,
            contracts,
            chain_id,
            config,
        };
        Ok(Self::from_context(context, account))
    }

    /// Create a client running against a fresh [Emulator] whose contracts are owned by
    /// `account`.
    pub fn new_emulator(account: SigningAccount) -> Self {
        let emulator = Emulator::new(account.address());
        Self::with_emulator(&emulator, account, ClientConfig::default())
    }

    /// Create a client running against `emulator`. Clients created from the same emulator
    /// share the ledger state.
    pub fn with_emulator(emulator: &Emulator, account: SigningAccount, config: ClientConfig) -> Self {
        let context = Context {
            backend: Arc::new(emulator.clone()),
            contracts: Emulator::contracts(),
            chain_id: backend::emulator::CHAIN_ID,
            config,
        };
        Self::from_context(context, account)
    }

    pub fn from_context(context: Context, account: SigningAccount) -> Self {
        let sequences = Arc::new(SequenceManager::new(&context, account));
        Client {
            builder: RequestBuilder::new(&context),
            pipeline: Arc::new(SubmissionPipeline::new(&context, sequences.clone())),
            query: QueryFacade::new(&context),
            sequences,
            context,
        }
    }

    pub fn sequences(&self) -> &SequenceManager {
        &self.sequences
    }

    pub fn query(&self) -> &QueryFacade {
        &self.query
    }

    /// Check the lifecycle of the project `call` acts on, if any.
    async fn check_lifecycle(&self, call: &Call) -> Result<(), Error> {
        let project_id = match call.project_id() {
            Some(project_id) => project_id,
            None => return Ok(()),
        };
        let project = self.query.get_project(project_id).await?;
        let caller_is_verifier = if call.operation().requires_verifier() {
            self.query.is_verifier(self.address()).await?
        } else {
            false
        };
        let to = lifecycle::validate(&project, call, caller_is_verifier)?;
        log::debug!(
            "Project {} may move from {} to {}",
            project_id,
            project.status,
            to
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClientT for Client {
    fn address(&self) -> Address {
        self.sequences.current_address()
    }

    fn contracts(&self) -> Contracts {
        self.context.contracts
    }

    fn chain_id(&self) -> u64 {
        self.context.chain_id
    }

    async fn sign_and_submit_call(&self, call: Call) -> Result<Confirmation, Error> {
        call.validate()?;
        self.check_lifecycle(&call).await?;
        let reservation = self.sequences.allocate().await?;
        let request = match self.builder.build_call(call, reservation.sequence()) {
            Ok(request) => request,
            Err(error) => {
                self.sequences.release(reservation).await;
                return Err(error.into());
            }
        };
        self.pipeline.submit(request, reservation).await
    }

    async fn owner(&self) -> Result<Address, Error> {
        self.query.owner().await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, Error> {
        self.query.get_project(id).await
    }

    async fn list_projects(&self) -> Result<BoxStream<'static, Project>, Error> {
        self.query.list_projects().await
    }

    async fn get_stats(&self) -> Result<Stats, Error> {
        self.query.get_stats().await
    }

    async fn records(&self) -> Result<Vec<Project>, Error> {
        self.query.records().await
    }

    async fn is_verifier(&self, address: Address) -> Result<bool, Error> {
        self.query.is_verifier(address).await
    }

    async fn network_info(&self) -> NetworkInfo {
        let (connected, chain_id) = match self.context.backend.chain_id().await {
            Ok(chain_id) => (true, chain_id),
            Err(error) => {
                log::warn!("Ledger unreachable: {}", error);
                (false, self.context.chain_id)
            }
        };
        NetworkInfo {
            connected,
            chain_id,
            network: network_name(chain_id),
            account: self.address(),
        }
    }
}
