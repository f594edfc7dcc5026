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

//! Provide an abstract trait for the registry client and the necessary types.
//!
//! The [ClientT] trait defines one method for each operation of the registry as well as methods
//! to read the registry state.
use futures::stream::BoxStream;
use serde::Serialize;

pub use mrv_registry_core::*;

pub use crate::account::{KeyError, SigningAccount};
pub use crate::config::{ClientConfig, Contracts, FeeBounds, GWEI};
pub use crate::error::{Error, ErrorKind};
pub use crate::pipeline::Confirmation;

/// Chain id of a local development node.
const LOCAL_CHAIN_ID: u64 = 31337;

/// Connection details of the ledger a client talks to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub connected: bool,
    pub chain_id: u64,
    pub network: String,
    /// Address of the signing account.
    pub account: Address,
}

/// Human readable name of the network with `chain_id`.
pub fn network_name(chain_id: u64) -> String {
    if chain_id == LOCAL_CHAIN_ID {
        String::from("Hardhat Local")
    } else {
        format!("Chain {}", chain_id)
    }
}

/// Result of [ClientT::submit_evidence].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSubmission {
    pub confirmation: Confirmation,
    pub metadata_ref: String,
    pub estimated_tons: Tons,
}

/// Trait for registry clients sending requests and reading state.
///
/// Every state-changing method validates its arguments and the lifecycle of the project before
/// anything is sent to the ledger. It returns once the ledger confirmed the request.
#[async_trait::async_trait]
pub trait ClientT: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Address;

    fn contracts(&self) -> Contracts;

    /// Chain id of the ledger the client is connected to.
    fn chain_id(&self) -> u64;

    /// Sign and submit a registry call from the client's account.
    ///
    /// ```no_run
    /// # use mrv_registry_client::*;
    /// # async fn example(client: Client) -> Result<(), Error> {
    /// let call = Call::SubmitProject {
    ///     metadata_ref: String::from("sha256:0d1f"),
    ///     claimed_amount: 15,
    /// };
    ///
    /// // Fails locally if the call is invalid or the lifecycle forbids it. Otherwise waits
    /// // until the ledger confirmed or rejected the call.
    /// let confirmation = client.sign_and_submit_call(call).await?;
    /// println!("Project {:?} submitted", confirmation.project_id);
    /// # Ok(())
    /// # }
    /// ```
    async fn sign_and_submit_call(&self, call: Call) -> Result<Confirmation, Error>;

    async fn owner(&self) -> Result<Address, Error>;

    /// Fails with [Error::ProjectNotFound] if the project does not exist.
    async fn get_project(&self, id: ProjectId) -> Result<Project, Error>;

    /// Stream all readable projects in id order. See [crate::QueryFacade::list_projects].
    async fn list_projects(&self) -> Result<BoxStream<'static, Project>, Error>;

    async fn get_stats(&self) -> Result<Stats, Error>;

    /// All readable projects, most recently submitted first.
    async fn records(&self) -> Result<Vec<Project>, Error>;

    async fn is_verifier(&self, address: Address) -> Result<bool, Error>;

    async fn network_info(&self) -> NetworkInfo;

    /// Build a call from untyped arguments and submit it.
    ///
    /// Fails with [Error::InvalidArgument] if `arguments` do not match the parameters of
    /// `operation`.
    async fn execute(
        &self,
        operation: Operation,
        arguments: Vec<Argument>,
    ) -> Result<Confirmation, Error> {
        let call = Call::from_arguments(operation, &arguments)?;
        self.sign_and_submit_call(call).await
    }

    async fn add_verifier(&self, verifier: Address) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::AddVerifier { verifier })
            .await
    }

    async fn remove_verifier(&self, verifier: Address) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::RemoveVerifier { verifier })
            .await
    }

    async fn set_under_review(&self, project_id: ProjectId) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::SetUnderReview { project_id })
            .await
    }

    async fn approve(
        &self,
        project_id: ProjectId,
        approved_amount: Tons,
    ) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::ApproveProject {
            project_id,
            approved_amount,
        })
        .await
    }

    async fn reject(&self, project_id: ProjectId) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::RejectProject { project_id })
            .await
    }

    /// Submit a new project. The assigned id is [Confirmation::project_id].
    async fn submit(
        &self,
        metadata_ref: String,
        claimed_amount: Tons,
    ) -> Result<Confirmation, Error> {
        self.sign_and_submit_call(Call::SubmitProject {
            metadata_ref,
            claimed_amount,
        })
        .await
    }

    /// Issue credits for an approved project.
    ///
    /// `recipient` is parsed before anything else happens. A malformed address fails with
    /// [Error::InvalidArgument].
    async fn issue_credits(
        &self,
        project_id: ProjectId,
        recipient: &str,
    ) -> Result<Confirmation, Error> {
        self.execute(
            Operation::IssueCredits,
            vec![Argument::Uint(project_id), Argument::from(recipient)],
        )
        .await
    }

    /// Estimate the biomass of `evidence`, then submit a project claiming it with the reference
    /// of the evidence metadata.
    async fn submit_evidence(&self, evidence: &Evidence) -> Result<EvidenceSubmission, Error> {
        let metadata_ref = evidence.metadata_ref()?;
        let estimated_tons = evidence.estimated_biomass();
        log::info!(
            "Submitting evidence {} with an estimated {} tons",
            metadata_ref,
            estimated_tons
        );
        let confirmation = self.submit(metadata_ref.clone(), estimated_tons).await?;
        Ok(EvidenceSubmission {
            confirmation,
            metadata_ref,
            estimated_tons,
        })
    }
}
