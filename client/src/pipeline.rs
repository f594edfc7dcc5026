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

//! Sign, broadcast and await confirmation of requests.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use mrv_registry_core::{Call, ProjectId, TxHash};

use crate::backend::{Backend, Outcome};
use crate::builder::UnsignedRequest;
use crate::context::Context;
use crate::error::Error;
use crate::event;
use crate::sequence::{Reservation, SequenceManager};
use crate::transaction::SignedTransaction;

/// A request that the ledger included and executed successfully.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Sequence number consumed by the request.
    pub sequence: u64,
    /// Project the request acted on. For `submitProject` this is the id the ledger assigned.
    pub project_id: Option<ProjectId>,
}

/// Turns [UnsignedRequest]s into [Confirmation]s.
///
/// Requests are never retried. An error for which [Error::outcome_unknown] holds marks the
/// sequence number stale. So does abandoning [SubmissionPipeline::submit] before the ledger
/// accepted the transaction. Abandoning it later only gives up the wait.
pub struct SubmissionPipeline {
    backend: Arc<dyn Backend>,
    sequences: Arc<SequenceManager>,
    confirmation_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(context: &Context, sequences: Arc<SequenceManager>) -> Self {
        SubmissionPipeline {
            backend: context.backend.clone(),
            sequences,
            confirmation_timeout: context.config.confirmation_timeout,
        }
    }

    /// Submit a request carrying the sequence number of `reservation`, which was allocated
    /// from this pipeline's [SequenceManager].
    pub async fn submit(
        &self,
        request: UnsignedRequest,
        reservation: Reservation,
    ) -> Result<Confirmation, Error> {
        let sequence = request.sequence;
        debug_assert_eq!(sequence, reservation.sequence());
        let transaction = match SignedTransaction::new_signed(self.sequences.account(), &request) {
            Ok(transaction) => transaction,
            Err(error) => {
                self.sequences.release(reservation).await;
                return Err(error);
            }
        };
        let tx_hash = transaction.hash();

        let submitted = self.backend.submit(transaction).await;
        reservation.settle();
        let included_fut = match submitted {
            Ok(included_fut) => included_fut,
            Err(error) => {
                self.sequences.mark_stale();
                return Err(match error {
                    Error::Broadcast(_) => error,
                    other => Error::Broadcast(other.to_string()),
                });
            }
        };
        log::info!(
            "Submitted {} as {} with sequence number {}",
            request.operation(),
            tx_hash,
            sequence
        );

        let included = match tokio::time::timeout(self.confirmation_timeout, included_fut).await {
            Ok(Ok(included)) => included,
            Ok(Err(error)) => {
                self.sequences.mark_stale();
                log::warn!("Lost track of transaction {}: {}", tx_hash, error);
                return Err(Error::ConfirmationTimeout {
                    tx_hash,
                    timeout: self.confirmation_timeout,
                });
            }
            Err(_) => {
                self.sequences.mark_stale();
                log::warn!(
                    "Transaction {} not confirmed within {:?}",
                    tx_hash,
                    self.confirmation_timeout
                );
                return Err(Error::ConfirmationTimeout {
                    tx_hash,
                    timeout: self.confirmation_timeout,
                });
            }
        };

        let events = match included.outcome {
            Outcome::Success { events } => events,
            Outcome::Reverted { reason } => {
                log::warn!("Transaction {} reverted: {}", tx_hash, reason);
                return Err(Error::ExecutionReverted { tx_hash, reason });
            }
        };
        log::info!(
            "Transaction {} confirmed in block {}",
            tx_hash,
            included.block_number
        );

        let project_id = match &request.call {
            Call::SubmitProject { .. } => match event::submitted_project_id(&events) {
                Some(id) => Some(id),
                None => self.last_assigned_project_id().await,
            },
            call => call.project_id(),
        };
        Ok(Confirmation {
            tx_hash,
            block_number: included.block_number,
            sequence,
            project_id,
        })
    }

    /// Read back the id of the most recently submitted project when the backend does not
    /// report events.
    async fn last_assigned_project_id(&self) -> Option<ProjectId> {
        match self.backend.next_project_id().await {
            Ok(next) => next.checked_sub(1).filter(|id| *id > 0),
            Err(error) => {
                log::warn!("Failed to read the assigned project id: {}", error);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::account::SigningAccount;
    use crate::backend::emulator::{Emulator, CHAIN_ID};
    use crate::builder::RequestBuilder;
    use crate::config::ClientConfig;
    use mrv_registry_core::{Address, Argument, Operation};

    struct Fixture {
        emulator: Emulator,
        sequences: Arc<SequenceManager>,
        builder: RequestBuilder,
        pipeline: SubmissionPipeline,
    }

    fn fixture() -> Fixture {
        let account = SigningAccount::generate();
        let emulator = Emulator::new(account.address());
        let config = ClientConfig {
            confirmation_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        let context = Context {
            backend: Arc::new(emulator.clone()),
            contracts: Emulator::contracts(),
            chain_id: CHAIN_ID,
            config,
        };
        let sequences = Arc::new(SequenceManager::new(&context, account));
        Fixture {
            emulator,
            builder: RequestBuilder::new(&context),
            pipeline: SubmissionPipeline::new(&context, sequences.clone()),
            sequences,
        }
    }

    impl Fixture {
        async fn submit(
            &self,
            operation: Operation,
            arguments: &[Argument],
        ) -> Result<Confirmation, Error> {
            let reservation = self.sequences.allocate().await.unwrap();
            let request = self
                .builder
                .build(operation, arguments, reservation.sequence())
                .unwrap();
            self.pipeline.submit(request, reservation).await
        }
    }

    #[tokio::test]
    async fn submit_reports_assigned_id() {
        let fixture = fixture();
        let arguments = [Argument::from("sha256:00"), Argument::Uint(10)];
        for expected_id in 1..=2 {
            let confirmation = fixture
                .submit(Operation::SubmitProject, &arguments)
                .await
                .unwrap();
            assert_eq!(confirmation.project_id, Some(expected_id));
            assert_eq!(confirmation.sequence, expected_id - 1);
        }
    }

    #[tokio::test]
    async fn revert_consumes_sequence() {
        let fixture = fixture();
        let result = fixture
            .submit(Operation::SetUnderReview, &[Argument::Uint(1)])
            .await;
        assert!(matches!(result, Err(Error::ExecutionReverted { .. })));
        assert!(!fixture.sequences.is_stale());
        assert_eq!(fixture.sequences.allocate().await.unwrap().settle(), 1);
    }

    #[tokio::test]
    async fn timeout_marks_sequence_stale() {
        let fixture = fixture();
        fixture.emulator.withhold_next_confirmations(1);
        let result = fixture
            .submit(Operation::AddVerifier, &[Argument::from(Address::new([1; 20]))])
            .await;
        assert!(matches!(result, Err(Error::ConfirmationTimeout { .. })));
        assert!(fixture.sequences.is_stale());
        // The withheld transaction was executed, so the resync skips its number
        assert_eq!(fixture.sequences.allocate().await.unwrap().settle(), 1);
    }

    #[tokio::test]
    async fn broadcast_failure_marks_sequence_stale() {
        let fixture = fixture();
        fixture.emulator.fail_next_broadcasts(1);
        let result = fixture
            .submit(Operation::AddVerifier, &[Argument::from(Address::new([1; 20]))])
            .await;
        assert!(matches!(result, Err(Error::Broadcast(_))));
        assert!(fixture.sequences.is_stale());
        assert_eq!(fixture.sequences.allocate().await.unwrap().settle(), 0);
    }
}
