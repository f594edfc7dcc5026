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

//! Provides [Emulator] backend to run the registry ledger in memory.
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt as _};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mrv_registry_core::{
    lifecycle, Address, Call, Operation, Project, ProjectId, ProjectStatus, Timestamp, Tons,
};

use crate::backend::{self, Outcome, TransactionIncluded};
use crate::config::Contracts;
use crate::error::Error;
use crate::event::Event;
use crate::transaction::SignedTransaction;

/// Chain id reported by the emulator.
pub const CHAIN_ID: u64 = 31337;

/// Timestamp of the first emulated block.
pub const GENESIS_TIMESTAMP: Timestamp = 1_700_000_000;

/// Seconds between two emulated blocks.
const BLOCK_TIME: Timestamp = 12;

const fn contract_address(index: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xc0;
    bytes[19] = index;
    Address::new(bytes)
}

const CONTRACTS: Contracts = Contracts {
    registry: contract_address(1),
    verification_manager: contract_address(2),
    token: contract_address(3),
};

/// [backend::Backend] implementation that runs the registry contracts in memory.
///
/// The emulator enforces the same rules as the deployed contracts:
///
/// * Only the owner adds and removes verifiers.
/// * Only verifiers move projects to review, approve or reject them.
/// * The owner or a verifier issues credits. Issuance mints the approved amount to the
///   recipient.
/// * Status changes follow [lifecycle::TRANSITIONS] and approvals never exceed the claim.
///
/// # Differences with real backend
///
/// * Every transaction is executed in its own block as soon as the account nonce matches.
///   Transactions with a nonce from the future wait until the gap is closed.
///
/// * Faults are injected explicitly, see [Emulator::set_unreachable],
///   [Emulator::fail_next_broadcasts], [Emulator::withhold_next_confirmations] and
///   [Emulator::fail_project_reads].
#[derive(Clone)]
pub struct Emulator {
    state: Arc<Mutex<EmulatorState>>,
}

/// Mutable state of the emulator.
struct EmulatorState {
    owner: Address,
    verifiers: HashSet<Address>,
    projects: BTreeMap<ProjectId, Project>,
    next_project_id: ProjectId,
    balances: HashMap<Address, Tons>,
    nonces: HashMap<Address, u64>,
    /// Transactions waiting for earlier nonces of the same account.
    queued: BTreeMap<(Address, u64), Queued>,
    block_number: u64,
    timestamp: Timestamp,
    faults: Faults,
}

struct Queued {
    transaction: SignedTransaction,
    notify: oneshot::Sender<TransactionIncluded>,
    withhold: bool,
}

#[derive(Default)]
struct Faults {
    unreachable: bool,
    failing_broadcasts: usize,
    withheld_confirmations: usize,
    failing_reads: HashSet<ProjectId>,
    /// Confirmation channels that are kept open but never completed.
    parked: Vec<oneshot::Sender<TransactionIncluded>>,
}

impl Emulator {
    /// Create an emulated ledger with freshly deployed contracts owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Emulator {
            state: Arc::new(Mutex::new(EmulatorState {
                owner,
                verifiers: HashSet::new(),
                projects: BTreeMap::new(),
                next_project_id: 1,
                balances: HashMap::new(),
                nonces: HashMap::new(),
                queued: BTreeMap::new(),
                block_number: 0,
                timestamp: GENESIS_TIMESTAMP,
                faults: Faults::default(),
            })),
        }
    }

    /// Addresses of the emulated contracts.
    pub fn contracts() -> Contracts {
        CONTRACTS
    }

    /// While unreachable, every read and broadcast fails.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().faults.unreachable = unreachable;
    }

    /// Reject the next `count` broadcasts without looking at the transactions.
    pub fn fail_next_broadcasts(&self, count: usize) {
        self.lock().faults.failing_broadcasts = count;
    }

    /// Execute the next `count` transactions but never confirm them.
    pub fn withhold_next_confirmations(&self, count: usize) {
        self.lock().faults.withheld_confirmations = count;
    }

    /// Make every read of project `id` fail.
    pub fn fail_project_reads(&self, id: ProjectId) {
        self.lock().faults.failing_reads.insert(id);
    }

    /// Credit token balance of `address`.
    pub fn balance_of(&self, address: Address) -> Tons {
        self.lock().balances.get(&address).copied().unwrap_or(0)
    }

    /// Number of transactions waiting for an earlier nonce.
    pub fn queued_transactions(&self) -> usize {
        self.lock().queued.len()
    }

    fn lock(&self) -> MutexGuard<EmulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&EmulatorState) -> Result<T, Error>) -> Result<T, Error> {
        let state = self.lock();
        if state.faults.unreachable {
            return Err(Error::Connectivity(String::from("emulated node is unreachable")));
        }
        f(&state)
    }

    fn submit_sync(
        &self,
        transaction: SignedTransaction,
    ) -> Result<BoxFuture<'static, Result<TransactionIncluded, Error>>, Error> {
        let mut state = self.lock();
        if state.faults.unreachable {
            return Err(Error::Broadcast(String::from("emulated node is unreachable")));
        }
        if state.faults.failing_broadcasts > 0 {
            state.faults.failing_broadcasts -= 1;
            return Err(Error::Broadcast(String::from("connection reset by peer")));
        }
        if transaction.chain_id() != CHAIN_ID {
            return Err(Error::Broadcast(format!(
                "invalid chain id {}",
                transaction.chain_id()
            )));
        }
        let sender = transaction
            .sender()
            .map_err(|e| Error::Broadcast(e.to_string()))?;
        let expected = state.nonce(sender);
        let sequence = transaction.sequence();
        if sequence < expected {
            return Err(Error::Broadcast(format!(
                "nonce too low: account {} expects {}, got {}",
                sender, expected, sequence
            )));
        }
        if state.queued.contains_key(&(sender, sequence)) {
            return Err(Error::Broadcast(format!(
                "a transaction with nonce {} is already queued for {}",
                sequence, sender
            )));
        }

        let withhold = state.faults.withheld_confirmations > 0;
        if withhold {
            state.faults.withheld_confirmations -= 1;
        }

        if sequence > expected {
            log::debug!(
                "Queueing transaction {} until nonce {} of {} is used",
                transaction.hash(),
                expected,
                sender
            );
            let (notify, included) = oneshot::channel();
            state.queued.insert(
                (sender, sequence),
                Queued {
                    transaction,
                    notify,
                    withhold,
                },
            );
            return Ok(async move {
                included
                    .await
                    .map_err(|_| Error::Broadcast(String::from("transaction dropped")))
            }
            .boxed());
        }

        let included = state.execute(sender, &transaction);
        state.run_queued(sender);
        if withhold {
            Ok(future::pending().boxed())
        } else {
            Ok(future::ready(Ok(included)).boxed())
        }
    }
}

impl EmulatorState {
    fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or(0)
    }

    /// Execute every queued transaction of `sender` whose nonce is due.
    fn run_queued(&mut self, sender: Address) {
        loop {
            let key = (sender, self.nonce(sender));
            let queued = match self.queued.remove(&key) {
                Some(queued) => queued,
                None => return,
            };
            let included = self.execute(sender, &queued.transaction);
            if queued.withhold {
                self.faults.parked.push(queued.notify);
            } else {
                // The receiver is gone if the caller stopped waiting
                let _ = queued.notify.send(included);
            }
        }
    }

    /// Include `transaction` in a new block.
    fn execute(&mut self, sender: Address, transaction: &SignedTransaction) -> TransactionIncluded {
        *self.nonces.entry(sender).or_insert(0) += 1;
        self.block_number += 1;
        self.timestamp += BLOCK_TIME;

        let outcome = match self.apply(sender, transaction) {
            Ok(events) => Outcome::Success { events },
            Err(reason) => {
                log::debug!("Transaction {} reverted: {}", transaction.hash(), reason);
                Outcome::Reverted { reason }
            }
        };
        TransactionIncluded {
            tx_hash: transaction.hash(),
            block_number: self.block_number,
            outcome,
        }
    }

    /// Apply the contract call of `transaction`. Returns the revert reason on failure. State is
    /// only modified if the call succeeds.
    fn apply(
        &mut self,
        sender: Address,
        transaction: &SignedTransaction,
    ) -> Result<Vec<Event>, String> {
        let call = transaction.call().map_err(|e| e.to_string())?;
        let operation = call.operation();
        if transaction.to() != CONTRACTS.address_of(operation.target()) {
            return Err(format!(
                "{} is not a function of contract {}",
                operation,
                transaction.to()
            ));
        }

        match call {
            Call::AddVerifier { verifier } => {
                self.ensure_owner(sender)?;
                self.verifiers.insert(verifier);
                Ok(vec![Event::VerifierAdded(verifier)])
            }
            Call::RemoveVerifier { verifier } => {
                self.ensure_owner(sender)?;
                self.verifiers.remove(&verifier);
                Ok(vec![Event::VerifierRemoved(verifier)])
            }
            Call::SubmitProject {
                metadata_ref,
                claimed_amount,
            } => {
                let project_id = self.next_project_id;
                self.next_project_id += 1;
                self.projects.insert(
                    project_id,
                    Project {
                        id: project_id,
                        submitter: sender,
                        metadata_ref,
                        claimed_amount,
                        approved_amount: 0,
                        status: ProjectStatus::Submitted,
                        submitted_at: self.timestamp,
                        updated_at: self.timestamp,
                    },
                );
                Ok(vec![Event::ProjectSubmitted {
                    project_id,
                    submitter: sender,
                }])
            }
            Call::SetUnderReview { project_id } | Call::RejectProject { project_id } => {
                self.ensure_verifier(sender)?;
                let status = self.transition(project_id, operation)?;
                Ok(vec![Event::StatusChanged { project_id, status }])
            }
            Call::ApproveProject {
                project_id,
                approved_amount,
            } => {
                self.ensure_verifier(sender)?;
                let claimed = self.existing(project_id)?.claimed_amount;
                if approved_amount > claimed {
                    return Err(String::from("Registry: approved amount exceeds claim"));
                }
                let status = self.transition(project_id, operation)?;
                if let Some(project) = self.projects.get_mut(&project_id) {
                    project.approved_amount = approved_amount;
                }
                Ok(vec![Event::StatusChanged { project_id, status }])
            }
            Call::IssueCredits {
                project_id,
                recipient,
            } => {
                if sender != self.owner && !self.verifiers.contains(&sender) {
                    return Err(String::from("VerificationManager: not authorized"));
                }
                if recipient.is_zero() {
                    return Err(String::from("ERC20: mint to the zero address"));
                }
                let amount = self.existing(project_id)?.approved_amount;
                let status = self.transition(project_id, operation)?;
                *self.balances.entry(recipient).or_insert(0) += amount;
                Ok(vec![
                    Event::StatusChanged { project_id, status },
                    Event::CreditsIssued {
                        project_id,
                        recipient,
                        amount,
                    },
                ])
            }
        }
    }

    fn ensure_owner(&self, sender: Address) -> Result<(), String> {
        if sender == self.owner {
            Ok(())
        } else {
            Err(String::from("Ownable: caller is not the owner"))
        }
    }

    fn ensure_verifier(&self, sender: Address) -> Result<(), String> {
        if self.verifiers.contains(&sender) {
            Ok(())
        } else {
            Err(String::from("Registry: caller is not a verifier"))
        }
    }

    fn existing(&self, project_id: ProjectId) -> Result<&Project, String> {
        self.projects
            .get(&project_id)
            .ok_or_else(|| String::from("Registry: unknown project"))
    }

    /// Move the project to the status `operation` leads to.
    fn transition(
        &mut self,
        project_id: ProjectId,
        operation: Operation,
    ) -> Result<ProjectStatus, String> {
        let timestamp = self.timestamp;
        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| String::from("Registry: unknown project"))?;
        let status = lifecycle::transition(project.status, operation)
            .ok_or_else(|| format!("Registry: invalid status {}", project.status))?;
        project.status = status;
        project.updated_at = timestamp;
        Ok(status)
    }
}

#[async_trait::async_trait]
impl backend::Backend for Emulator {
    async fn submit(
        &self,
        transaction: SignedTransaction,
    ) -> Result<BoxFuture<'static, Result<TransactionIncluded, Error>>, Error> {
        self.submit_sync(transaction)
    }

    async fn chain_id(&self) -> Result<u64, Error> {
        self.read(|_| Ok(CHAIN_ID))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, Error> {
        self.read(|state| Ok(state.nonce(address)))
    }

    async fn owner(&self) -> Result<Address, Error> {
        self.read(|state| Ok(state.owner))
    }

    async fn next_project_id(&self) -> Result<ProjectId, Error> {
        self.read(|state| Ok(state.next_project_id))
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, Error> {
        self.read(|state| {
            if state.faults.failing_reads.contains(&id) {
                return Err(Error::Connectivity(format!(
                    "failed to read project {}",
                    id
                )));
            }
            Ok(state.projects.get(&id).cloned())
        })
    }

    async fn is_verifier(&self, address: Address) -> Result<bool, Error> {
        self.read(|state| Ok(state.verifiers.contains(&address)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::account::SigningAccount;
    use crate::backend::Backend as _;
    use crate::builder::UnsignedRequest;
    use crate::config::FeeBounds;
    use futures::FutureExt as _;

    fn sign(account: &SigningAccount, call: Call, sequence: u64) -> SignedTransaction {
        let request = UnsignedRequest {
            to: CONTRACTS.address_of(call.operation().target()),
            data: crate::abi::encode_call(&call),
            call,
            sequence,
            fees: FeeBounds::default(),
            gas_limit: 3_000_000,
            chain_id: CHAIN_ID,
        };
        SignedTransaction::new_signed(account, &request).unwrap()
    }

    async fn apply(emulator: &Emulator, transaction: SignedTransaction) -> Outcome {
        emulator
            .submit(transaction)
            .await
            .unwrap()
            .await
            .unwrap()
            .outcome
    }

    #[tokio::test]
    async fn only_owner_manages_verifiers() {
        let owner = SigningAccount::generate();
        let other = SigningAccount::generate();
        let emulator = Emulator::new(owner.address());

        let call = Call::AddVerifier {
            verifier: other.address(),
        };
        let outcome = apply(&emulator, sign(&other, call.clone(), 0)).await;
        assert_eq!(
            outcome,
            Outcome::Reverted {
                reason: String::from("Ownable: caller is not the owner")
            }
        );
        assert!(!emulator.is_verifier(other.address()).await.unwrap());

        let outcome = apply(&emulator, sign(&owner, call, 0)).await;
        assert_eq!(
            outcome,
            Outcome::Success {
                events: vec![Event::VerifierAdded(other.address())]
            }
        );
        assert!(emulator.is_verifier(other.address()).await.unwrap());
    }

    #[tokio::test]
    async fn reverted_transactions_consume_nonce() {
        let account = SigningAccount::generate();
        let emulator = Emulator::new(Address::ZERO);
        let outcome = apply(
            &emulator,
            sign(&account, Call::RejectProject { project_id: 1 }, 0),
        )
        .await;
        assert!(matches!(outcome, Outcome::Reverted { .. }));
        assert_eq!(emulator.transaction_count(account.address()).await.unwrap(), 1);

        let result = emulator
            .submit(sign(&account, Call::RejectProject { project_id: 1 }, 0))
            .await;
        assert!(matches!(result, Err(Error::Broadcast(_))));
    }

    #[tokio::test]
    async fn future_nonces_wait_for_gap() {
        let account = SigningAccount::generate();
        let emulator = Emulator::new(Address::ZERO);
        let submit = |sequence| {
            sign(
                &account,
                Call::SubmitProject {
                    metadata_ref: format!("sha256:{}", sequence),
                    claimed_amount: 1,
                },
                sequence,
            )
        };

        let second = emulator.submit(submit(1)).await.unwrap();
        assert_eq!(emulator.queued_transactions(), 1);
        assert_eq!(emulator.next_project_id().await.unwrap(), 1);

        let first = emulator.submit(submit(0)).await.unwrap();
        assert_eq!(emulator.queued_transactions(), 0);
        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert!(first.block_number < second.block_number);
        assert_eq!(
            emulator.project(2).await.unwrap().unwrap().metadata_ref,
            "sha256:1"
        );
    }

    #[tokio::test]
    async fn injected_faults() {
        let account = SigningAccount::generate();
        let emulator = Emulator::new(account.address());
        let call = Call::AddVerifier {
            verifier: account.address(),
        };

        emulator.fail_next_broadcasts(1);
        assert!(matches!(
            emulator.submit(sign(&account, call.clone(), 0)).await,
            Err(Error::Broadcast(_))
        ));
        assert_eq!(emulator.transaction_count(account.address()).await.unwrap(), 0);

        emulator.set_unreachable(true);
        assert!(matches!(
            emulator.owner().await,
            Err(Error::Connectivity(_))
        ));
        emulator.set_unreachable(false);

        emulator.withhold_next_confirmations(1);
        let confirmation = emulator.submit(sign(&account, call, 0)).await.unwrap();
        assert!(confirmation.now_or_never().is_none());
        // Executed even though the confirmation never arrives
        assert!(emulator.is_verifier(account.address()).await.unwrap());
    }
}
