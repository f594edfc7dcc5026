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

//! Allocation of account sequence numbers.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use mrv_registry_core::Address;

use crate::account::SigningAccount;
use crate::backend::Backend;
use crate::context::Context;
use crate::error::Error;

/// Owns the signing credential and hands out sequence numbers for it.
///
/// Allocation happens in a single critical section. Concurrent callers never receive the same
/// sequence number and the allocated numbers have no gaps.
///
/// The counter starts out stale. A stale counter is read again from the ledger before the next
/// allocation. Callers mark the counter stale after any failure that leaves the fate of an
/// allocated sequence number unknown. A [Reservation] that is dropped before it was handed to
/// the ledger does the same.
pub struct SequenceManager {
    backend: Arc<dyn Backend>,
    account: SigningAccount,
    next: Mutex<u64>,
    stale: Arc<AtomicBool>,
}

/// Marks the counter stale when dropped while armed.
struct StaleOnDrop {
    stale: Arc<AtomicBool>,
    armed: bool,
}

impl StaleOnDrop {
    fn arm(stale: &Arc<AtomicBool>) -> Self {
        StaleOnDrop {
            stale: stale.clone(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StaleOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.stale.store(true, Ordering::SeqCst);
        }
    }
}

/// An allocated sequence number that has not been handed to the ledger yet.
///
/// Dropping the reservation marks the counter stale, since the number may or may not have
/// reached the ledger. Call [Reservation::settle] once the ledger accepted or refused the
/// transaction.
#[must_use = "dropping a reservation forces a resync of the sequence number"]
pub struct Reservation {
    sequence: u64,
    guard: StaleOnDrop,
}

impl Reservation {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The ledger has decided about the transaction carrying this number.
    pub fn settle(self) -> u64 {
        self.guard.disarm();
        self.sequence
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Reservation({})", self.sequence)
    }
}

impl SequenceManager {
    pub fn new(context: &Context, account: SigningAccount) -> Self {
        SequenceManager {
            backend: context.backend.clone(),
            account,
            next: Mutex::new(0),
            stale: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn current_address(&self) -> Address {
        self.account.address()
    }

    pub fn account(&self) -> &SigningAccount {
        &self.account
    }

    /// Reserve the next unused sequence number.
    ///
    /// Fails with [Error::Connectivity] if the counter is stale and the ledger cannot be read.
    pub async fn allocate(&self) -> Result<Reservation, Error> {
        let mut next = self.next.lock().await;
        if self.stale.swap(false, Ordering::SeqCst) {
            // Restores the flag if the read fails or is abandoned
            let resync = StaleOnDrop::arm(&self.stale);
            let address = self.account.address();
            let confirmed = self
                .backend
                .transaction_count(address)
                .await
                .map_err(|error| match error {
                    Error::Connectivity(_) => error,
                    other => Error::Connectivity(other.to_string()),
                })?;
            resync.disarm();
            log::info!(
                "Resynchronized sequence number of {} to {}",
                address,
                confirmed
            );
            *next = confirmed;
        }
        let sequence = *next;
        *next += 1;
        log::debug!("Allocated sequence number {}", sequence);
        Ok(Reservation {
            sequence,
            guard: StaleOnDrop::arm(&self.stale),
        })
    }

    /// Force a resync with the ledger before the next allocation.
    pub fn mark_stale(&self) {
        if !self.stale.swap(true, Ordering::SeqCst) {
            log::debug!("Sequence number of {} marked stale", self.account.address());
        }
    }

    /// Give back a sequence number that was reserved but never signed.
    ///
    /// The number is reused if nothing was allocated after it. Otherwise the counter is marked
    /// stale so that the gap is closed by the next resync.
    pub async fn release(&self, reservation: Reservation) {
        let mut next = self.next.lock().await;
        let sequence = reservation.settle();
        if !self.stale.load(Ordering::SeqCst) && *next == sequence + 1 {
            *next = sequence;
        } else {
            self.mark_stale();
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}
