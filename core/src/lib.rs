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

//! Basic types used in the MRV Registry.
//!
//! Nothing in this crate talks to the ledger. It defines the values that are exchanged with it,
//! the schema of the state-changing operations and the local mirror of the project lifecycle.

pub mod address;
pub use address::{Address, AddressError};

mod hash;
pub use hash::H256;

pub mod canonical;

pub mod evidence;
pub use evidence::{Evidence, EvidenceError};

pub mod lifecycle;
pub use lifecycle::TransitionError;

pub mod message;
pub use message::{Argument, ArgumentError, Call, Contract, Operation};

pub mod state;
pub use state::{Project, ProjectStatus, Stats};

/// Identifier of a project. Assigned by the ledger, starting at `1`.
pub type ProjectId = u64;

/// Amount of carbon in metric tons.
pub type Tons = u64;

/// Seconds since the Unix epoch, as reported by the ledger.
pub type Timestamp = u64;

/// The hash of a transaction. Uniquely identifies a transaction.
pub type TxHash = H256;
