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

//! Client configuration and the addresses of the registry contracts.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use mrv_registry_core::{Address, Contract};

/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

/// Fee parameters attached to every request, in wei per gas unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeeBounds {
    /// Tip paid to the block producer.
    pub priority_fee: u128,
    /// Cap on the total fee per gas unit, base fee included.
    pub max_fee: u128,
}

impl Default for FeeBounds {
    fn default() -> Self {
        FeeBounds {
            priority_fee: 2 * GWEI,
            max_fee: 30 * GWEI,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub fees: FeeBounds,
    pub gas_limit: u64,
    /// How long to wait for a broadcast transaction to be confirmed.
    pub confirmation_timeout: Duration,
    /// Interval between receipt lookups on a remote node.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            fees: FeeBounds::default(),
            gas_limit: 3_000_000,
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Deployed contract addresses, as written by the deployment scripts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contracts {
    pub registry: Address,
    pub verification_manager: Address,
    pub token: Address,
}

impl Contracts {
    pub fn address_of(&self, contract: Contract) -> Address {
        match contract {
            Contract::Registry => self.registry,
            Contract::VerificationManager => self.verification_manager,
        }
    }
}
