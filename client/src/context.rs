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

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::{ClientConfig, Contracts};

/// Ledger connection and settings shared by the client components.
///
/// Every component is constructed from a [Context]. Two contexts never share state unless they
/// share the backend, so clients for different ledgers or accounts can run side by side.
#[derive(Clone)]
pub struct Context {
    pub backend: Arc<dyn Backend>,
    pub contracts: Contracts,
    /// Chain id reported by the ledger when the context was created.
    pub chain_id: u64,
    pub config: ClientConfig,
}
