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

//! Miscellaneous helpers used throughout Registry tests.

use rand::distributions::Alphanumeric;
use rand::Rng;

use mrv_registry_client::*;

/// An emulated registry with a client for the contract owner and a client for a registered
/// verifier.
pub struct Registry {
    pub emulator: Emulator,
    pub owner: Client,
    pub verifier: Client,
}

/// Create an emulated registry owned by a random account and register a random verifier.
pub async fn emulated_registry() -> Registry {
    emulated_registry_with_config(ClientConfig::default()).await
}

pub async fn emulated_registry_with_config(config: ClientConfig) -> Registry {
    let owner_account = random_account();
    let emulator = Emulator::new(owner_account.address());
    let owner = Client::with_emulator(&emulator, owner_account, config.clone());
    let verifier = Client::with_emulator(&emulator, random_account(), config);
    submit_ok(
        &owner,
        Call::AddVerifier {
            verifier: verifier.address(),
        },
    )
    .await;
    Registry {
        emulator,
        owner,
        verifier,
    }
}

/// Submit a call and wait for it to be confirmed.
///
/// Panics if the call fails.
pub async fn submit_ok(client: &Client, call: Call) -> Confirmation {
    let operation = call.operation();
    match client.sign_and_submit_call(call).await {
        Ok(confirmation) => confirmation,
        Err(error) => panic!("{} failed: {}", operation, error),
    }
}

/// Submit a project with random metadata and a claim of `claimed_amount`.
pub async fn submit_project(client: &Client, claimed_amount: Tons) -> Project {
    let confirmation = submit_ok(
        client,
        Call::SubmitProject {
            metadata_ref: random_metadata_ref(),
            claimed_amount,
        },
    )
    .await;
    let project_id = confirmation
        .project_id
        .expect("submitProject confirmation without project id");
    client.get_project(project_id).await.unwrap()
}

/// Submit a project claiming `claimed_amount` and move it to `status` along the shortest legal
/// path. Approvals approve the full claim. Credits are issued to the verifier.
///
/// `verifier` must be a registered verifier.
pub async fn project_with_status(
    verifier: &Client,
    claimed_amount: Tons,
    status: ProjectStatus,
) -> Project {
    let project = submit_project(verifier, claimed_amount).await;
    let project_id = project.id;
    let path: &[Call] = match status {
        ProjectStatus::Submitted => &[],
        ProjectStatus::UnderReview => &[Call::SetUnderReview { project_id }],
        ProjectStatus::Approved => &[
            Call::SetUnderReview { project_id },
            Call::ApproveProject {
                project_id,
                approved_amount: claimed_amount,
            },
        ],
        ProjectStatus::Tokenized => &[
            Call::SetUnderReview { project_id },
            Call::ApproveProject {
                project_id,
                approved_amount: claimed_amount,
            },
            Call::IssueCredits {
                project_id,
                recipient: verifier.address(),
            },
        ],
        ProjectStatus::Rejected => &[Call::RejectProject { project_id }],
    };
    for call in path {
        submit_ok(verifier, call.clone()).await;
    }
    let project = verifier.get_project(project_id).await.unwrap();
    assert_eq!(project.status, status);
    project
}

/// Derive an account deterministically from `value`.
pub fn key_pair_from_string(value: impl AsRef<str>) -> SigningAccount {
    let secret = H256::keccak256(format!("//{}", value.as_ref()).as_bytes());
    SigningAccount::from_secret(secret.as_bytes()).unwrap()
}

pub fn random_account() -> SigningAccount {
    SigningAccount::generate()
}

pub fn random_address() -> Address {
    Address::new(rand::thread_rng().gen())
}

/// Reference of a random metadata document.
pub fn random_metadata_ref() -> String {
    canonical::content_ref(&random_alnum_string(16)).unwrap()
}

pub fn random_tons() -> Tons {
    rand::thread_rng().gen_range(20..100)
}

pub fn random_alnum_string(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect::<String>()
}
