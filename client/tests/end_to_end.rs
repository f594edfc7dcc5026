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

//! Tests against a local development node with freshly deployed contracts.
//!
//! The node must listen on `MRV_RPC_URL` (default `http://127.0.0.1:8545`) and the contract
//! addresses must be in the file named by `MRV_CONTRACTS` (default `deployed/addresses.json`).
//! The first development account must own the registry.
use futures::StreamExt as _;
use serial_test::serial;

use mrv_registry_client::*;
use mrv_registry_test_utils::*;

/// Secret key of the first development account of a local node.
const DEV_SECRET: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

async fn dev_client() -> Client {
    let _ = env_logger::try_init();
    let url = std::env::var("MRV_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".into());
    let path =
        std::env::var("MRV_CONTRACTS").unwrap_or_else(|_| "deployed/addresses.json".into());
    let contracts: Contracts =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    let account = SigningAccount::from_hex(DEV_SECRET).unwrap();
    Client::create(url.parse().unwrap(), contracts, account, ClientConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
#[ignore]
async fn register_and_tokenize_project() {
    let client = dev_client().await;
    assert_eq!(client.owner().await.unwrap(), client.address());
    assert_eq!(client.network_info().await.network, "Hardhat Local");

    submit_ok(
        &client,
        Call::AddVerifier {
            verifier: client.address(),
        },
    )
    .await;
    assert!(client.is_verifier(client.address()).await.unwrap());

    let project = submit_project(&client, 40).await;
    assert_eq!(project.status, ProjectStatus::Submitted);
    assert_eq!(project.submitter, client.address());

    client.set_under_review(project.id).await.unwrap();
    client.approve(project.id, 30).await.unwrap();
    let recipient = random_address();
    client
        .issue_credits(project.id, &recipient.to_string())
        .await
        .unwrap();

    let project = client.get_project(project.id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Tokenized);
    assert_eq!(project.approved_amount, 30);

    let listed: Vec<Project> = client.list_projects().await.unwrap().collect().await;
    assert!(listed.iter().any(|listed| listed.id == project.id));
}

#[tokio::test]
#[serial]
#[ignore]
async fn review_requires_verifier() {
    let client = dev_client().await;
    let project = submit_project(&client, 10).await;
    let stranger = Client::with_backend(
        std::sync::Arc::new(
            RemoteNode::new(
                "http://127.0.0.1:8545".parse().unwrap(),
                client.contracts(),
                ClientConfig::default().poll_interval,
            )
            .unwrap(),
        ),
        client.contracts(),
        random_account(),
        ClientConfig::default(),
    )
    .await
    .unwrap();
    let result = stranger.set_under_review(project.id).await;
    assert!(matches!(result, Err(Error::IllegalTransition(_))));
}
