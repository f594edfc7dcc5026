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

//! Test reading registry state and submitting evidence.
use futures::StreamExt as _;

use mrv_registry_client::*;
use mrv_registry_test_utils::*;

#[tokio::test]
async fn listing_skips_unreadable_projects() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    for claimed in &[10, 20, 30] {
        submit_project(verifier, *claimed).await;
    }
    project_with_status(verifier, 40, ProjectStatus::Approved).await;

    registry.emulator.fail_project_reads(2);
    let listed: Vec<ProjectId> = verifier
        .list_projects()
        .await
        .unwrap()
        .map(|project| project.id)
        .collect()
        .await;
    assert_eq!(listed, vec![1, 3, 4]);

    let stats = verifier.get_stats().await.unwrap();
    assert_eq!(
        stats,
        Stats {
            total_projects: 3,
            total_claimed: 80,
            total_approved: 40,
        }
    );

    assert!(matches!(
        verifier.get_project(2).await,
        Err(Error::Connectivity(_))
    ));
}

#[tokio::test]
async fn listing_is_restartable() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    submit_project(verifier, 10).await;

    let first = verifier.list_projects().await.unwrap();
    submit_project(verifier, 10).await;
    // The id range is fixed when the listing starts
    assert_eq!(first.count().await, 1);
    assert_eq!(verifier.list_projects().await.unwrap().count().await, 2);
}

#[tokio::test]
async fn empty_registry() {
    let client = Client::new_emulator(random_account());
    assert_eq!(client.owner().await.unwrap(), client.address());
    assert_eq!(client.get_stats().await.unwrap(), Stats::default());
    assert!(client.records().await.unwrap().is_empty());
    assert!(matches!(
        client.get_project(1).await,
        Err(Error::ProjectNotFound(1))
    ));
}

#[tokio::test]
async fn records_are_newest_first() {
    let registry = emulated_registry().await;
    for _ in 0..3 {
        submit_project(&registry.verifier, random_tons()).await;
    }
    let records = registry.owner.records().await.unwrap();
    let ids: Vec<ProjectId> = records.iter().map(|project| project.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert!(records[0].submitted_at > records[2].submitted_at);
}

#[tokio::test]
async fn network_info() {
    let client = Client::new_emulator(random_account());
    let info = client.network_info().await;
    assert_eq!(
        info,
        NetworkInfo {
            connected: true,
            chain_id: 31337,
            network: String::from("Hardhat Local"),
            account: client.address(),
        }
    );
}

#[tokio::test]
async fn submit_evidence() {
    let registry = emulated_registry().await;
    let evidence = Evidence::new(0.6, 2.5, vec![String::from("img1.jpg")]);

    let submission = registry.verifier.submit_evidence(&evidence).await.unwrap();
    assert_eq!(submission.estimated_tons, 15);
    assert_eq!(
        submission.metadata_ref,
        "sha256:702efb84d778407f237e98242f3137c620e952bf5d55a9a6cf42f11f4f8a8541"
    );

    let project_id = submission.confirmation.project_id.unwrap();
    let project = registry.verifier.get_project(project_id).await.unwrap();
    assert_eq!(project.metadata_ref, submission.metadata_ref);
    assert_eq!(project.claimed_amount, 15);
    assert_eq!(project.status, ProjectStatus::Submitted);
}

#[tokio::test]
async fn invalid_evidence_is_not_submitted() {
    let registry = emulated_registry().await;
    let evidence = Evidence::new(1.5, 2.5, Vec::new());

    let result = registry.verifier.submit_evidence(&evidence).await;
    match result {
        Err(error @ Error::InvalidEvidence(_)) => {
            assert_eq!(error.kind(), ErrorKind::InvalidArgument)
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(registry.verifier.records().await.unwrap().is_empty());
}
