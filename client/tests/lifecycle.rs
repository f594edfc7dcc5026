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

//! Test the project lifecycle checks against the emulated registry.
use mrv_registry_client::*;
use mrv_registry_test_utils::*;

#[tokio::test]
async fn register_and_tokenize_project() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;

    let project = submit_project(verifier, 40).await;
    assert_eq!(project.status, ProjectStatus::Submitted);
    assert_eq!(project.submitter, verifier.address());
    assert_eq!(project.approved_amount, 0);

    let confirmation = verifier.set_under_review(project.id).await.unwrap();
    assert_eq!(confirmation.project_id, Some(project.id));
    verifier.approve(project.id, 35).await.unwrap();

    let recipient = random_address();
    registry
        .owner
        .issue_credits(project.id, &recipient.to_string())
        .await
        .unwrap();

    let project = verifier.get_project(project.id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Tokenized);
    assert_eq!(project.approved_amount, 35);
    assert!(project.updated_at > project.submitted_at);
    assert_eq!(registry.emulator.balance_of(recipient), 35);
}

#[tokio::test]
async fn reject_from_submitted_and_under_review() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;

    let submitted = submit_project(verifier, 10).await;
    verifier.reject(submitted.id).await.unwrap();

    let under_review = project_with_status(verifier, 10, ProjectStatus::UnderReview).await;
    verifier.reject(under_review.id).await.unwrap();

    for id in &[submitted.id, under_review.id] {
        let project = verifier.get_project(*id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Rejected);
    }
}

#[tokio::test]
async fn terminal_states_have_no_transitions() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    let rejected = project_with_status(verifier, 10, ProjectStatus::Rejected).await;
    let tokenized = project_with_status(verifier, 10, ProjectStatus::Tokenized).await;

    for project in &[rejected, tokenized] {
        let results = vec![
            verifier.set_under_review(project.id).await,
            verifier.approve(project.id, 1).await,
            verifier.reject(project.id).await,
            verifier
                .issue_credits(project.id, &verifier.address().to_string())
                .await,
        ];
        for result in results {
            match result {
                Err(Error::IllegalTransition(TransitionError::InvalidStatus { status, .. })) => {
                    assert_eq!(status, project.status)
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }
}

#[tokio::test]
async fn approve_more_than_claimed() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    let project = project_with_status(verifier, 50, ProjectStatus::UnderReview).await;

    let result = verifier.approve(project.id, 51).await;
    match result {
        Err(Error::IllegalTransition(TransitionError::ApprovedExceedsClaimed {
            approved,
            claimed,
            ..
        })) => {
            assert_eq!(approved, 51);
            assert_eq!(claimed, 50);
        }
        other => panic!("unexpected result {:?}", other),
    }

    verifier.approve(project.id, 50).await.unwrap();
}

#[tokio::test]
async fn review_requires_verifier() {
    let registry = emulated_registry().await;
    let project = submit_project(&registry.owner, 10).await;

    let result = registry.owner.set_under_review(project.id).await;
    assert!(matches!(
        result,
        Err(Error::IllegalTransition(
            TransitionError::CallerNotVerifier { .. }
        ))
    ));

    submit_ok(
        &registry.owner,
        Call::RemoveVerifier {
            verifier: registry.verifier.address(),
        },
    )
    .await;
    let result = registry.verifier.set_under_review(project.id).await;
    assert!(matches!(result, Err(Error::IllegalTransition(_))));
}

#[tokio::test]
async fn malformed_recipient_is_rejected_before_building() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    let project = project_with_status(verifier, 20, ProjectStatus::Approved).await;

    for recipient in &["0x1234", "not an address", ""] {
        let result = verifier.issue_credits(project.id, recipient).await;
        match result {
            Err(error @ Error::InvalidArgument(_)) => {
                assert_eq!(error.kind(), ErrorKind::InvalidArgument)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
    assert!(!verifier.sequences().is_stale());

    // No sequence number was used by the failed attempts
    let confirmation = verifier
        .issue_credits(project.id, &random_address().to_string())
        .await
        .unwrap();
    assert_eq!(confirmation.sequence, 3);
}

#[tokio::test]
async fn ledger_rejects_unauthorized_issuance() {
    let registry = emulated_registry().await;
    let project = project_with_status(&registry.verifier, 20, ProjectStatus::Approved).await;
    let stranger = Client::with_emulator(
        &registry.emulator,
        random_account(),
        ClientConfig::default(),
    );

    let result = stranger
        .issue_credits(project.id, &stranger.address().to_string())
        .await;
    match result {
        Err(Error::ExecutionReverted { reason, .. }) => {
            assert_eq!(reason, "VerificationManager: not authorized")
        }
        other => panic!("unexpected result {:?}", other),
    }
    let project = stranger.get_project(project.id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Approved);
}

#[tokio::test]
async fn concurrent_approvals() {
    let registry = emulated_registry().await;
    let verifier = &registry.verifier;
    let project = project_with_status(verifier, 30, ProjectStatus::UnderReview).await;

    let (first, second) = futures::join!(
        verifier.approve(project.id, 30),
        verifier.approve(project.id, 30)
    );
    let results = vec![first, second];
    let confirmed = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(confirmed, 1);
    for result in results {
        match result {
            Ok(_)
            | Err(Error::IllegalTransition(_))
            | Err(Error::ExecutionReverted { .. }) => (),
            Err(other) => panic!("unexpected error {}", other),
        }
    }
}

#[tokio::test]
async fn missing_project() {
    let registry = emulated_registry().await;
    let result = registry.verifier.set_under_review(7).await;
    assert!(matches!(result, Err(Error::ProjectNotFound(7))));
    let result = registry.verifier.set_under_review(0).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
