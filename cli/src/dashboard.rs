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

//! JSON HTTP API for the registry dashboard.
//!
//! Successful responses are JSON objects with `"success": true`. Failures are answered with
//! status 400 and `{"success": false, "kind": <error kind>, "error": <message>}`.
//!
//! Without a signing account the state-changing routes answer with the `MissingSignerError`
//! kind and nothing is sent to the ledger.
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;

use mrv_registry_client::*;

/// Build the dashboard routes on top of `client`. State-changing routes are only served if
/// `has_signer` is set.
pub fn router(client: Client, has_signer: bool) -> Router {
    let reads = Router::new()
        .route("/api/owner", get(owner))
        .route("/api/network-info", get(network_info))
        .route("/api/project/:id", get(project))
        .route("/api/all-projects", get(all_projects))
        .route("/api/explorer/contracts", get(contracts))
        .route("/api/explorer/stats", get(stats))
        .route("/api/explorer/records", get(records));
    let writes = Router::new()
        .route("/api/add-verifier", post(add_verifier))
        .route("/api/remove-verifier", post(remove_verifier))
        .route("/api/under-review", post(under_review))
        .route("/api/approve", post(approve))
        .route("/api/reject", post(reject))
        .route("/api/issue-credits", post(issue_credits))
        .route("/api/submit-project", post(submit_project));
    let writes = if has_signer {
        writes
    } else {
        writes.route_layer(middleware::from_fn(reject_unsigned))
    };
    reads.merge(writes).with_state(client)
}

/// Serve the dashboard API on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, client: Client, has_signer: bool) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Dashboard listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(client, has_signer)).await
}

async fn reject_unsigned(_request: Request, _next: Next) -> Response {
    ApiError {
        kind: "MissingSignerError",
        message: String::from(
            "no private key configured, set --private-key or PRIVATE_KEY to sign transactions",
        ),
    }
    .into_response()
}

#[derive(Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Success {
        success: true,
        data,
    }))
}

/// A failed request. Carries the kind and message of the underlying error.
#[derive(Debug)]
pub struct ApiError {
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn invalid(message: String) -> Self {
        ApiError {
            kind: ErrorKind::InvalidArgument.as_str(),
            message,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        log::warn!("Request failed: {}", error);
        ApiError {
            kind: error.kind().as_str(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "kind": self.kind,
            "error": self.message,
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Pick the named fields from a request body, in order.
fn arguments(body: &Value, names: &[&str]) -> Result<Vec<Argument>, ApiError> {
    names
        .iter()
        .map(|name| {
            let value = body
                .get(*name)
                .cloned()
                .ok_or_else(|| ApiError::invalid(format!("missing field `{}`", name)))?;
            serde_json::from_value(value).map_err(|_| {
                ApiError::invalid(format!("field `{}` must be an integer or a string", name))
            })
        })
        .collect()
}

async fn execute(
    client: &Client,
    operation: Operation,
    body: &Value,
    names: &[&str],
) -> ApiResult<Confirmation> {
    let arguments = arguments(body, names)?;
    let confirmation = client.execute(operation, arguments).await?;
    success(confirmation)
}

async fn owner(State(client): State<Client>) -> ApiResult<Value> {
    let owner = client.owner().await?;
    success(json!({ "owner": owner }))
}

async fn network_info(State(client): State<Client>) -> ApiResult<NetworkInfo> {
    success(client.network_info().await)
}

async fn project(State(client): State<Client>, Path(id): Path<String>) -> ApiResult<Value> {
    let id: ProjectId = id
        .parse()
        .map_err(|_| ApiError::invalid(format!("invalid project id `{}`", id)))?;
    let project = client.get_project(id).await?;
    success(json!({ "project": project }))
}

async fn all_projects(State(client): State<Client>) -> ApiResult<Value> {
    use futures::StreamExt as _;
    let projects: Vec<Project> = client.list_projects().await?.collect().await;
    success(json!({ "total": projects.len(), "projects": projects }))
}

async fn contracts(State(client): State<Client>) -> ApiResult<Value> {
    let owner = client.owner().await?;
    let contracts = client.contracts();
    success(json!({
        "registry": contracts.registry,
        "verificationManager": contracts.verification_manager,
        "token": contracts.token,
        "owner": owner,
    }))
}

async fn stats(State(client): State<Client>) -> ApiResult<Value> {
    let stats = client.get_stats().await?;
    success(json!({
        "total_projects": stats.total_projects,
        "total_biomass_tons": stats.total_claimed,
        "total_approved_tons": stats.total_approved,
    }))
}

async fn records(State(client): State<Client>) -> ApiResult<Value> {
    let records = client.records().await?;
    success(json!({ "records": records }))
}

async fn add_verifier(
    State(client): State<Client>,
    Json(body): Json<Value>,
) -> ApiResult<Confirmation> {
    execute(&client, Operation::AddVerifier, &body, &["address"]).await
}

async fn remove_verifier(
    State(client): State<Client>,
    Json(body): Json<Value>,
) -> ApiResult<Confirmation> {
    execute(&client, Operation::RemoveVerifier, &body, &["address"]).await
}

async fn under_review(
    State(client): State<Client>,
    Json(body): Json<Value>,
) -> ApiResult<Confirmation> {
    execute(&client, Operation::SetUnderReview, &body, &["project_id"]).await
}

async fn approve(State(client): State<Client>, Json(body): Json<Value>) -> ApiResult<Confirmation> {
    execute(
        &client,
        Operation::ApproveProject,
        &body,
        &["project_id", "tons"],
    )
    .await
}

async fn reject(State(client): State<Client>, Json(body): Json<Value>) -> ApiResult<Confirmation> {
    execute(&client, Operation::RejectProject, &body, &["project_id"]).await
}

async fn issue_credits(
    State(client): State<Client>,
    Json(body): Json<Value>,
) -> ApiResult<Confirmation> {
    execute(
        &client,
        Operation::IssueCredits,
        &body,
        &["project_id", "recipient"],
    )
    .await
}

/// Submit a project from drone survey evidence.
async fn submit_project(
    State(client): State<Client>,
    Json(body): Json<Value>,
) -> ApiResult<EvidenceSubmission> {
    let evidence: Evidence = serde_json::from_value(body)
        .map_err(|e| Error::from(EvidenceError::Malformed(e.to_string())))?;
    let submission = client.submit_evidence(&evidence).await?;
    success(submission)
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use mrv_registry_test_utils::*;
    use tower::ServiceExt as _;

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn read_routes() {
        let registry = emulated_registry().await;
        let app = router(registry.owner.clone(), true);

        let (status, body) = call(&app, get_request("/api/owner")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["owner"], json!(registry.owner.address()));

        let (_, body) = call(&app, get_request("/api/network-info")).await;
        assert_eq!(body["connected"], json!(true));
        assert_eq!(body["network"], json!("Hardhat Local"));
        assert_eq!(body["account"], json!(registry.owner.address()));

        let (_, body) = call(&app, get_request("/api/explorer/contracts")).await;
        assert_eq!(body["registry"], json!(Emulator::contracts().registry));
        assert_eq!(body["owner"], json!(registry.owner.address()));

        let (_, body) = call(&app, get_request("/api/all-projects")).await;
        assert_eq!(body["total"], json!(0));
    }

    #[tokio::test]
    async fn project_lifecycle() {
        let registry = emulated_registry().await;
        let app = router(registry.verifier.clone(), true);

        let evidence = json!({ "avg_ndvi": 0.6, "area_ha": 2.5, "images": ["img1.jpg"] });
        let (status, body) = call(&app, post_request("/api/submit-project", evidence)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["estimatedTons"], json!(15));
        assert_eq!(body["confirmation"]["projectId"], json!(1));

        for (uri, payload) in vec![
            ("/api/under-review", json!({ "project_id": 1 })),
            ("/api/approve", json!({ "project_id": 1, "tons": 15 })),
            (
                "/api/issue-credits",
                json!({ "project_id": 1, "recipient": random_address() }),
            ),
        ] {
            let (status, body) = call(&app, post_request(uri, payload)).await;
            assert_eq!(status, StatusCode::OK, "{} failed: {}", uri, body);
            assert_eq!(body["projectId"], json!(1));
        }

        let (_, body) = call(&app, get_request("/api/project/1")).await;
        assert_eq!(body["project"]["status"], json!("Tokenized"));
        assert_eq!(body["project"]["approvedAmount"], json!(15));

        let (_, body) = call(&app, get_request("/api/explorer/stats")).await;
        assert_eq!(body["total_projects"], json!(1));
        assert_eq!(body["total_biomass_tons"], json!(15));
        assert_eq!(body["total_approved_tons"], json!(15));

        let (_, body) = call(&app, get_request("/api/explorer/records")).await;
        assert_eq!(body["records"][0]["id"], json!(1));
    }

    #[tokio::test]
    async fn failures() {
        let registry = emulated_registry().await;
        let project = project_with_status(&registry.verifier, 10, ProjectStatus::UnderReview).await;
        let app = router(registry.verifier.clone(), true);

        let cases = vec![
            (
                post_request("/api/approve", json!({ "project_id": project.id, "tons": 11 })),
                "IllegalTransitionError",
            ),
            (
                post_request(
                    "/api/issue-credits",
                    json!({ "project_id": project.id, "recipient": "0x12" }),
                ),
                "InvalidArgumentError",
            ),
            (
                post_request("/api/reject", json!({})),
                "InvalidArgumentError",
            ),
            (
                post_request("/api/reject", json!({ "project_id": 1.5 })),
                "InvalidArgumentError",
            ),
            (
                post_request("/api/submit-project", json!({ "avg_ndvi": 2.0 })),
                "InvalidArgumentError",
            ),
            (get_request("/api/project/abc"), "InvalidArgumentError"),
            (get_request("/api/project/99"), "NotFoundError"),
            (
                post_request("/api/add-verifier", json!({ "address": random_address() })),
                "ExecutionRevertedError",
            ),
        ];
        for (request, kind) in cases {
            let uri = request.uri().to_string();
            let (status, body) = call(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], json!(false));
            assert_eq!(body["kind"], json!(kind), "{}: {}", uri, body);
        }
    }

    #[tokio::test]
    async fn unsigned_dashboard_is_read_only() {
        let registry = emulated_registry().await;
        let app = router(registry.owner.clone(), false);

        let (status, body) = call(&app, get_request("/api/owner")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owner"], json!(registry.owner.address()));

        let verifier = random_address();
        let request = post_request("/api/add-verifier", json!({ "address": verifier }));
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["kind"], json!("MissingSignerError"));
        assert!(!registry.owner.is_verifier(verifier).await.unwrap());
    }
}
