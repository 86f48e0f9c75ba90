//! Endpoint smoke check for the garden API
//!
//! Logs in with GARDEN_USERNAME / GARDEN_PASSWORD and calls every endpoint once
//! with a placeholder id or an empty body. A 404 or 422 still proves the route
//! exists; anything else non-2xx fails the check.
//! Run: cargo run --bin check_endpoints

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use garden_client::config::Config;
use garden_client::error::{ignore_not_found, ignore_unprocessable, ApiResult};
use garden_client::session::{Credentials, SessionController};
use garden_client::storage::TokenStore;
use garden_client::transport::{ApiRequest, HttpTransport};

const PLACEHOLDER_ID: &str = "000000000000000000000000";

/// Which "route exists" failure a probe tolerates.
#[derive(Clone, Copy)]
enum Tolerate {
    Nothing,
    NotFound,
    Unprocessable,
}

const CRUD_RESOURCES: &[&str] = &[
    "/api/grounds-donate",
    "/api/grounds",
    "/api/peoples",
    "/api/seeds",
    "/api/tools",
    "/api/users",
    "/api/voluntaries-request",
];

const USAGE_RESOURCES: &[&str] = &["/api/voluntaries-using-seeds", "/api/voluntaries-using-tools"];

fn probes() -> Vec<(ApiRequest, Tolerate)> {
    let id = PLACEHOLDER_ID;
    let empty = json!({});
    let mut probes = vec![
        (ApiRequest::get("/api/auth/me"), Tolerate::Nothing),
        (ApiRequest::get(format!("/api/bed-schedules/{id}")), Tolerate::NotFound),
        (
            ApiRequest::post("/api/bed-schedules").json_value(empty.clone()),
            Tolerate::Unprocessable,
        ),
        (
            ApiRequest::put(format!("/api/bed-schedules/{id}")).json_value(empty.clone()),
            Tolerate::Unprocessable,
        ),
        (ApiRequest::delete(format!("/api/bed-schedules/{id}")), Tolerate::NotFound),
    ];

    for path in CRUD_RESOURCES {
        probes.push((ApiRequest::get(*path), Tolerate::Nothing));
        probes.push((ApiRequest::get(format!("{path}/{id}")), Tolerate::NotFound));
        probes.push((
            ApiRequest::post(*path).json_value(empty.clone()),
            Tolerate::Unprocessable,
        ));
        probes.push((
            ApiRequest::put(format!("{path}/{id}")).json_value(empty.clone()),
            Tolerate::NotFound,
        ));
        probes.push((ApiRequest::delete(format!("{path}/{id}")), Tolerate::NotFound));
    }

    for path in USAGE_RESOURCES {
        probes.push((ApiRequest::get(*path), Tolerate::Nothing));
        probes.push((ApiRequest::get(format!("{path}/{id}")), Tolerate::NotFound));
        probes.push((
            ApiRequest::post(format!("{path}/start")).json_value(empty.clone()),
            Tolerate::Unprocessable,
        ));
        probes.push((ApiRequest::put(format!("{path}/end/{id}")), Tolerate::NotFound));
        probes.push((ApiRequest::delete(format!("{path}/{id}")), Tolerate::NotFound));
    }

    probes
}

async fn probe(session: &SessionController, request: ApiRequest, tolerate: Tolerate) -> ApiResult<()> {
    let result = match session.execute(request).await {
        Ok(response) => response.error_for_status().map(|_| ()),
        Err(err) => Err(err),
    };
    match tolerate {
        Tolerate::Nothing => result,
        Tolerate::NotFound => ignore_not_found(result).map(|_| ()),
        Tolerate::Unprocessable => ignore_unprocessable(result).map(|_| ()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let _log_guard = garden_client::logging::init(&config)?;
    let (username, password) = config.credentials()?;

    // Throwaway session: the smoke check must not touch the CLI's stored tokens
    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let store = TokenStore::temporary()?;
    let session = SessionController::new(transport, store)?;
    session.login(&Credentials::new(username, password)).await?;

    let probes = probes();
    let total = probes.len();
    let mut failed = 0;
    for (request, tolerate) in probes {
        let label = format!("{} {}", request.method, request.path);
        match probe(&session, request, tolerate).await {
            Ok(()) => info!(endpoint = %label, "ok"),
            Err(err) => {
                failed += 1;
                error!(endpoint = %label, error = %err, "endpoint check failed");
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {total} endpoint checks failed").into());
    }
    println!("All {total} endpoints exist.");
    Ok(())
}
