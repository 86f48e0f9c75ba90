//! Axum stand-in of the garden REST API for integration tests.
//!
//! Tokens are real HS256 JWTs. Every access token carries the epoch it was
//! minted in; `expire_access_tokens` bumps the epoch so all outstanding access
//! tokens start getting 401s, the way a server-side expiry would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body as AxumBody,
    extract::{Path, Query, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use garden_client::api::Api;
use garden_client::cache::QueryCache;
use garden_client::error::{ApiError, ApiResult};
use garden_client::models::{
    AuthLoginResponse, Bed, BedSchedule, BedScheduleStore, BedSchedules, Ground, Pagination,
    Seed, SeedStore,
    SeedType, UserResponse, Voluntary, VoluntaryOrError, VoluntaryStore, VoluntaryStoreMany,
};
use garden_client::session::SessionController;
use garden_client::storage::TokenStore;
use garden_client::transport::{ApiRequest, ApiResponse, Body, HttpTransport, Transport};

pub const USERNAME: &str = "admin@horta.org";
pub const PASSWORD: &str = "s3cret";
pub const GROUND_ID: &str = "g1";

const SECRET: &[u8] = b"garden-stand-in-secret";
const REFRESH_DELAY: Duration = Duration::from_millis(50);
const BATCH_DELAY: Duration = Duration::from_millis(20);

type Failure = (StatusCode, Json<Value>);

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    typ: String,
    epoch: u64,
    jti: String,
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

/// Server-side state shared by every handler.
pub struct GardenState {
    epoch: AtomicU64,
    refresh_revoked: AtomicBool,
    refresh_calls: AtomicUsize,
    peoples_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    user: UserResponse,
    people: HashMap<String, String>,
    grounds: Mutex<HashMap<String, Ground>>,
    groups: Mutex<HashMap<String, BedSchedules>>,
    seeds: Mutex<HashMap<String, Seed>>,
    voluntaries: Mutex<Vec<Voluntary>>,
}

/// Handle to a seeded stand-in server.
#[derive(Clone)]
pub struct Garden {
    state: Arc<GardenState>,
}

impl Default for Garden {
    fn default() -> Self {
        Self::new()
    }
}

impl Garden {
    pub fn new() -> Self {
        Self {
            state: Arc::new(seeded_state()),
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Serves the router on an ephemeral port and returns its base url.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stand-in");
        let addr = listener.local_addr().expect("stand-in address");
        let router = self.router();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve stand-in");
        });
        format!("http://{addr}")
    }

    /// Every access token minted so far is rejected from now on.
    pub fn expire_access_tokens(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn revoke_refresh(&self) {
        self.state.refresh_revoked.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn peoples_calls(&self) -> usize {
        self.state.peoples_calls.load(Ordering::SeqCst)
    }

    /// Calls to `POST /api/voluntaries/many`.
    pub fn batch_calls(&self) -> usize {
        self.state.batch_calls.load(Ordering::SeqCst)
    }

    /// Client over real HTTP against a freshly spawned server.
    pub async fn http_api(&self, store: TokenStore) -> Api {
        let url = self.spawn().await;
        let transport = HttpTransport::new(url, Duration::from_secs(5), false).expect("transport");
        api_over(Arc::new(transport), store)
    }

    /// Client that calls the router in-process.
    pub fn router_api(&self, store: TokenStore) -> Api {
        api_over(Arc::new(RouterTransport::new(self.router())), store)
    }
}

fn api_over(transport: Arc<dyn Transport>, store: TokenStore) -> Api {
    let session = SessionController::new(transport, store).expect("session controller");
    Api::new(session, Arc::new(QueryCache::new(Duration::from_secs(30))))
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("iso date")
}

fn bed(label: &str, free: bool, seed_id: Option<&str>, group: Option<&str>) -> Bed {
    Bed {
        label: label.into(),
        active: true,
        free,
        seed_id: seed_id.map(Into::into),
        bed_schedules_id: group.map(Into::into),
    }
}

fn seed(id: &str, name: &str) -> Seed {
    Seed {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        amount: 25,
        seed_type: SeedType::Vegetable,
    }
}

/// Ground g1 with four beds:
/// - A1 free, nothing linked
/// - A2 occupied by Alface, second schedule current, Ana responsible
/// - A3 still holds Cenoura but its current schedule is Alface (complete)
/// - A4 occupied by a seed the server no longer has
fn seeded_state() -> GardenState {
    let ground = Ground {
        id: GROUND_ID.into(),
        address: "Rua das Hortas, 100".into(),
        width: 20,
        length: 10,
        description: "Horta Central".into(),
        owner_id: None,
        manager_id: None,
        active: true,
        beds: vec![
            bed("A1", true, None, None),
            bed("A2", false, Some("s1"), Some("bs2")),
            bed("A3", false, Some("s2"), Some("bs3")),
            bed("A4", false, Some("s9"), None),
        ],
    };

    let groups = [
        BedSchedules {
            id: "bs2".into(),
            ground_id: GROUND_ID.into(),
            bed_label: "A2".into(),
            schedules: vec![
                BedSchedule {
                    seed_id: "s2".into(),
                    start_at: date("2023-09-01"),
                    end_at: date("2023-12-15"),
                },
                BedSchedule {
                    seed_id: "s1".into(),
                    start_at: date("2024-03-01"),
                    end_at: date("2024-06-30"),
                },
            ],
            current_schedule: Some(1),
        },
        BedSchedules {
            id: "bs3".into(),
            ground_id: GROUND_ID.into(),
            bed_label: "A3".into(),
            schedules: vec![BedSchedule {
                seed_id: "s1".into(),
                start_at: date("2024-02-01"),
                end_at: date("2024-05-31"),
            }],
            current_schedule: Some(0),
        },
    ];

    let voluntaries = vec![
        Voluntary {
            id: "v1".into(),
            people_id: "p1".into(),
            people_name: "Ana".into(),
            ground_id: GROUND_ID.into(),
            bed_label: "A2".into(),
            is_responsible: true,
            start_at: date("2024-03-01"),
            end_at: None,
        },
        Voluntary {
            id: "v2".into(),
            people_id: "p2".into(),
            people_name: "Bia".into(),
            ground_id: GROUND_ID.into(),
            bed_label: "A2".into(),
            is_responsible: false,
            start_at: date("2024-03-01"),
            end_at: None,
        },
    ];

    GardenState {
        epoch: AtomicU64::new(0),
        refresh_revoked: AtomicBool::new(false),
        refresh_calls: AtomicUsize::new(0),
        peoples_calls: AtomicUsize::new(0),
        batch_calls: AtomicUsize::new(0),
        user: UserResponse {
            id: "u1".into(),
            name: "Admin".into(),
            email: USERNAME.into(),
            cellphone: "11999990000".into(),
        },
        people: [("p1", "Ana"), ("p2", "Bia"), ("p3", "Caio")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect(),
        grounds: Mutex::new(HashMap::from([(GROUND_ID.to_string(), ground)])),
        groups: Mutex::new(groups.into_iter().map(|g| (g.id.clone(), g)).collect()),
        seeds: Mutex::new(
            [seed("s1", "Alface"), seed("s2", "Cenoura")]
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
        ),
        voluntaries: Mutex::new(voluntaries),
    }
}

// --- Tokens ---

fn mint(state: &GardenState, typ: &str) -> String {
    let claims = Claims {
        sub: state.user.id.clone(),
        exp: Utc::now().timestamp() + 3600,
        typ: typ.into(),
        epoch: state.epoch.load(Ordering::SeqCst),
        jti: Uuid::new_v4().to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).expect("mint token")
}

fn token_pair(state: &GardenState) -> AuthLoginResponse {
    AuthLoginResponse {
        access_token: mint(state, "access_token"),
        refresh_token: mint(state, "refresh_token"),
        token_type: "bearer".into(),
    }
}

fn bearer_claims(req: &Request<AxumBody>) -> Option<Claims> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?
        .strip_prefix("Bearer ")?;
    decode::<Claims>(token, &DecodingKey::from_secret(SECRET), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

fn failure(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "message": message })))
}

async fn auth_middleware(
    State(state): State<Arc<GardenState>>,
    req: Request<AxumBody>,
    next: Next,
) -> Result<Response, Failure> {
    let claims = bearer_claims(&req)
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Not authenticated"))?;
    if claims.typ != "access_token" || claims.epoch != state.epoch.load(Ordering::SeqCst) {
        return Err(failure(StatusCode::UNAUTHORIZED, "Token expired"));
    }
    Ok(next.run(req).await)
}

// --- Router ---

fn create_router(state: Arc<GardenState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(me_handler))
        .route("/api/peoples", get(peoples_handler))
        .route("/api/grounds/:id", get(ground_handler))
        .route("/api/seeds", post(store_seed_handler))
        .route("/api/seeds/:id", get(seed_handler))
        .route("/api/bed-schedules", post(store_group_handler))
        .route("/api/bed-schedules/:id", get(group_handler).delete(delete_group_handler))
        .route("/api/voluntaries", get(voluntaries_handler))
        .route("/api/voluntaries/many", post(store_many_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .merge(protected)
        .with_state(state)
}

async fn login_handler(
    State(state): State<Arc<GardenState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<AuthLoginResponse>, Failure> {
    if form.username != USERNAME || form.password != PASSWORD {
        return Err(failure(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }
    Ok(Json(token_pair(&state)))
}

async fn refresh_handler(
    State(state): State<Arc<GardenState>>,
    req: Request<AxumBody>,
) -> Result<Json<AuthLoginResponse>, Failure> {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Keeps the refresh in flight long enough for concurrent 401s to pile up
    tokio::time::sleep(REFRESH_DELAY).await;

    let valid = bearer_claims(&req).is_some_and(|claims| claims.typ == "refresh_token");
    if !valid || state.refresh_revoked.load(Ordering::SeqCst) {
        return Err(failure(StatusCode::UNAUTHORIZED, "Invalid refresh token"));
    }
    Ok(Json(token_pair(&state)))
}

async fn me_handler(State(state): State<Arc<GardenState>>) -> Json<UserResponse> {
    Json(state.user.clone())
}

async fn peoples_handler(State(state): State<Arc<GardenState>>) -> Json<Value> {
    state.peoples_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "entities": [], "row_count": 0 }))
}

async fn ground_handler(
    State(state): State<Arc<GardenState>>,
    Path(id): Path<String>,
) -> Result<Json<Ground>, Failure> {
    let grounds = state.grounds.lock().expect("grounds lock");
    grounds
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Ground not found"))
}

async fn seed_handler(
    State(state): State<Arc<GardenState>>,
    Path(id): Path<String>,
) -> Result<Json<Seed>, Failure> {
    let seeds = state.seeds.lock().expect("seeds lock");
    seeds
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Seed not found"))
}

async fn store_seed_handler(
    State(state): State<Arc<GardenState>>,
    Json(body): Json<SeedStore>,
) -> Result<Json<Seed>, Failure> {
    if body.amount <= 0 {
        return Err(failure(StatusCode::UNPROCESSABLE_ENTITY, "amount must be positive"));
    }
    let mut seeds = state.seeds.lock().expect("seeds lock");
    let seed = Seed {
        id: format!("s{}", seeds.len() + 1),
        name: body.name,
        description: body.description,
        amount: body.amount,
        seed_type: body.seed_type,
    };
    seeds.insert(seed.id.clone(), seed.clone());
    Ok(Json(seed))
}

async fn group_handler(
    State(state): State<Arc<GardenState>>,
    Path(id): Path<String>,
) -> Result<Json<BedSchedules>, Failure> {
    let groups = state.groups.lock().expect("groups lock");
    groups
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Bed schedule not found"))
}

/// Plans a bed: the group is stored and the bed now points at it and its
/// first seed.
async fn store_group_handler(
    State(state): State<Arc<GardenState>>,
    Json(body): Json<BedScheduleStore>,
) -> Result<Json<BedSchedules>, Failure> {
    let seed_id = body
        .schedules
        .first()
        .map(|schedule| schedule.seed_id.clone())
        .ok_or_else(|| failure(StatusCode::UNPROCESSABLE_ENTITY, "schedules must not be empty"))?;

    let mut grounds = state.grounds.lock().expect("grounds lock");
    let mut groups = state.groups.lock().expect("groups lock");
    let bed = grounds
        .get_mut(&body.ground_id)
        .and_then(|ground| ground.beds.iter_mut().find(|bed| bed.label == body.bed_label))
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Bed not found"))?;

    let group = BedSchedules {
        id: format!("bs{}", groups.len() + 10),
        ground_id: body.ground_id,
        bed_label: body.bed_label,
        schedules: body.schedules,
        current_schedule: Some(0),
    };
    bed.free = false;
    bed.seed_id = Some(seed_id);
    bed.bed_schedules_id = Some(group.id.clone());
    groups.insert(group.id.clone(), group.clone());
    Ok(Json(group))
}

/// Drops the group and frees its bed.
async fn delete_group_handler(
    State(state): State<Arc<GardenState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let mut groups = state.groups.lock().expect("groups lock");
    let group = groups
        .remove(&id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Bed schedule not found"))?;

    let mut grounds = state.grounds.lock().expect("grounds lock");
    if let Some(bed) = grounds
        .get_mut(&group.ground_id)
        .and_then(|ground| ground.beds.iter_mut().find(|bed| bed.label == group.bed_label))
    {
        bed.free = true;
        bed.seed_id = None;
        bed.bed_schedules_id = None;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn voluntaries_handler(
    State(state): State<Arc<GardenState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Pagination<Voluntary>> {
    let voluntaries = state.voluntaries.lock().expect("voluntaries lock");
    let matches = |field: &str, value: &str| params.get(field).map_or(true, |want| want == value);
    let entities: Vec<Voluntary> = voluntaries
        .iter()
        .filter(|v| matches("ground_id", &v.ground_id) && matches("bed_label", &v.bed_label))
        .cloned()
        .collect();
    Json(Pagination {
        row_count: entities.len() as i64,
        entities,
    })
}

async fn store_many_handler(
    State(state): State<Arc<GardenState>>,
    Json(items): Json<Vec<VoluntaryStore>>,
) -> Json<VoluntaryStoreMany> {
    state.batch_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(BATCH_DELAY).await;

    let mut voluntaries = state.voluntaries.lock().expect("voluntaries lock");
    let results = items
        .into_iter()
        .map(|item| match state.people.get(&item.people_id) {
            Some(name) => {
                let voluntary = Voluntary {
                    id: format!("v{}", voluntaries.len() + 1),
                    people_id: item.people_id,
                    people_name: name.clone(),
                    ground_id: item.ground_id,
                    bed_label: item.bed_label,
                    is_responsible: item.is_responsible,
                    start_at: item.start_at,
                    end_at: None,
                };
                voluntaries.push(voluntary.clone());
                VoluntaryOrError {
                    voluntary: Some(voluntary),
                    error: None,
                }
            }
            None => VoluntaryOrError {
                voluntary: None,
                error: Some(format!("People {} not found", item.people_id)),
            },
        })
        .collect();
    Json(VoluntaryStoreMany { results })
}

// --- In-process transport ---

/// Sends requests straight into the router with `tower::ServiceExt::oneshot`.
pub struct RouterTransport {
    router: Router,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let mut uri = request.path.clone();
        if !request.query.is_empty() {
            uri.push('?');
            uri.push_str(&url_encoded(&request.query)?);
        }

        let mut builder = Request::builder()
            .method(request.method.to_string().as_str())
            .uri(uri);
        if let Some(token) = &request.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match &request.body {
            Body::Empty => AxumBody::empty(),
            Body::Json(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                AxumBody::from(serde_json::to_vec(value)?)
            }
            Body::Form(fields) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                AxumBody::from(url_encoded(fields)?)
            }
        };
        let http_request = builder
            .body(body)
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .unwrap_or_else(|never| match never {});
        let status = response.status().as_u16();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn url_encoded(pairs: &[(String, String)]) -> ApiResult<String> {
    serde_urlencoded::to_string(pairs).map_err(|e| ApiError::Decode(e.to_string()))
}
