//! Session/auth controller.
//!
//! Owns the one active session and keeps outgoing requests authorized:
//! - `Anonymous` → `login` → `Authenticated`
//! - `Authenticated` → 401 on a non-auth request that carried a token → `Refreshing`
//! - `Refreshing` → success: store the new tokens, replay the request once,
//!   back to `Authenticated`; failure: clear both tokens, `Anonymous`, and emit
//!   [`SessionEvent::LoginRequired`]
//!
//! Concurrent 401s share one in-flight refresh future, so the refresh endpoint is
//! called once no matter how many requests failed together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthLoginResponse, UserResponse};
use crate::storage::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const ME_PATH: &str = "/api/auth/me";

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    /// Refresh failed; the UI should show the login screen
    LoginRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, ApiResult<Session>>>;

/// The refresh currently in flight; `generation` tells waiters whether the
/// slot still holds the attempt they joined.
struct InFlight {
    generation: u64,
    future: RefreshFuture,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    session: RwLock<Option<Session>>,
    refresh: Mutex<Option<InFlight>>,
    next_generation: AtomicU64,
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Restores any stored session. Call [`bootstrap`](Self::bootstrap) to probe it.
    pub fn new(transport: Arc<dyn Transport>, store: TokenStore) -> ApiResult<Self> {
        let session = store.load()?;
        let initial = if session.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        };
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                store,
                session: RwLock::new(session),
                refresh: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                state,
                events,
            }),
        })
    }

    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.current()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.current().map(|session| session.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() != AuthState::Anonymous
    }

    /// Logs in with form-encoded credentials and persists the new session.
    ///
    /// A rejected login leaves the current state untouched and never refreshes.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
        let request = ApiRequest::post(LOGIN_PATH).form(vec![
            ("username".to_string(), credentials.username.clone()),
            ("password".to_string(), credentials.password.clone()),
        ]);
        let response = self.inner.transport.send(&request).await?.error_for_status()?;
        let session = Session::from(response.json::<AuthLoginResponse>()?);

        self.inner.persist(&session)?;
        self.inner.state.send_replace(AuthState::Authenticated);
        let _ = self.inner.events.send(SessionEvent::LoggedIn);
        info!(username = %credentials.username, "logged in");
        Ok(session)
    }

    /// Explicit logout: both tokens go, state becomes `Anonymous`.
    pub fn logout(&self) -> ApiResult<()> {
        self.inner.clear()?;
        self.inner.state.send_replace(AuthState::Anonymous);
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
        info!("logged out");
        Ok(())
    }

    /// Startup probe of a restored session with `GET /api/auth/me`.
    ///
    /// Any failure clears the stored tokens silently: the user was never shown
    /// as logged in, so no `LoginRequired` is emitted and no refresh is tried.
    pub async fn bootstrap(&self) -> ApiResult<Option<UserResponse>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };
        let request = ApiRequest::get(ME_PATH).bearer(token);
        let probe = match self.inner.transport.send(&request).await {
            Ok(response) => response
                .error_for_status()
                .and_then(|response| response.json::<UserResponse>()),
            Err(err) => Err(err),
        };

        match probe {
            Ok(user) => {
                debug!(user_id = %user.id, "restored session is valid");
                Ok(Some(user))
            }
            Err(err) => {
                info!(error = %err, "restored session rejected, clearing tokens");
                self.inner.clear()?;
                self.inner.state.send_replace(AuthState::Anonymous);
                Ok(None)
            }
        }
    }

    /// Adds the current access token to the request; no-op when anonymous.
    pub fn attach_token(&self, request: &mut ApiRequest) {
        if let Some(token) = self.access_token() {
            request.bearer = Some(token);
        }
    }

    /// Sends a request with the current token, handling a 401 via refresh.
    ///
    /// Non-401 statuses are returned as-is for the caller to map.
    pub async fn execute(&self, mut request: ApiRequest) -> ApiResult<ApiResponse> {
        self.attach_token(&mut request);
        let response = self.inner.transport.send(&request).await?;
        if response.status == 401 {
            return self.handle_unauthorized(request).await;
        }
        Ok(response)
    }

    /// Refresh-and-retry for a request that came back 401.
    ///
    /// Requests to the auth endpoints or sent without a token fail straight away.
    /// The replay happens once; a second 401 is returned as `Unauthorized`.
    pub async fn handle_unauthorized(&self, failed: ApiRequest) -> ApiResult<ApiResponse> {
        if is_auth_path(&failed.path) || failed.bearer.is_none() {
            return Err(ApiError::Unauthorized);
        }

        let session = self.refreshed_session(failed.bearer.as_deref()).await?;
        let mut retry = failed;
        retry.bearer = Some(session.access_token);

        let response = self.inner.transport.send(&retry).await?;
        if response.status == 401 {
            warn!(path = %retry.path, "request rejected again after refresh, session cleared");
            // Concurrent replays of the same token expire the session once
            if self.inner.current().map(|session| session.access_token) == retry.bearer {
                self.inner.expire();
            }
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    /// Joins the in-flight refresh, starts one, or reuses a refresh that already
    /// finished after `stale_token` was sent.
    async fn refreshed_session(&self, stale_token: Option<&str>) -> ApiResult<Session> {
        let (generation, future) = {
            let mut slot = self.inner.refresh.lock().await;
            match slot.as_ref() {
                Some(in_flight) => (in_flight.generation, in_flight.future.clone()),
                None => {
                    let Some(current) = self.inner.current() else {
                        // Session already gone (earlier refresh failed or logout)
                        return Err(ApiError::Unauthorized);
                    };
                    if Some(current.access_token.as_str()) != stale_token {
                        debug!("token already rotated, retrying without refresh");
                        return Ok(current);
                    }

                    let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
                    let future = refresh(self.inner.clone()).boxed().shared();
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    (generation, future)
                }
            }
        };

        let outcome = future.await;

        let mut slot = self.inner.refresh.lock().await;
        if slot.as_ref().map(|in_flight| in_flight.generation) == Some(generation) {
            *slot = None;
        }
        outcome
    }
}

impl Inner {
    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, session: &Session) -> ApiResult<()> {
        self.store.save(session)?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> ApiResult<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store.clear()
    }

    /// Terminal end of a session after a failed refresh.
    fn expire(&self) {
        if let Err(err) = self.clear() {
            warn!(error = %err, "failed to clear stored tokens");
        }
        self.state.send_replace(AuthState::Anonymous);
        let _ = self.events.send(SessionEvent::LoginRequired);
    }
}

/// The single refresh attempt shared by every waiter.
async fn refresh(inner: Arc<Inner>) -> ApiResult<Session> {
    let refresh_token = inner
        .current()
        .and_then(|session| session.refresh_token);
    let Some(refresh_token) = refresh_token else {
        warn!("access token rejected and no refresh token stored");
        inner.expire();
        return Err(ApiError::Unauthorized);
    };

    inner.state.send_replace(AuthState::Refreshing);
    info!("refreshing access token");

    // The refresh endpoint authenticates with the refresh token itself
    let request = ApiRequest::post(REFRESH_PATH).bearer(refresh_token);
    let outcome = match inner.transport.send(&request).await {
        Ok(response) => response
            .error_for_status()
            .and_then(|response| response.json::<AuthLoginResponse>())
            .map(Session::from),
        Err(err) => Err(err),
    };

    match outcome.and_then(|session| inner.persist(&session).map(|_| session)) {
        Ok(session) => {
            inner.state.send_replace(AuthState::Authenticated);
            let _ = inner.events.send(SessionEvent::Refreshed);
            info!("access token refreshed");
            Ok(session)
        }
        Err(err) => {
            warn!(error = %err, "refresh failed, session cleared");
            inner.expire();
            Err(ApiError::Unauthorized)
        }
    }
}

fn is_auth_path(path: &str) -> bool {
    path == LOGIN_PATH || path == REFRESH_PATH
}
