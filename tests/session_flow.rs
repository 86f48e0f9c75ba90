//! Session lifecycle over real HTTP against the stand-in API.

mod support;

use futures::future::join_all;

use garden_client::api::IndexQuery;
use garden_client::error::ApiError;
use garden_client::session::{AuthState, Credentials, SessionEvent};
use garden_client::storage::TokenStore;

use support::{Garden, PASSWORD, USERNAME};

fn admin() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

#[tokio::test]
async fn login_persists_tokens_and_authorizes_requests() {
    let garden = Garden::new();
    let store = TokenStore::temporary().unwrap();
    let api = garden.http_api(store.clone()).await;

    let session = api.auth().login(&admin()).await.unwrap();
    assert_eq!(api.session().state(), AuthState::Authenticated);
    assert_eq!(store.load().unwrap(), Some(session.clone()));
    assert_eq!(session.claims().unwrap().sub, "u1");

    let me = api.auth().me().await.unwrap();
    assert_eq!(me.email, USERNAME);
    assert_eq!(garden.refresh_calls(), 0);
}

#[tokio::test]
async fn rejected_login_never_refreshes() {
    let garden = Garden::new();
    let api = garden.http_api(TokenStore::temporary().unwrap()).await;

    let err = api
        .auth()
        .login(&Credentials::new(USERNAME, "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(api.session().state(), AuthState::Anonymous);
    assert_eq!(garden.refresh_calls(), 0);
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    let garden = Garden::new();
    let api = garden.http_api(TokenStore::temporary().unwrap()).await;
    let before = api.auth().login(&admin()).await.unwrap();
    let mut events = api.session().subscribe();

    garden.expire_access_tokens();
    let results = join_all((0..5).map(|_| async { api.auth().me().await })).await;

    for result in results {
        assert_eq!(result.unwrap().id, "u1");
    }
    assert_eq!(garden.refresh_calls(), 1);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
    assert_eq!(api.session().state(), AuthState::Authenticated);
    assert_ne!(api.session().access_token(), Some(before.access_token));
}

#[tokio::test]
async fn failed_refresh_clears_session_and_requires_login() {
    let garden = Garden::new();
    let store = TokenStore::temporary().unwrap();
    let api = garden.http_api(store.clone()).await;
    api.auth().login(&admin()).await.unwrap();
    let mut events = api.session().subscribe();

    garden.revoke_refresh();
    garden.expire_access_tokens();
    let err = api.peoples().index(&IndexQuery::new()).await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
    assert_eq!(api.session().state(), AuthState::Anonymous);
    assert_eq!(store.load().unwrap(), None);

    // Anonymous now: the next request goes out without a bearer and is not refreshed
    let err = api.peoples().index(&IndexQuery::new()).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(garden.refresh_calls(), 1);
}

#[tokio::test]
async fn bootstrap_keeps_valid_and_drops_expired_sessions() {
    let garden = Garden::new();
    let store = TokenStore::temporary().unwrap();
    let first = garden.http_api(store.clone()).await;
    first.auth().login(&admin()).await.unwrap();

    // A second client over the same store plays the restarted program
    let restarted = garden.http_api(store.clone()).await;
    assert_eq!(restarted.session().state(), AuthState::Authenticated);
    let user = restarted.session().bootstrap().await.unwrap();
    assert_eq!(user.map(|u| u.email).as_deref(), Some(USERNAME));

    garden.expire_access_tokens();
    let again = garden.http_api(store.clone()).await;
    let mut events = again.session().subscribe();
    assert_eq!(again.session().bootstrap().await.unwrap(), None);
    assert_eq!(again.session().state(), AuthState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(garden.refresh_calls(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn cached_reads_hit_the_server_once() {
    let garden = Garden::new();
    let api = garden.http_api(TokenStore::temporary().unwrap()).await;
    api.auth().login(&admin()).await.unwrap();
    let query = IndexQuery::new().page(1, 20);

    let (first, second) = tokio::join!(
        async { api.peoples().index(&query).await },
        async { api.peoples().index(&query).await },
    );
    assert_eq!(first.unwrap(), second.unwrap());
    api.peoples().index(&query).await.unwrap();
    assert_eq!(garden.peoples_calls(), 1);

    api.peoples().index(&IndexQuery::new().page(2, 20)).await.unwrap();
    assert_eq!(garden.peoples_calls(), 2);

    // Logging out drops every cached read
    api.auth().logout().unwrap();
    assert!(api.cache().is_empty());
}
