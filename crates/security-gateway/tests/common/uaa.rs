//! A `wiremock` stand-in for the Cloud Controller `/v3/info` + UAA `/oauth/token` pair that
//! `SessionService::login` talks to.

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fake_access_token;

pub struct Credentials {
    pub username: &'static str,
    pub password: &'static str,
    pub user_id: &'static str,
    pub scopes: &'static [&'static str],
}

/// Start a mock CF API that resolves its own URI as the UAA login endpoint, and accepts a
/// password grant for each of `accounts`, rejecting everything else with 401.
pub async fn start(accounts: &[Credentials]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "links": { "login": { "href": server.uri() } }
        })))
        .mount(&server)
        .await;

    for account in accounts {
        let token = fake_access_token(account.username, account.user_id, account.scopes);
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains(format!("username={}", account.username)))
            .and(body_string_contains(format!("password={}", account.password)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "refresh_token": "refresh-token",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    server
}
