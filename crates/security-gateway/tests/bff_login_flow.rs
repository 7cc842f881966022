//! End-to-end coverage of the BFF login flow: session + CSRF cookies minted on login, the
//! CSRF double-submit check enforced on a cookie-authenticated write, and the operator role
//! gate on a second write route (spec.md §8 scenarios 1 and 2).

mod common;

use common::uaa::Credentials;
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn login_mints_cookies_and_gates_writes_by_csrf_and_role() -> anyhow::Result<()> {
    let uaa = common::uaa::start(&[
        Credentials { username: "alice", password: "correct-horse", user_id: "u-alice", scopes: &[] },
        Credentials {
            username: "opuser",
            password: "batter-staple",
            user_id: "u-op",
            scopes: &["diego-analyzer.operator"],
        },
    ])
    .await;

    let port = common::pick_unused_port()?;
    let mut env = HashMap::new();
    env.insert("DIEGO_GATEWAY_CF_API_URL", uaa.uri());
    let _gateway = common::KillOnDrop(common::spawn_gateway(port, env)?);
    let base = common::base_url(port);
    common::wait_http_ok(&format!("{base}/healthz"), Duration::from_secs(10)).await?;

    let client = reqwest::Client::builder().cookie_store(true).build()?;

    // Wrong password: rejected, no cookies set.
    let bad = client
        .post(format!("{base}/api/v1/auth/login"))
        .json(&serde_json::json!({"username": "alice", "password": "wrong"}))
        .send()
        .await?;
    assert_eq!(bad.status(), 401);

    // Correct password: 200, both cookies set.
    let login = client
        .post(format!("{base}/api/v1/auth/login"))
        .json(&serde_json::json!({"username": "alice", "password": "correct-horse"}))
        .send()
        .await?;
    assert_eq!(login.status(), 200);
    let csrf_token = set_cookie_value(&login, "DIEGO_CSRF").expect("DIEGO_CSRF cookie set on login");
    assert!(set_cookie_value(&login, "DIEGO_SESSION").is_some());

    // Writing without the CSRF header is rejected even though the session cookie rides along
    // automatically via the client's cookie jar.
    let no_csrf = client.post(format!("{base}/scenario/compare")).send().await?;
    assert_eq!(no_csrf.status(), 403);

    // Writing with the matching header succeeds.
    let with_csrf = client
        .post(format!("{base}/scenario/compare"))
        .header("x-csrf-token", &csrf_token)
        .send()
        .await?;
    assert_eq!(with_csrf.status(), 200);

    // A viewer cannot reach the operator-gated route even with a valid CSRF token.
    let viewer_denied = client
        .post(format!("{base}/infrastructure/manual"))
        .header("x-csrf-token", &csrf_token)
        .send()
        .await?;
    assert_eq!(viewer_denied.status(), 403);

    // whoami reflects the logged-in viewer.
    let me = client.get(format!("{base}/api/v1/auth/me")).send().await?;
    assert_eq!(me.status(), 200);
    let me_body: serde_json::Value = me.json().await?;
    assert_eq!(me_body["authenticated"], true);
    assert_eq!(me_body["username"], "alice");

    // Logout is behind the CSRF layer like any other cookie-authenticated write.
    let logout = client
        .post(format!("{base}/api/v1/auth/logout"))
        .header("x-csrf-token", &csrf_token)
        .send()
        .await?;
    assert_eq!(logout.status(), 200);
    let me_after = client.get(format!("{base}/api/v1/auth/me")).send().await?;
    let me_after_body: serde_json::Value = me_after.json().await?;
    assert_eq!(me_after_body["authenticated"], false);

    // A fresh client logging in as the operator account reaches the operator-gated route.
    let op_client = reqwest::Client::builder().cookie_store(true).build()?;
    let op_login = op_client
        .post(format!("{base}/api/v1/auth/login"))
        .json(&serde_json::json!({"username": "opuser", "password": "batter-staple"}))
        .send()
        .await?;
    assert_eq!(op_login.status(), 200);
    let op_csrf = set_cookie_value(&op_login, "DIEGO_CSRF").expect("DIEGO_CSRF cookie set on login");
    let op_allowed = op_client
        .post(format!("{base}/infrastructure/manual"))
        .header("x-csrf-token", &op_csrf)
        .send()
        .await?;
    assert_eq!(op_allowed.status(), 200);

    Ok(())
}

fn set_cookie_value(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all("set-cookie")
        .iter()
        .find_map(|v| {
            let raw = v.to_str().ok()?;
            let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
            let (k, val) = pair.split_once('=')?;
            (k == name).then(|| val.to_string())
        })
}
