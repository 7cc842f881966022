//! Shared plumbing for spawning the gateway binary as a real subprocess against a mocked
//! Cloud Controller / UAA backend. The gateway crate has no library target, so end-to-end
//! coverage drives the compiled binary rather than calling into it directly.

use anyhow::Context as _;
use std::collections::HashMap;
use std::process::{Child, Command};
use std::time::Duration;

pub mod uaa;

pub use diego_test_support::KillOnDrop;

pub fn pick_unused_port() -> anyhow::Result<u16> {
    diego_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    diego_test_support::wait_http_ok(url, timeout_dur).await
}

/// Spawn the gateway binary bound to `127.0.0.1:{port}`, merging `extra_env` over a set of
/// defaults sane for tests (cookies not marked `Secure` since everything here runs over plain
/// HTTP on localhost).
pub fn spawn_gateway(port: u16, extra_env: HashMap<&str, String>) -> anyhow::Result<Child> {
    let bin = env!("CARGO_BIN_EXE_diego-security-gateway");
    let mut cmd = Command::new(bin);
    cmd.env("DIEGO_GATEWAY_BIND_ADDR", format!("127.0.0.1:{port}"))
        .env("DIEGO_GATEWAY_COOKIE_SECURE", "false")
        .env("RUST_LOG", "error");
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    cmd.spawn().context("spawn diego-security-gateway")
}

/// Base URL for a gateway listening on `127.0.0.1:{port}`.
pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// A minimal, unsigned JWT good enough for the gateway's unverified-identity read after a
/// password grant: header and signature segments are placeholders, only the payload matters.
pub fn fake_access_token(user_name: &str, user_id: &str, scopes: &[&str]) -> String {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let payload = serde_json::json!({
        "user_name": user_name,
        "user_id": user_id,
        "scope": scopes,
    });
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("unsigned.{payload_b64}.test")
}
