//! Fetches, caches, and rotates UAA RSA signing keys; verifies RS256 JWTs (spec.md §4.2).
//!
//! Grounded on the teacher's `OidcValidator`: a read-mostly `RwLock`-guarded key map, a
//! refresh cooldown so an invalid-`kid` storm can't hammer the identity provider, and a
//! fast-path decode that skips the refresh machinery entirely when the key is already cached.

use crate::claims::{Role, UserClaims};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Minimum spacing between JWKS refreshes, regardless of how many cache misses arrive in
/// between (spec.md §4.2 "rate-limit the refresh cooldown").
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum JwksError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm")]
    BadAlg,
    #[error("unknown signing key")]
    UnknownKid,
    #[error("signature verification failed")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token missing identity claims")]
    MissingIdentity,
    #[error("could not fetch signing keys")]
    FetchFailed,
}

#[derive(Default)]
struct JwksCacheState {
    keys_by_kid: HashMap<String, DecodingKey>,
    last_refresh: Option<Instant>,
}

struct Inner {
    token_keys_url: String,
    http: reqwest::Client,
    cache: RwLock<JwksCacheState>,
}

/// Fetches and verifies RS256 JWTs issued by UAA, caching the JWKS in memory.
#[derive(Clone)]
pub struct JwksClient {
    inner: Arc<Inner>,
}

impl JwksClient {
    /// Construct a client and perform the initial JWKS fetch.
    ///
    /// `issuer` is the UAA base URL; the key document is fetched from `<issuer>/token_keys`.
    ///
    /// # Errors
    /// Returns [`JwksError::FetchFailed`] if the initial fetch fails.
    pub async fn connect(http: reqwest::Client, issuer: &str) -> Result<Self, JwksError> {
        let token_keys_url = format!("{}/token_keys", issuer.trim_end_matches('/'));
        let client = Self {
            inner: Arc::new(Inner {
                token_keys_url,
                http,
                cache: RwLock::new(JwksCacheState::default()),
            }),
        };
        client.refresh().await?;
        Ok(client)
    }

    /// Build a client around an already-known key set, skipping the initial fetch. Used by
    /// tests that want to seed specific `kid`s.
    #[must_use]
    pub fn from_keys(http: reqwest::Client, token_keys_url: String, keys: HashMap<String, DecodingKey>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token_keys_url,
                http,
                cache: RwLock::new(JwksCacheState {
                    keys_by_kid: keys,
                    last_refresh: Some(Instant::now()),
                }),
            }),
        }
    }

    /// Verify an RS256 JWT and return the derived claims.
    ///
    /// # Errors
    /// Returns the first applicable [`JwksError`] variant; see spec.md §4.2 for the exact
    /// verification steps this follows.
    pub async fn verify_and_parse(&self, token: &str) -> Result<UserClaims, JwksError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| JwksError::Malformed)?;
        if header.alg != Algorithm::RS256 {
            return Err(JwksError::BadAlg);
        }
        if header.typ.as_deref() != Some("JWT") {
            return Err(JwksError::BadAlg);
        }
        let kid = header.kid.ok_or(JwksError::Malformed)?;

        if let Some(key) = self.key_for(&kid).await {
            return verify_with_key(token, &key);
        }

        // Miss: refresh at most once per cooldown window, then retry the lookup once.
        self.refresh_if_due().await?;
        let key = self.key_for(&kid).await.ok_or(JwksError::UnknownKid)?;
        verify_with_key(token, &key)
    }

    /// Force a JWKS refresh regardless of the cooldown. Used by tests and by operators
    /// reacting to a known key rotation.
    ///
    /// # Errors
    /// Returns [`JwksError::FetchFailed`] if the fetch fails.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        let keys = fetch_jwks(&self.inner.http, &self.inner.token_keys_url).await?;
        let mut cache = self.inner.cache.write().await;
        cache.keys_by_kid = keys;
        cache.last_refresh = Some(Instant::now());
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Option<DecodingKey> {
        self.inner.cache.read().await.keys_by_kid.get(kid).cloned()
    }

    async fn refresh_if_due(&self) -> Result<(), JwksError> {
        let now = Instant::now();
        let due = {
            let cache = self.inner.cache.read().await;
            cache
                .last_refresh
                .is_none_or(|t| now.duration_since(t) >= REFRESH_COOLDOWN)
        };
        if due { self.refresh().await } else { Ok(()) }
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    exp: i64,
    #[serde(default)]
    scope: Vec<String>,
}

fn verify_with_key(token: &str, key: &DecodingKey) -> Result<UserClaims, JwksError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => JwksError::Expired,
            ErrorKind::InvalidSignature => JwksError::BadSignature,
            _ => JwksError::Malformed,
        }
    })?;
    let claims = data.claims;

    // `Validation::validate_exp` already enforces this, but spec.md §4.3 requires `exp > now`
    // specifically (not `>=`), so we re-check against wall-clock time explicitly.
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64);
    if claims.exp <= now {
        return Err(JwksError::Expired);
    }

    let has_name_or_client = claims
        .user_name
        .as_deref()
        .or(claims.client_id.as_deref())
        .is_some_and(|s| !s.is_empty());
    let id = claims
        .user_id
        .clone()
        .or(claims.sub.clone())
        .filter(|s| !s.is_empty());

    if !has_name_or_client {
        return Err(JwksError::MissingIdentity);
    }
    let Some(id) = id else {
        return Err(JwksError::MissingIdentity);
    };

    Ok(UserClaims::new(
        claims.user_name.unwrap_or_default(),
        id,
        Role::from_scopes(claims.scope.iter().map(String::as_str)),
    ))
}

#[derive(Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

async fn fetch_jwks(
    http: &reqwest::Client,
    token_keys_url: &str,
) -> Result<HashMap<String, DecodingKey>, JwksError> {
    let resp = http
        .get(token_keys_url)
        .send()
        .await
        .map_err(|_| JwksError::FetchFailed)?
        .error_for_status()
        .map_err(|_| JwksError::FetchFailed)?;
    let jwks: JwksResponse = resp.json().await.map_err(|_| JwksError::FetchFailed)?;

    let mut out = HashMap::new();
    for key in jwks.keys {
        if key.kty != "RSA" {
            tracing::debug!(kty = %key.kty, "jwks: skipping non-RSA key");
            continue;
        }
        let (Some(kid), Some(n), Some(e)) = (key.kid, key.n, key.e) else {
            tracing::debug!("jwks: skipping key missing kid/n/e");
            continue;
        };
        match DecodingKey::from_rsa_components(&n, &e) {
            Ok(decoding_key) => {
                out.insert(kid, decoding_key);
            }
            Err(error) => tracing::debug!(kid = %kid, %error, "jwks: skipping malformed key"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::EncodeRsaPublicKey as _;
    use rsa::pkcs1v15::SigningKey;
    // PKCS#1 v1.5 signing is deterministic; no randomness needed at sign time.
    use rsa::signature::{SignatureEncoding as _, Signer as _};
    use rsa::traits::PublicKeyParts as _;
    use sha2::Sha256;

    fn sign(header: &serde_json::Value, payload: &serde_json::Value, key: &RsaPrivateKey) -> String {
        let header_b64 = B64.encode(serde_json::to_vec(header).unwrap());
        let payload_b64 = B64.encode(serde_json::to_vec(payload).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");

        let signing_key = SigningKey::<Sha256>::new(key.clone());
        let sig = signing_key.sign(signing_input.as_bytes());
        let sig_b64 = B64.encode(sig.to_bytes());
        format!("{signing_input}.{sig_b64}")
    }

    fn decoding_key_for(key: &RsaPrivateKey) -> DecodingKey {
        let public = key.to_public_key();
        DecodingKey::from_rsa_pem(public.to_pkcs1_pem(Default::default()).unwrap().as_bytes())
            .expect("valid rsa pem")
    }

    fn gen_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate rsa key")
    }

    fn unix_now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[tokio::test]
    async fn token_signed_under_rotated_kid_is_rejected_until_key_is_known() {
        let key_old = gen_key();
        let key_new = gen_key();

        let mut keys = HashMap::new();
        keys.insert("old".to_string(), decoding_key_for(&key_old));
        let client = JwksClient::from_keys(
            reqwest::Client::new(),
            "http://unused.invalid/token_keys".to_string(),
            keys,
        );

        let header = serde_json::json!({"alg": "RS256", "kid": "new", "typ": "JWT"});
        let payload = serde_json::json!({
            "user_name": "alice",
            "user_id": "u1",
            "exp": unix_now() + 3600,
            "scope": ["diego-analyzer.viewer"],
        });
        let token = sign(&header, &payload, &key_new);

        // `kid=new` is unknown and the forced refresh will fail (bogus URL), so verification
        // must fail rather than silently accepting a token signed by a different key.
        let result = client.verify_and_parse(&token).await;
        assert!(result.is_err());

        // Simulate the rotation being picked up.
        client
            .inner
            .cache
            .write()
            .await
            .keys_by_kid
            .insert("new".to_string(), decoding_key_for(&key_new));
        let claims = client.verify_and_parse(&token).await.unwrap();
        assert_eq!(claims.user_id, "u1");
    }

    #[tokio::test]
    async fn signature_from_wrong_key_is_rejected() {
        let key1 = gen_key();
        let key2 = gen_key();

        let mut keys = HashMap::new();
        // Cache advertises `kid=k1` but maps it to key2's public key — simulates a token
        // signed by key1 being presented against a `kid` that resolves to a different key.
        keys.insert("k1".to_string(), decoding_key_for(&key2));
        let client = JwksClient::from_keys(
            reqwest::Client::new(),
            "http://unused.invalid/token_keys".to_string(),
            keys,
        );

        let header = serde_json::json!({"alg": "RS256", "kid": "k1", "typ": "JWT"});
        let payload = serde_json::json!({
            "user_name": "alice",
            "user_id": "u1",
            "exp": unix_now() + 3600,
            "scope": [],
        });
        let token = sign(&header, &payload, &key1);

        assert_eq!(
            client.verify_and_parse(&token).await.unwrap_err(),
            JwksError::BadSignature
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let key = gen_key();
        let mut keys = HashMap::new();
        keys.insert("k1".to_string(), decoding_key_for(&key));
        let client = JwksClient::from_keys(
            reqwest::Client::new(),
            "http://unused.invalid/token_keys".to_string(),
            keys,
        );

        let header = serde_json::json!({"alg": "RS256", "kid": "k1", "typ": "JWT"});
        let payload = serde_json::json!({
            "user_name": "alice",
            "user_id": "u1",
            "exp": unix_now() - 10,
            "scope": [],
        });
        let token = sign(&header, &payload, &key);

        assert_eq!(
            client.verify_and_parse(&token).await.unwrap_err(),
            JwksError::Expired
        );
    }

    #[tokio::test]
    async fn non_jwt_typ_is_rejected() {
        let key = gen_key();
        let mut keys = HashMap::new();
        keys.insert("k1".to_string(), decoding_key_for(&key));
        let client = JwksClient::from_keys(
            reqwest::Client::new(),
            "http://unused.invalid/token_keys".to_string(),
            keys,
        );

        let header = serde_json::json!({"alg": "RS256", "kid": "k1", "typ": "at+jwt"});
        let payload = serde_json::json!({
            "user_name": "alice",
            "user_id": "u1",
            "exp": unix_now() + 3600,
            "scope": [],
        });
        let token = sign(&header, &payload, &key);

        assert_eq!(client.verify_and_parse(&token).await.unwrap_err(), JwksError::BadAlg);
    }

    #[test]
    fn no_diego_scope_yields_viewer_role() {
        assert_eq!(Role::from_scopes(["openid"]), Role::Viewer);
    }

    #[test]
    fn operator_scope_yields_operator_role() {
        assert_eq!(
            Role::from_scopes(["openid", "diego-analyzer.operator"]),
            Role::Operator
        );
    }
}
