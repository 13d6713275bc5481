//! S3-compatible [`ObjectStore`] backend, signed with AWS SigV4.

use crate::{ObjectStore, StorageValue};
use async_trait::async_trait;
use chrono::Utc;
use fleet_error::{ErrorCode, FleetError};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Static or temporary S3 credentials.
#[derive(Debug, Clone)]
pub enum S3Auth {
    /// Long-lived access key pair.
    Static {
        /// `AWS_ACCESS_KEY_ID`.
        access_key_id: String,
        /// `AWS_SECRET_ACCESS_KEY`.
        secret_access_key: String,
    },
    /// A short-lived credential set plus session token, as vended by an
    /// assumed role (`S3_BUCKET_ROLE_ARN`).
    Temporary {
        /// Scoped access key id.
        access_key_id: String,
        /// Scoped secret key.
        secret_access_key: String,
        /// STS session token.
        session_token: String,
    },
}

impl S3Auth {
    fn access_key_id(&self) -> &str {
        match self {
            Self::Static { access_key_id, .. } | Self::Temporary { access_key_id, .. } => {
                access_key_id
            }
        }
    }

    fn secret_access_key(&self) -> &str {
        match self {
            Self::Static { secret_access_key, .. }
            | Self::Temporary { secret_access_key, .. } => secret_access_key,
        }
    }

    fn session_token(&self) -> Option<&str> {
        match self {
            Self::Static { .. } => None,
            Self::Temporary { session_token, .. } => Some(session_token),
        }
    }
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name (`S3_BUCKET_NAME`).
    pub bucket: String,
    /// Region (`S3_REGION`).
    pub region: String,
    /// Endpoint base URL, e.g. `https://s3.us-east-1.amazonaws.com`
    /// (`AWS_ENDPOINT_URL`).
    pub endpoint: String,
    /// Credentials.
    pub auth: S3Auth,
    /// Prefix (bucket-like namespace) within the bucket.
    pub prefix: String,
}

/// Object storage backed by an S3-compatible REST API, signed with SigV4.
#[derive(Debug, Clone)]
pub struct S3Store {
    pub(crate) config: S3Config,
    client: reqwest::Client,
}

impl S3Store {
    /// Create a store from `config`.
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            self.config.prefix,
            key
        )
    }

    pub(crate) fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket
        )
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, FleetError> {
        let headers = sign_request(&self.config, method.as_str(), url, &body);
        let mut req = self.client.request(method, url).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        req.send()
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("S3 request failed: {e}")))
    }

    fn map_status(resp: &reqwest::Response, key: &str) -> Option<FleetError> {
        let status = resp.status();
        if status.is_success() {
            return None;
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            Some(FleetError::not_found(format!("no such key: {key}")))
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Some(FleetError::new(
                ErrorCode::Unavailable,
                format!("S3 returned {status} for {key}"),
            ))
        } else {
            Some(FleetError::internal(format!("S3 returned {status} for {key}")))
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, value: StorageValue) -> Result<(), FleetError> {
        let url = self.object_url(key);
        let resp = self
            .request(reqwest::Method::PUT, &url, value.to_bytes())
            .await?;
        if let Some(err) = Self::map_status(&resp, key) {
            return Err(err);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StorageValue, FleetError> {
        let url = self.object_url(key);
        let resp = self.request(reqwest::Method::GET, &url, Vec::new()).await?;
        if let Some(err) = Self::map_status(&resp, key) {
            return Err(err);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FleetError::internal(format!("reading S3 body for {key}: {e}")))?;
        StorageValue::decode(key, bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), FleetError> {
        let url = self.object_url(key);
        let resp = self
            .request(reqwest::Method::DELETE, &url, Vec::new())
            .await?;
        if let Some(err) = Self::map_status(&resp, key) {
            return Err(err);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, FleetError> {
        let url = self.object_url(key);
        let resp = self.request(reqwest::Method::HEAD, &url, Vec::new()).await?;
        Ok(resp.status().is_success())
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), FleetError> {
        let mut existing = match self.get(key).await {
            Ok(StorageValue::JsonLines(items)) => items,
            Ok(_) => {
                return Err(FleetError::invalid_argument(format!(
                    "{key} is not a jsonl key"
                )));
            }
            Err(e) if e.code == ErrorCode::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        existing.push(value);
        self.put(key, StorageValue::JsonLines(existing)).await
    }

    async fn append_many(&self, key: &str, values: Vec<Value>) -> Result<(), FleetError> {
        let mut existing = match self.get(key).await {
            Ok(StorageValue::JsonLines(items)) => items,
            Ok(_) => {
                return Err(FleetError::invalid_argument(format!(
                    "{key} is not a jsonl key"
                )));
            }
            Err(e) if e.code == ErrorCode::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        existing.extend(values);
        self.put(key, StorageValue::JsonLines(existing)).await
    }

    async fn list(&self) -> Result<Vec<String>, FleetError> {
        let url = format!(
            "{}?list-type=2&prefix={}/",
            self.bucket_url(),
            self.config.prefix
        );
        let resp = self.request(reqwest::Method::GET, &url, Vec::new()).await?;
        if let Some(err) = Self::map_status(&resp, &self.config.prefix) {
            return Err(err);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FleetError::internal(format!("reading S3 list body: {e}")))?;
        Ok(parse_list_bucket_keys(&body, &self.config.prefix))
    }

    fn path(&self, key: &str) -> String {
        self.object_url(key)
    }

    async fn ensure_bucket(&self) -> Result<(), FleetError> {
        let resp = self
            .request(reqwest::Method::PUT, &self.bucket_url(), Vec::new())
            .await?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        if let Some(err) = Self::map_status(&resp, &self.config.bucket) {
            return Err(err);
        }
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool, FleetError> {
        let resp = self
            .request(reqwest::Method::HEAD, &self.bucket_url(), Vec::new())
            .await?;
        Ok(resp.status().is_success())
    }

    async fn is_healthy(&self) -> bool {
        self.bucket_exists().await.unwrap_or(false)
    }
}

/// Minimal `ListBucketResult` XML key extraction: enough to recover the
/// `<Key>` entries without a full XML parser.
fn parse_list_bucket_keys(xml: &str, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Key>") {
        let after = &rest[start + "<Key>".len()..];
        let Some(end) = after.find("</Key>") else {
            break;
        };
        let full_key = &after[..end];
        if let Some(stripped) = full_key.strip_prefix(&format!("{prefix}/")) {
            keys.push(stripped.to_string());
        }
        rest = &after[end..];
    }
    keys
}

/// Compute SigV4 request headers for `method`/`url`/`body`.
///
/// Simplified relative to the full AWS specification (no query-string
/// canonicalization beyond what's already in `url`), sufficient for the
/// single-object PUT/GET/DELETE/HEAD/LIST paths this store issues.
fn sign_request(config: &S3Config, method: &str, url: &str, body: &[u8]) -> Vec<(String, String)> {
    let now = Utc::now();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let parsed = url::Url::parse(url).ok();
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_string();
    let canonical_uri = parsed.as_ref().map(|u| u.path().to_string()).unwrap_or_default();
    let canonical_query = parsed.as_ref().map(|u| u.query().unwrap_or("").to_string()).unwrap_or_default();

    let payload_hash = hex::encode(Sha256::digest(body));

    let mut headers = vec![
        ("host".to_string(), host.clone()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(token) = config.auth.session_token() {
        headers.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    headers.sort();

    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect::<String>();

    let canonical_request = format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    let credential_scope = format!("{date_stamp}/{}/s3/aws4_request", config.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(config.auth.secret_access_key(), &date_stamp, &config.region);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        config.auth.access_key_id()
    );

    let mut out = headers;
    out.push(("authorization".to_string(), authorization));
    out
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret: &str, date_stamp: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_bucket_xml_extracts_relative_keys() {
        let xml = r#"<ListBucketResult><Contents><Key>traces/common.Message.m1.json</Key></Contents><Contents><Key>traces/common.Message.m2.json</Key></Contents></ListBucketResult>"#;
        let keys = parse_list_bucket_keys(xml, "traces");
        assert_eq!(keys, vec!["common.Message.m1.json", "common.Message.m2.json"]);
    }

    #[test]
    fn signing_is_deterministic_for_the_same_instant() {
        let config = S3Config {
            bucket: "b".into(),
            region: "us-east-1".into(),
            endpoint: "https://s3.amazonaws.com".into(),
            auth: S3Auth::Static {
                access_key_id: "AKIDEXAMPLE".into(),
                secret_access_key: "secret".into(),
            },
            prefix: "resources".into(),
        };
        let headers_a = sign_request(&config, "GET", "https://s3.amazonaws.com/b/resources/x.json", b"");
        assert!(headers_a.iter().any(|(k, _)| k == "authorization"));
    }
}
