// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{constants::*, Credential};
use async_trait::async_trait;
use bytes::Bytes;
use cortexauth_core::time::{now, parse_rfc3339, DateTime};
use cortexauth_core::{Context, Error, ProvideCredential, Result};
use http::header::CONTENT_LENGTH;
use http::{Method, StatusCode};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
/// 6h, the ttl recommended for session tokens.
const IMDS_TOKEN_TTL_SECONDS: i64 = 21600;
/// Re-fetch the session token this long before it actually expires.
const IMDS_TOKEN_REFRESH_BUFFER_SECONDS: i64 = 600;

/// IMDSv2CredentialProvider loads instance profile credentials from the EC2
/// instance metadata service using the session token flow.
///
/// A session token is obtained with `PUT /latest/api/token` and cached for
/// subsequent calls. The attached role is then listed and its credentials
/// fetched. Setting `AWS_EC2_METADATA_DISABLED=true` turns the provider off,
/// and `AWS_EC2_METADATA_SERVICE_ENDPOINT` overrides the endpoint.
#[derive(Debug, Clone, Default)]
pub struct IMDSv2CredentialProvider {
    endpoint: Option<String>,
    token: Arc<Mutex<Option<(String, DateTime)>>>,
}

impl IMDSv2CredentialProvider {
    /// Create a new `IMDSv2CredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn endpoint(&self, ctx: &Context) -> String {
        let endpoint = self
            .endpoint
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| ctx.env_value(AWS_EC2_METADATA_SERVICE_ENDPOINT))
            .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
        endpoint.trim_end_matches('/').to_string()
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        match guard.as_ref() {
            Some((token, expires_at)) if *expires_at > now() => Some(token.clone()),
            _ => None,
        }
    }

    async fn session_token(&self, ctx: &Context, endpoint: &str) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let url = format!("{endpoint}/latest/api/token");
        let req = http::Request::builder()
            .method(Method::PUT)
            .uri(&url)
            .header(CONTENT_LENGTH, "0")
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECONDS.to_string())
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS token request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to connect to IMDS")
                .with_source(e)
                .with_context(format!("endpoint: {endpoint}"))
                .set_retryable(true)
        })?;
        let token = check_status("fetch session token", resp)?;

        let expires_at = now()
            + chrono::TimeDelta::seconds(IMDS_TOKEN_TTL_SECONDS - IMDS_TOKEN_REFRESH_BUFFER_SECONDS);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some((token.clone(), expires_at));
        }

        Ok(token)
    }

    async fn get_metadata(&self, ctx: &Context, url: &str, token: &str) -> Result<String> {
        let req = http::Request::builder()
            .method(Method::GET)
            .uri(url)
            .header(IMDS_TOKEN_HEADER, token)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS metadata request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to query IMDS")
                .with_source(e)
                .with_context(format!("url: {url}"))
                .set_retryable(true)
        })?;
        check_status("read metadata", resp).map_err(|e| e.with_context(format!("url: {url}")))
    }
}

/// Map a non-200 metadata response onto an error kind.
fn check_status(operation: &str, resp: http::Response<String>) -> Result<String> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(resp.into_body());
    }

    let message = format!("IMDS {operation} failed with {status}: {}", resp.body());
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::permission_denied(message),
        StatusCode::NOT_FOUND => Error::config_invalid(message),
        s if s.is_server_error() => Error::unexpected(message).set_retryable(true),
        _ => Error::unexpected(message),
    };
    Err(err)
}

#[async_trait]
impl ProvideCredential for IMDSv2CredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if ctx.env_flag(AWS_EC2_METADATA_DISABLED) {
            log::debug!("IMDS disabled via {AWS_EC2_METADATA_DISABLED}");
            return Ok(None);
        }

        let endpoint = self.endpoint(ctx);
        let token = self.session_token(ctx, &endpoint).await?;

        let roles_url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
        let roles = self.get_metadata(ctx, &roles_url, &token).await?;
        let Some(role) = roles.lines().map(str::trim).find(|v| !v.is_empty()) else {
            return Err(Error::config_invalid("no IAM role attached to EC2 instance"));
        };

        let creds_url = format!("{roles_url}{role}");
        let body = self.get_metadata(ctx, &creds_url, &token).await?;
        let creds: InstanceProfileCredentials = serde_json::from_str(&body).map_err(|e| {
            Error::unexpected("failed to parse IMDS credentials response")
                .with_source(e)
                .with_context(format!("role: {role}"))
        })?;

        if creds.code != "Success" {
            let message = format!("IMDS returned [{}] {}", creds.code, creds.message);
            let err = match creds.code.as_str() {
                "AssumeRoleUnauthorizedAccess" => Error::permission_denied(message),
                code if code.contains("Expired") => Error::credential_expired(message),
                _ => Error::unexpected(message),
            };
            return Err(err.with_context(format!("role: {role}")));
        }

        let expires_in = parse_rfc3339(&creds.expiration).map_err(|e| {
            Error::unexpected("failed to parse IMDS credential expiration")
                .with_source(e)
                .with_context(format!("expiration: {}", creds.expiration))
        })?;

        Ok(Some(Credential {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: Some(creds.token),
            expires_in: Some(expires_in),
        }))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InstanceProfileCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide_credential::testing::MockHttpSend;
    use cortexauth_core::{ErrorKind, StaticEnv};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const ROLE_CREDENTIALS: &str = r#"{
        "Code": "Success",
        "LastUpdated": "2024-01-01T00:00:00Z",
        "Type": "AWS-HMAC",
        "AccessKeyId": "ASIAIMDSACCESSKEY",
        "SecretAccessKey": "imds-secret-access-key",
        "Token": "imds-session-token",
        "Expiration": "2099-01-01T00:00:00Z"
    }"#;

    fn metadata_service(endpoint: &str, credentials: &str) -> MockHttpSend {
        MockHttpSend::new()
            .route(
                Method::PUT,
                &format!("{endpoint}/latest/api/token"),
                StatusCode::OK,
                "session-token",
            )
            .route(
                Method::GET,
                &format!("{endpoint}/latest/meta-data/iam/security-credentials/"),
                StatusCode::OK,
                "prometheus-writer\n",
            )
            .route(
                Method::GET,
                &format!("{endpoint}/latest/meta-data/iam/security-credentials/prometheus-writer"),
                StatusCode::OK,
                credentials,
            )
    }

    fn ctx(http: MockHttpSend, envs: &[(&str, &str)]) -> Context {
        Context::new().with_http_send(http).with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[tokio::test]
    async fn test_imds_flow() {
        let _ = env_logger::builder().is_test(true).try_init();

        let http = metadata_service(IMDS_ENDPOINT, ROLE_CREDENTIALS);
        let ctx = ctx(http.clone(), &[]);

        let cred = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .expect("credential must be loaded");
        assert_eq!(cred.access_key_id, "ASIAIMDSACCESSKEY");
        assert_eq!(cred.session_token.as_deref(), Some("imds-session-token"));
        assert!(cred.expires_in.is_some());

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].0, Method::PUT);
        assert_eq!(requests[0].2.get(IMDS_TOKEN_TTL_HEADER).unwrap(), "21600");
        assert_eq!(requests[1].2.get(IMDS_TOKEN_HEADER).unwrap(), "session-token");
        assert_eq!(requests[2].2.get(IMDS_TOKEN_HEADER).unwrap(), "session-token");
    }

    #[tokio::test]
    async fn test_session_token_is_cached() {
        let http = metadata_service(IMDS_ENDPOINT, ROLE_CREDENTIALS);
        let ctx = ctx(http.clone(), &[]);
        let provider = IMDSv2CredentialProvider::new();

        provider.provide_credential(&ctx).await.unwrap().unwrap();
        provider.provide_credential(&ctx).await.unwrap().unwrap();

        let puts = http
            .requests()
            .into_iter()
            .filter(|(m, _, _)| m == Method::PUT)
            .count();
        assert_eq!(puts, 1);
    }

    #[tokio::test]
    async fn test_disabled_via_env() {
        let http = metadata_service(IMDS_ENDPOINT, ROLE_CREDENTIALS);
        let ctx = ctx(http.clone(), &[(AWS_EC2_METADATA_DISABLED, "true")]);

        let cred = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap();
        assert!(cred.is_none());
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_override() {
        let http = metadata_service("http://metadata.internal:1338", ROLE_CREDENTIALS);
        let ctx = ctx(
            http.clone(),
            &[(AWS_EC2_METADATA_SERVICE_ENDPOINT, "http://metadata.internal:1338/")],
        );
        let cred = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_key_id, "ASIAIMDSACCESSKEY");

        // An explicitly configured endpoint wins over the environment.
        let http = metadata_service("http://localhost:1338", ROLE_CREDENTIALS);
        let ctx = Context::new().with_http_send(http).with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from([(
                AWS_EC2_METADATA_SERVICE_ENDPOINT.to_string(),
                "http://metadata.internal:1338".to_string(),
            )]),
        });
        let cred = IMDSv2CredentialProvider::new()
            .with_endpoint("http://localhost:1338")
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_key_id, "ASIAIMDSACCESSKEY");
    }

    #[tokio::test]
    async fn test_error_code_in_body() {
        let body = r#"{"Code": "AssumeRoleUnauthorizedAccess", "Message": "not allowed"}"#;
        let http = metadata_service(IMDS_ENDPOINT, body);

        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx(http, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.message().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_no_role_attached() {
        let http = MockHttpSend::new()
            .route(
                Method::PUT,
                "http://169.254.169.254/latest/api/token",
                StatusCode::OK,
                "session-token",
            )
            .route(
                Method::GET,
                "http://169.254.169.254/latest/meta-data/iam/security-credentials/",
                StatusCode::NOT_FOUND,
                "",
            );

        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx(http, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_unreachable_is_retryable() {
        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx(MockHttpSend::new(), &[]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
