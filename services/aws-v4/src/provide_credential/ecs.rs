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
use cortexauth_core::time::parse_rfc3339;
use cortexauth_core::{Context, Error, ProvideCredential, Result};
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use serde::Deserialize;

const ECS_METADATA_ENDPOINT: &str = "http://169.254.170.2";

/// EcsCredentialProvider loads task role credentials from the container
/// credentials endpoint.
///
/// `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` is resolved against
/// `http://169.254.170.2` and wins over `AWS_CONTAINER_CREDENTIALS_FULL_URI`.
/// When `AWS_CONTAINER_AUTHORIZATION_TOKEN` is set it is sent as the
/// `Authorization` header. Without either URI variable the provider yields
/// `None`.
///
/// References:
/// - [IAM roles for tasks](https://docs.aws.amazon.com/AmazonECS/latest/developerguide/task-iam-roles.html)
#[derive(Debug, Default, Clone)]
pub struct EcsCredentialProvider;

impl EcsCredentialProvider {
    /// Create a new `EcsCredentialProvider` instance.
    pub fn new() -> Self {
        Self
    }

    fn endpoint(ctx: &Context) -> Option<String> {
        if let Some(relative) = ctx.env_value(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI) {
            return Some(format!("{ECS_METADATA_ENDPOINT}{relative}"));
        }
        ctx.env_value(AWS_CONTAINER_CREDENTIALS_FULL_URI)
    }
}

#[async_trait]
impl ProvideCredential for EcsCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let Some(url) = Self::endpoint(ctx) else {
            return Ok(None);
        };

        let mut req = http::Request::builder().method(Method::GET).uri(&url);
        if let Some(token) = ctx.env_value(AWS_CONTAINER_AUTHORIZATION_TOKEN) {
            req = req.header(AUTHORIZATION, token);
        }
        let req = req.body(Bytes::new()).map_err(|e| {
            Error::request_invalid("failed to build container credentials request")
                .with_source(e)
                .with_context(format!("url: {url}"))
        })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to reach container credentials endpoint")
                .with_source(e)
                .with_context(format!("url: {url}"))
                .set_retryable(true)
        })?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let err = Error::unexpected(format!(
                "container credentials endpoint returned {status}: {}",
                resp.body()
            ));
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::permission_denied(err.message().to_string())
                }
                s if s.is_server_error() => err.set_retryable(true),
                _ => err,
            });
        }

        let body = resp.into_body();
        let creds: EcsTaskCredentials = serde_json::from_str(&body).map_err(|e| {
            Error::unexpected("failed to parse container credentials response").with_source(e)
        })?;

        let expires_in = match creds.expiration.as_deref() {
            Some(v) => Some(parse_rfc3339(v).map_err(|e| {
                Error::unexpected("failed to parse container credentials expiration")
                    .with_source(e)
                    .with_context(format!("expiration: {v}"))
            })?),
            None => None,
        };

        Ok(Some(Credential {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: creds.token,
            expires_in,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EcsTaskCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide_credential::testing::MockHttpSend;
    use cortexauth_core::{ErrorKind, SigningCredential, StaticEnv};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const TASK_CREDENTIALS: &str = r#"{
        "RoleArn": "arn:aws:iam::123456789012:role/prometheus-writer",
        "AccessKeyId": "ASIAECSACCESSKEY",
        "SecretAccessKey": "ecs-secret-access-key",
        "Token": "ecs-session-token",
        "Expiration": "2099-01-01T00:00:00Z"
    }"#;

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
    async fn test_without_env_yields_none() {
        let _ = env_logger::builder().is_test(true).try_init();

        let http = MockHttpSend::new();
        let result = EcsCredentialProvider::new()
            .provide_credential(&ctx(http.clone(), &[]))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_relative_uri() {
        let http = MockHttpSend::new().route(
            Method::GET,
            "http://169.254.170.2/v2/credentials/task-id",
            StatusCode::OK,
            TASK_CREDENTIALS,
        );
        let ctx = ctx(
            http.clone(),
            &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/v2/credentials/task-id")],
        );

        let cred = EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .expect("credential must be loaded");
        assert_eq!(cred.access_key_id, "ASIAECSACCESSKEY");
        assert_eq!(cred.secret_access_key, "ecs-secret-access-key");
        assert_eq!(cred.session_token.as_deref(), Some("ecs-session-token"));
        assert!(cred.expires_in.is_some());
        assert!(cred.is_valid());

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].2.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_full_uri_with_authorization_token() {
        let http = MockHttpSend::new().route(
            Method::GET,
            "http://localhost:8080/creds",
            StatusCode::OK,
            TASK_CREDENTIALS,
        );
        let ctx = ctx(
            http.clone(),
            &[
                (AWS_CONTAINER_CREDENTIALS_FULL_URI, "http://localhost:8080/creds"),
                (AWS_CONTAINER_AUTHORIZATION_TOKEN, "Basic dGFzazp0b2tlbg=="),
            ],
        );

        let cred = EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_key_id, "ASIAECSACCESSKEY");

        let requests = http.requests();
        assert_eq!(
            requests[0].2.get(AUTHORIZATION).unwrap(),
            "Basic dGFzazp0b2tlbg=="
        );
    }

    #[tokio::test]
    async fn test_error_status() {
        let http = MockHttpSend::new()
            .route(
                Method::GET,
                "http://169.254.170.2/denied",
                StatusCode::FORBIDDEN,
                "access denied",
            )
            .route(
                Method::GET,
                "http://169.254.170.2/broken",
                StatusCode::INTERNAL_SERVER_ERROR,
                "boom",
            );

        let err = EcsCredentialProvider::new()
            .provide_credential(&ctx(
                http.clone(),
                &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/denied")],
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = EcsCredentialProvider::new()
            .provide_credential(&ctx(
                http,
                &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/broken")],
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let err = EcsCredentialProvider::new()
            .provide_credential(&ctx(
                MockHttpSend::new(),
                &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/v2/credentials")],
            ))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
