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

use crate::{new_auth, BuildError, ExporterConfig};
use cortexauth_core::{Context, OsEnv};
use cortexauth_file_read_tokio::TokioFileRead;
use cortexauth_http_send_reqwest::ReqwestHttpSend;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;

/// Metadata endpoints answer fast or not at all.
const METADATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the client a remote-write exporter pushes through.
///
/// The configured timeout and static headers are applied to `client`. When
/// `config.auth` is enabled a [`SigningInterceptor`](crate::SigningInterceptor)
/// is installed, resolving credentials through `ctx`; otherwise the client is
/// returned without one.
///
/// # Retries
///
/// Any retry middleware must be added *before* the interceptor (that is,
/// outside it) so that each attempt passes through signing again:
///
/// ```ignore
/// reqwest_middleware::ClientBuilder::new(client)
///     .with(retry_middleware)
///     .with(interceptor)
///     .build()
/// ```
pub async fn build_client(
    config: &ExporterConfig,
    client: reqwest::ClientBuilder,
    ctx: Context,
) -> Result<ClientWithMiddleware, BuildError> {
    config.validate()?;

    let client = client
        .timeout(config.timeout())
        .default_headers(config.header_map()?)
        .build()?;

    let mut builder = ClientBuilder::new(client);
    if config.auth.enabled() {
        log::debug!(
            "installing sigv4 interceptor for {} in {}",
            config.auth.service(),
            config.auth.region()
        );
        builder = builder.with(new_auth(&config.auth, ctx).await?);
    }
    Ok(builder.build())
}

/// Context reading real files, the process environment and metadata
/// endpoints over HTTP.
pub fn default_context() -> Context {
    let client = reqwest::Client::builder()
        .connect_timeout(METADATA_CONNECT_TIMEOUT)
        .timeout(METADATA_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::new(client))
        .with_env(OsEnv)
}
