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

use crate::dump::{render_request, render_response, DumpSink, LogDumpSink};
use crate::{AuthSettings, BuildError, CredentialResolver, TransportError};
use async_trait::async_trait;
use cortexauth_aws_v4::{Payload, RequestSigner};
use cortexauth_core::time::DateTime;
use cortexauth_core::{Context, Error};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use url::Url;

/// SigningInterceptor signs every outgoing request with AWS SigV4.
///
/// Install it as a [`reqwest_middleware`] middleware. Each request is signed
/// with freshly resolved credentials and the current time, then forwarded
/// once to the rest of the chain. Responses and transport errors come back
/// untouched.
///
/// The body must be held in memory: streaming bodies can't be hashed
/// without consuming them and are rejected with
/// [`TransportError::BodyUnavailable`] before anything is sent.
#[derive(Debug, Clone)]
pub struct SigningInterceptor {
    resolver: Arc<CredentialResolver>,
    signer: RequestSigner,
    debug: bool,
    sink: Arc<dyn DumpSink>,
}

impl SigningInterceptor {
    /// Create an interceptor for the given settings.
    ///
    /// Fails if the settings are invalid or no credentials can be resolved.
    pub async fn new(
        settings: &AuthSettings,
        resolver: Arc<CredentialResolver>,
    ) -> Result<Self, BuildError> {
        settings.validate()?;
        resolver.resolve().await?;

        Ok(Self {
            resolver,
            signer: RequestSigner::new(settings.service(), settings.region()),
            debug: settings.debug(),
            sink: Arc::new(LogDumpSink),
        })
    }

    /// Send debug dumps to `sink` instead of the log.
    pub fn with_dump_sink(mut self, sink: impl DumpSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Pin the signing time.
    ///
    /// # Note
    ///
    /// Requests must be signed with the current time. Only use this for testing.
    pub fn with_signing_time(mut self, time: DateTime) -> Self {
        self.signer = self.signer.with_time(time);
        self
    }

    /// Sign `req` and forward it to `next`.
    pub async fn intercept(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response, TransportError> {
        if req.body().is_some_and(|body| body.as_bytes().is_none()) {
            return Err(TransportError::BodyUnavailable);
        }

        let cred = self.resolver.resolve().await?;
        self.sign(&mut req, &cred)?;

        if self.debug {
            self.emit(render_request(&req));
        }

        let resp = next
            .run(req, extensions)
            .await
            .map_err(TransportError::Underlying)?;

        if self.debug {
            self.emit(render_response(&resp));
        }
        Ok(resp)
    }

    fn sign(
        &self,
        req: &mut Request,
        cred: &cortexauth_aws_v4::Credential,
    ) -> Result<(), TransportError> {
        let mut url = req.url().clone();
        url.set_fragment(None);

        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.method = req.method().clone();
        parts.uri = url
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| TransportError::Signing(e.into()))?;
        parts.headers = req.headers().clone();

        let body = req.body().and_then(|b| b.as_bytes()).unwrap_or_default();
        self.signer
            .sign(&mut parts, cred, Payload::Bytes(body))
            .map_err(TransportError::Signing)?;

        let signed_url = Url::parse(&parts.uri.to_string()).map_err(|e| {
            TransportError::Signing(
                Error::request_invalid("signed uri is not a valid url")
                    .with_source(anyhow::Error::new(e)),
            )
        })?;
        *req.url_mut() = signed_url;
        *req.headers_mut() = parts.headers;
        Ok(())
    }

    fn emit(&self, dump: String) {
        if let Err(err) = self.sink.dump(&dump) {
            log::warn!("failed to write debug dump: {err:?}");
        }
    }
}

#[async_trait]
impl Middleware for SigningInterceptor {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.intercept(req, extensions, next)
            .await
            .map_err(Into::into)
    }
}

/// Build an interceptor resolving credentials through the standard AWS chain.
pub async fn new_auth(settings: &AuthSettings, ctx: Context) -> Result<SigningInterceptor, BuildError> {
    let resolver = Arc::new(CredentialResolver::with_default_chain(ctx));
    SigningInterceptor::new(settings, resolver).await
}
