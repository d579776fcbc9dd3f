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

//! In-memory `HttpSend` used by metadata provider tests.

use async_trait::async_trait;
use bytes::Bytes;
use cortexauth_core::{Error, HttpSend, Result};
use std::sync::{Arc, Mutex};

/// Recorded request: method, uri and headers.
pub type Recorded = (http::Method, String, http::HeaderMap);

#[derive(Debug, Clone, Default)]
pub struct MockHttpSend {
    routes: Arc<Vec<(http::Method, String, http::StatusCode, String)>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockHttpSend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        method: http::Method,
        uri: &str,
        status: http::StatusCode,
        body: &str,
    ) -> Self {
        Arc::make_mut(&mut self.routes).push((method, uri.to_string(), status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let uri = req.uri().to_string();
        self.requests.lock().expect("lock poisoned").push((
            req.method().clone(),
            uri.clone(),
            req.headers().clone(),
        ));

        let Some((_, _, status, body)) = self
            .routes
            .iter()
            .find(|(m, u, _, _)| m == req.method() && *u == uri)
        else {
            return Err(Error::unexpected("connection refused").with_context(format!("uri: {uri}")));
        };

        Ok(http::Response::builder()
            .status(*status)
            .body(Bytes::from(body.clone()))
            .expect("response must be valid"))
    }
}
