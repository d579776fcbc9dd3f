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

//! Debug dumps of signed requests and their responses.

use cortexauth_core::utils::Redact;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName};
use reqwest::{Request, Response};
use std::fmt::{Debug, Write};

const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// DumpSink receives rendered dumps when debug mode is on.
///
/// A failing sink never fails the request: the error is logged and dropped.
pub trait DumpSink: Debug + Send + Sync + 'static {
    /// Record one rendered dump.
    fn dump(&self, dump: &str) -> anyhow::Result<()>;
}

/// DumpSink writing through the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDumpSink;

impl DumpSink for LogDumpSink {
    fn dump(&self, dump: &str) -> anyhow::Result<()> {
        log::debug!("{dump}");
        Ok(())
    }
}

/// Render the request line and headers. The body is never included.
pub(crate) fn render_request(req: &Request) -> String {
    let url = req.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut out = format!("{} {} {:?}\n", req.method(), target, req.version());
    if !req.headers().contains_key(http::header::HOST) {
        if let Some(host) = url.host_str() {
            match url.port() {
                Some(port) => {
                    let _ = writeln!(out, "host: {host}:{port}");
                }
                None => {
                    let _ = writeln!(out, "host: {host}");
                }
            }
        }
    }
    render_headers(&mut out, req.headers());
    out
}

/// Render the status line and headers. The body is never included.
pub(crate) fn render_response(resp: &Response) -> String {
    let mut out = format!("{:?} {}\n", resp.version(), resp.status());
    render_headers(&mut out, resp.headers());
    out
}

fn render_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        if is_secret(name) {
            let _ = writeln!(out, "{name}: {}", Redact::from(&*value));
        } else {
            let _ = writeln!(out, "{name}: {value}");
        }
    }
}

fn is_secret(name: &HeaderName) -> bool {
    *name == AUTHORIZATION || name.as_str() == X_AMZ_SECURITY_TOKEN
}
