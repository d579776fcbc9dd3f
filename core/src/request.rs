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

use std::mem;

use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, HeaderValue, Method, Uri};

use crate::{Error, Result};

/// The pieces of a request a signer reads and rewrites.
///
/// [`SigningRequest::build`] moves the headers and uri out of the request
/// parts, the signer edits this struct, and [`SigningRequest::apply`] puts
/// everything back. The query is kept decoded so the signer can encode and
/// sort it the way the signature expects; whatever order it holds at
/// `apply` time is the order sent on the wire.
#[derive(Debug)]
pub struct SigningRequest {
    /// Request method.
    pub method: Method,
    /// `http` unless the uri says otherwise.
    pub scheme: Scheme,
    /// Host and optional port.
    pub authority: Authority,
    /// Path, `/` when the uri has none.
    pub path: String,
    /// Decoded query pairs in request order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Take the uri and headers out of `parts`.
    ///
    /// Fails with [`ErrorKind::RequestInvalid`](crate::ErrorKind::RequestInvalid)
    /// for a relative uri, since the host is part of every signature.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let Some(authority) = uri.authority else {
            return Err(Error::request_invalid("cannot sign a request without a host"));
        };
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let query = match paq.query() {
            Some(q) => form_urlencoded::parse(q.as_bytes()).into_owned().collect(),
            None => Vec::new(),
        };

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTP),
            authority,
            path: paq.path().to_string(),
            query,
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Write the method, uri and headers back into `parts`.
    ///
    /// Query pairs are joined as they are, so a signer that needs them
    /// percent-encoded must encode them before calling this.
    pub fn apply(self, parts: &mut http::request::Parts) -> Result<()> {
        let path_and_query = PathAndQuery::try_from(self.path_and_query())?;

        let mut uri = mem::take(&mut parts.uri).into_parts();
        uri.scheme = Some(self.scheme);
        uri.authority = Some(self.authority);
        uri.path_and_query = Some(path_and_query);
        parts.uri = Uri::from_parts(uri).map_err(|e| {
            Error::request_invalid("signed request has an invalid uri").with_source(e)
        })?;

        parts.method = self.method;
        parts.headers = self.headers;
        Ok(())
    }

    /// `path?k=v&flag`, or just the path when there is no query.
    fn path_and_query(&self) -> String {
        let mut s = self.path.clone();
        for (i, (k, v)) in self.query.iter().enumerate() {
            s.push(if i == 0 { '?' } else { '&' });
            s.push_str(k);
            if !v.is_empty() {
                s.push('=');
                s.push_str(v);
            }
        }
        s
    }

    /// Trim surrounding spaces from a header value, keeping inner runs.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bytes = v.as_bytes();
        let start = bytes.iter().take_while(|b| **b == b' ').count();
        let end = bytes.len() - bytes[start..].iter().rev().take_while(|b| **b == b' ').count();
        if start == 0 && end == bytes.len() {
            return;
        }

        if let Ok(mut trimmed) = HeaderValue::from_bytes(&bytes[start..end]) {
            trimmed.set_sensitive(v.is_sensitive());
            *v = trimmed;
        }
    }

    /// Header names in ascending order. [`HeaderMap`] keys are already
    /// lowercase.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.headers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
