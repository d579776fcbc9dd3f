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

use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Side effects available to credential providers.
///
/// Providers reach the filesystem, metadata endpoints and the process
/// environment only through a `Context`, so a whole credential chain can run
/// against [`StaticEnv`] and an in-memory [`HttpSend`] in tests.
///
/// A capability that was never configured fails every call with
/// [`ErrorKind::Unexpected`](crate::ErrorKind::Unexpected), and an
/// unconfigured environment is empty.
///
/// ```
/// use cortexauth_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// assert!(ctx.env_value("CORTEXAUTH_SURELY_UNSET").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    files: Arc<dyn FileRead>,
    http: Arc<dyn HttpSend>,
    env: Arc<dyn Env>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with nothing configured.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Unconfigured),
            http: Arc::new(Unconfigured),
            env: Arc::new(Unconfigured),
        }
    }

    /// Use `files` to read shared config files.
    pub fn with_file_read(mut self, files: impl FileRead) -> Self {
        self.files = Arc::new(files);
        self
    }

    /// Use `http` to reach metadata endpoints.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Use `env` as the process environment.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Read a whole file.
    #[inline]
    pub async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.file_read(path).await
    }

    /// Read a whole file as text. Invalid UTF-8 is replaced.
    pub async fn file_read_as_string(&self, path: &str) -> Result<String> {
        let content = self.file_read(path).await?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Send a request to a credential endpoint.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Send a request and decode the body as text. Invalid UTF-8 is replaced.
    pub async fn http_send_as_string(
        &self,
        req: http::Request<Bytes>,
    ) -> Result<http::Response<String>> {
        let resp = self.http_send(req).await?;
        Ok(resp.map(|body| String::from_utf8_lossy(&body).into_owned()))
    }

    /// Replace a leading `~/` (or `~\`) with the home directory.
    ///
    /// Other paths are returned as they are. Returns `None` when the path
    /// needs a home directory and the environment has none.
    pub fn expand_home_dir(&self, path: &str) -> Option<String> {
        if !(path.starts_with("~/") || path.starts_with("~\\")) {
            return Some(path.to_string());
        }
        let home = self.env.home_dir()?;
        Some(format!("{}{}", home.to_string_lossy(), &path[1..]))
    }

    /// Look up a variable. `None` if unset or not valid UTF-8.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Look up a variable, treating an empty value as unset.
    ///
    /// AWS tooling ignores exported-but-empty variables, so providers use
    /// this rather than [`Context::env_var`].
    pub fn env_value(&self, key: &str) -> Option<String> {
        self.env_var(key).filter(|v| !v.is_empty())
    }

    /// Whether `key` is set to `true`, ignoring case.
    pub fn env_flag(&self, key: &str) -> bool {
        self.env_var(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Snapshot of every variable.
    #[inline]
    pub fn env_vars(&self) -> HashMap<String, String> {
        self.env.vars()
    }
}

/// Reads shared credentials and config files.
#[async_trait::async_trait]
pub trait FileRead: Debug + Send + Sync + 'static {
    /// Read the whole file at `path`.
    async fn file_read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Sends requests to credential endpoints such as IMDS or the ECS agent.
///
/// Not a general purpose client: bodies are fully buffered both ways.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send `req` and return the buffered response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// The process environment.
pub trait Env: Debug + Send + Sync + 'static {
    /// Value of `key`, or `None` if unset or not valid UTF-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Every variable.
    fn vars(&self) -> HashMap<String, String>;

    /// Home directory of the current user, if known.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// The real environment of this process.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> HashMap<String, String> {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn home_dir(&self) -> Option<PathBuf> {
        home::home_dir()
    }

    #[cfg(target_arch = "wasm32")]
    fn home_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// A fixed environment, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// Home directory reported to providers.
    pub home_dir: Option<PathBuf>,
    /// Variables reported to providers.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn vars(&self) -> HashMap<String, String> {
        self.envs.clone()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone()
    }
}

/// Stand-in for every capability a [`Context`] was not given.
#[derive(Debug, Clone, Copy)]
struct Unconfigured;

#[async_trait::async_trait]
impl FileRead for Unconfigured {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        Err(Error::unexpected("no file reader configured").with_context(format!("path: {path}")))
    }
}

#[async_trait::async_trait]
impl HttpSend for Unconfigured {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::unexpected("no http client configured").with_context(format!("uri: {}", req.uri())))
    }
}

impl Env for Unconfigured {
    fn var(&self, _: &str) -> Option<String> {
        None
    }

    fn vars(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        None
    }
}
