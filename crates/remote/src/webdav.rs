//! WebDAV transport.
//!
//! Blocking HTTP client using `reqwest` with optional Basic authentication.
//! Every request is bounded by the configured timeout.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::{RemoteError, RemotePath, RemoteStorage};

/// Characters left as-is inside a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const QUOTA_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:quota-available-bytes/></d:prop></d:propfind>"#;

/// Connection settings for a [`WebDavStorage`].
#[derive(Clone)]
pub struct WebDavOptions {
    /// Server URL including any path prefix, e.g. `https://nas/remote.php/webdav`.
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// When false, invalid or self-signed certificates are accepted.
    pub verify_tls: bool,
}

/// [`RemoteStorage`] over WebDAV.
pub struct WebDavStorage {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    propfind: Method,
    mkcol: Method,
    move_: Method,
}

impl WebDavStorage {
    pub fn new(options: WebDavOptions) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()
            .map_err(|e| RemoteError::Protocol(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            username: options.username.filter(|u| !u.is_empty()),
            password: options.password,
            timeout: options.timeout,
            propfind: extension_method("PROPFIND")?,
            mkcol: extension_method("MKCOL")?,
            move_: extension_method("MOVE")?,
        })
    }

    /// Absolute URL of `path`; directories get a trailing slash.
    fn url(&self, path: &RemotePath, collection: bool) -> String {
        let mut url = self.base_url.clone();
        for segment in path.as_str().split('/').filter(|s| !s.is_empty()) {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        if collection || path.is_root() {
            url.push('/');
        }
        url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        builder.send().map_err(|e| self.transport_error(e))
    }

    /// Sends and fails on any non-2xx status.
    fn send_ok(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = self.send(builder)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }
        Ok(resp)
    }

    fn transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else if e.is_connect() {
            RemoteError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, e))
        } else {
            RemoteError::Io(io::Error::other(e))
        }
    }

    fn propfind_request(&self, url: &str, body: Option<&'static str>) -> RequestBuilder {
        let builder = self
            .request(self.propfind.clone(), url)
            .header("Depth", "0");
        match body {
            Some(xml) => builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
                .body(xml),
            None => builder,
        }
    }
}

impl RemoteStorage for WebDavStorage {
    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        let resp = self.send(self.propfind_request(&self.url(path, false), None))?;
        let status = resp.status();
        debug!(path = %path, status = status.as_u16(), "PROPFIND");
        match status.as_u16() {
            404 => Ok(false),
            _ if status.is_success() => Ok(true),
            code => Err(RemoteError::status(
                code,
                status.canonical_reason().unwrap_or_default(),
            )),
        }
    }

    fn mkdir(&self, path: &RemotePath) -> Result<(), RemoteError> {
        self.send_ok(self.request(self.mkcol.clone(), &self.url(path, true)))?;
        debug!(path = %path, "MKCOL");
        Ok(())
    }

    fn upload_file(&self, remote: &RemotePath, local: &Path) -> Result<(), RemoteError> {
        let file = File::open(local)?;
        let len = file.metadata()?.len();
        let url = self.url(remote, false);
        self.send_ok(self.request(Method::PUT, &url).body(Body::sized(file, len)))?;
        debug!(path = %remote, bytes = len, "PUT");
        Ok(())
    }

    fn rename(
        &self,
        from: &RemotePath,
        to: &RemotePath,
        overwrite: bool,
    ) -> Result<(), RemoteError> {
        let builder = self
            .request(self.move_.clone(), &self.url(from, false))
            .header("Destination", self.url(to, false))
            .header("Overwrite", if overwrite { "T" } else { "F" });
        self.send_ok(builder)?;
        debug!(from = %from, to = %to, overwrite, "MOVE");
        Ok(())
    }

    fn delete(&self, path: &RemotePath) -> Result<(), RemoteError> {
        self.send_ok(self.request(Method::DELETE, &self.url(path, false)))?;
        debug!(path = %path, "DELETE");
        Ok(())
    }

    fn free_space_bytes(&self) -> Result<i64, RemoteError> {
        let url = self.url(&RemotePath::root(), true);
        let body = self
            .send_ok(self.propfind_request(&url, Some(QUOTA_QUERY)))?
            .text()
            .map_err(|e| self.transport_error(e))?;
        Ok(quota_available(&body)?.unwrap_or(-1))
    }
}

fn extension_method(name: &str) -> Result<Method, RemoteError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| RemoteError::Protocol(format!("invalid method {name}: {e}")))
}

/// Reads `quota-available-bytes` from a multistatus body, whatever
/// namespace prefix the server chose. `None` when the property is absent
/// or empty.
fn quota_available(body: &str) -> Result<Option<i64>, RemoteError> {
    let mut rest = body;
    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find('>') else {
            break;
        };
        let tag = &rest[..close];
        rest = &rest[close + 1..];

        if tag.starts_with('/') || tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let local = name.rsplit(':').next().unwrap_or(name);
        if local != "quota-available-bytes" {
            continue;
        }
        if self_closing {
            return Ok(None);
        }

        let text = rest[..rest.find('<').unwrap_or(rest.len())].trim();
        if text.is_empty() {
            return Ok(None);
        }
        return text
            .parse()
            .map(Some)
            .map_err(|_| RemoteError::Protocol(format!("invalid quota-available-bytes {text:?}")));
    }
    Ok(None)
}
