// crates/client/src/request.rs
//! Rebuildable request description.
//!
//! [`ApiRequest`] holds everything needed to construct the outgoing request
//! from scratch, so the auth layer can dispatch the same call twice: once
//! with the current access token and, after a 401 + renewal, once more with
//! the fresh one. `reqwest::Request` itself cannot be cloned once a multipart
//! body is attached, hence the owned-parts representation here.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

/// One field of a multipart form. File bytes are owned so the form can be
/// rebuilt for a retry.
#[derive(Debug, Clone)]
pub enum MultipartField {
    Text { name: String, value: String },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Multipart form. No content-type header is forced here — the encoder
    /// sets its own `multipart/form-data; boundary=...`.
    Multipart(Vec<MultipartField>),
}

/// An authenticated request before token injection.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) body: RequestBody,
    pub(crate) headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    /// POST with a JSON body. Serialization of the wire types in this crate
    /// cannot fail, so a failure collapses to a `null` body the server will
    /// reject with a 400 rather than panicking the client.
    pub fn post_json(url: impl Into<String>, body: &impl Serialize) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: RequestBody::Json(
                serde_json::to_value(body).unwrap_or(serde_json::Value::Null),
            ),
            headers: Vec::new(),
        }
    }

    /// POST with a multipart form body.
    pub fn post_multipart(url: impl Into<String>, fields: Vec<MultipartField>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: RequestBody::Multipart(fields),
            headers: Vec::new(),
        }
    }

    /// Attach an extra header. The Authorization header is injected by the
    /// session and must not be set here (see `AuthError::AlreadyAuthorized`).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn carries_authorization(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
    }

    /// Build a fresh `reqwest` request with exactly one bearer token header,
    /// reflecting whichever token is current at dispatch time.
    pub(crate) fn build(&self, http: &Client, access_token: &str) -> RequestBuilder {
        let mut builder = http
            .request(self.method.clone(), &self.url)
            .bearer_auth(access_token);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        match &self.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)),
        }
    }
}

fn build_form(fields: &[MultipartField]) -> Form {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                let part = match part.mime_str(mime) {
                    Ok(part) => part,
                    Err(_) => Part::bytes(bytes.clone()).file_name(file_name.clone()),
                };
                form.part(name.clone(), part)
            }
        };
    }
    form
}
