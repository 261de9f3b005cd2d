//! HTTP transport collaborator
//!
//! The engine talks to a [`HttpClient`] trait object: (method, URI, option
//! set) in, response out. [`ReqwestClient`] is the production implementation
//! on `reqwest::blocking`; tests inject their own mock. Transport errors are
//! plain strings here — the request runner wraps them into the error
//! taxonomy with the source line attached.

use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::config::Config;

/// One part of a `[multipart]` request body.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub contents: String,
    pub filename: Option<String>,
}

/// Request body, classified by the request runner.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    None,
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
    Json(JsonValue),
    Raw(String),
}

/// Merged option set for one request: headers, `[Options]` block entries,
/// and the body, all placeholder-resolved.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    /// Raw `[Options]` entries. Known keys: `timeout` (seconds), `auth`
    /// (`user:password`), `query` (appended query string).
    pub options: Vec<(String, String)>,
    pub body: RequestBody,
}

/// Response snapshot stored on the execution context.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header values for `name` (case-insensitive), joined with `", "` the
    /// way a single header line renders.
    pub fn header_line(&self, name: &str) -> String {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn set_cookie_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait HttpClient {
    fn send(
        &self,
        method: &str,
        uri: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, String>;
}

/// Blocking reqwest-backed client bound to the config it was built from.
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
    base_uri: Option<String>,
    auth: Option<String>,
}

impl ReqwestClient {
    pub fn build(config: &Config) -> Result<Self, String> {
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs_f64(config.connection_timeout))
            .timeout(Duration::from_secs_f64(config.timeout))
            .danger_accept_invalid_certs(!config.verify);

        if !config.allow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(|e| e.to_string())?);
        }

        Ok(Self {
            inner: builder.build().map_err(|e| e.to_string())?,
            base_uri: config.base_uri.clone(),
            auth: config.auth.clone(),
        })
    }

    fn full_uri(&self, uri: &str) -> Result<String, String> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(uri.to_string());
        }
        match &self.base_uri {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                uri.trim_start_matches('/')
            )),
            None => Err(format!("relative URI {uri} requires config baseUri")),
        }
    }
}

impl HttpClient for ReqwestClient {
    fn send(
        &self,
        method: &str,
        uri: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, String> {
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|e| e.to_string())?;
        let mut uri = self.full_uri(uri)?;

        let mut auth = self.auth.clone();
        let mut timeout = None;
        for (key, value) in &options.options {
            match key.as_str() {
                "auth" => auth = Some(value.clone()),
                "timeout" => {
                    timeout = Some(value.parse::<f64>().map_err(|_| {
                        format!("option timeout expects seconds, got {value}")
                    })?);
                }
                "query" => {
                    let sep = if uri.contains('?') { '&' } else { '?' };
                    uri = format!("{uri}{sep}{value}");
                }
                other => return Err(format!("unknown request option: {other}")),
            }
        }

        let mut req = self.inner.request(method, &uri);
        for (name, value) in &options.headers {
            req = req.header(name, value);
        }
        if let Some(secs) = timeout {
            req = req.timeout(Duration::from_secs_f64(secs));
        }
        if let Some(auth) = auth {
            let (user, password) = auth.split_once(':').unwrap_or((auth.as_str(), ""));
            req = req.basic_auth(user, Some(password));
        }

        req = match options.body {
            RequestBody::None => req,
            RequestBody::Form(fields) => req.form(&fields),
            RequestBody::Json(json) => req.json(&json),
            RequestBody::Raw(text) => req.body(text),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for part in parts {
                    let mut p = reqwest::blocking::multipart::Part::text(part.contents);
                    if let Some(filename) = part.filename {
                        p = p.file_name(filename);
                    }
                    form = form.part(part.name, p);
                }
                req.multipart(form)
            }
        };

        let response = req.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_line_joins_case_insensitively() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![
                ("X-One".into(), "a".into()),
                ("x-one".into(), "b".into()),
                ("Other".into(), "c".into()),
            ],
            body: vec![],
        };
        assert_eq!(resp.header_line("X-ONE"), "a, b");
        assert_eq!(resp.header_line("missing"), "");
    }

    #[test]
    fn test_relative_uri_requires_base() {
        let client = ReqwestClient::build(&Config::default()).unwrap();
        assert!(client.full_uri("/hello").is_err());

        let client = ReqwestClient::build(&Config {
            base_uri: Some("http://localhost:8888/".into()),
            ..Config::default()
        })
        .unwrap();
        assert_eq!(
            client.full_uri("/hello").unwrap(),
            "http://localhost:8888/hello"
        );
        assert_eq!(
            client.full_uri("https://example.com/x").unwrap(),
            "https://example.com/x"
        );
    }
}
