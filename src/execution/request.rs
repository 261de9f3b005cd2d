//! Request execution
//!
//! A [`RequestRunner`] carries the parsed pieces of one request directive:
//! method, URI, header and option entries, and an unresolved body spec.
//! Everything placeholder-bearing resolves at run time against the current
//! context, then the merged option set goes through the context's HTTP
//! client and the response lands back on the context.

use serde_json::Value as JsonValue;

use crate::errors::Error;
use crate::http::{MultipartPart, RequestBody, RequestOptions};
use crate::reading::Line;

use super::context::Context;
use super::value::{file_embed_path, replace_placeholders, Value};

/// One part of a `[multipart]` body. `name` and `contents` are mandatory,
/// enforced at parse time.
pub struct MultipartSpec {
    pub name: Value,
    pub contents: Value,
    pub filename: Option<Value>,
}

/// Body as written in the script, before run-time resolution.
pub enum BodySpec {
    None,
    Form(Vec<(String, Value)>),
    Multipart(Vec<MultipartSpec>),
    /// Free text, classified at run time: file embed, JSON, or raw.
    Text { line: Line, text: String },
}

pub struct RequestRunner {
    pub line: Line,
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, Value)>,
    pub options: Vec<(String, Value)>,
    pub body: BodySpec,
}

impl RequestRunner {
    pub(super) fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        ctx.invalidate_caches();

        let uri = replace_placeholders(&self.uri, ctx, &self.line)?;

        let mut headers = Vec::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            headers.push((name.clone(), value.resolve(&self.line, ctx)?.stringify()));
        }
        let mut options = Vec::with_capacity(self.options.len());
        for (name, value) in &self.options {
            options.push((name.clone(), value.resolve(&self.line, ctx)?.stringify()));
        }
        let body = self.resolve_body(ctx)?;

        let request = RequestOptions {
            headers,
            options,
            body,
        };

        let reporter = ctx.reporter.clone();
        reporter.request(&self.method, &uri, &request);

        let result = ctx
            .client()
            .map_err(|message| Error::HttpClient {
                message,
                line: self.line.clone(),
            })
            .and_then(|client| {
                client
                    .send(&self.method, &uri, request)
                    .map_err(|message| Error::HttpClient {
                        message,
                        line: self.line.clone(),
                    })
            });

        match result {
            Ok(response) => {
                reporter.response(&response);
                ctx.set_response(response);
                Ok(())
            }
            Err(err) => {
                reporter.error(&err);
                Err(err)
            }
        }
    }

    fn resolve_body(&self, ctx: &mut Context) -> Result<RequestBody, Error> {
        Ok(match &self.body {
            BodySpec::None => RequestBody::None,
            BodySpec::Form(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    resolved.push((name.clone(), value.resolve(&self.line, ctx)?.stringify()));
                }
                RequestBody::Form(resolved)
            }
            BodySpec::Multipart(parts) => {
                let mut resolved = Vec::with_capacity(parts.len());
                for part in parts {
                    resolved.push(MultipartPart {
                        name: part.name.resolve(&self.line, ctx)?.stringify(),
                        contents: part.contents.resolve(&self.line, ctx)?.stringify(),
                        filename: match &part.filename {
                            Some(f) => Some(f.resolve(&self.line, ctx)?.stringify()),
                            None => None,
                        },
                    });
                }
                RequestBody::Multipart(resolved)
            }
            BodySpec::Text { line, text } => {
                let text = replace_placeholders(text, ctx, line)?;
                let text = match file_embed_path(&text) {
                    Some(path) => {
                        let resolved = if std::path::Path::new(path).is_absolute() {
                            std::path::PathBuf::from(path)
                        } else {
                            line.dir().join(path)
                        };
                        std::fs::read_to_string(&resolved).map_err(|e| {
                            Error::execution(format!("{}: {e}", resolved.display()), line)
                        })?
                    }
                    None => text,
                };
                match serde_json::from_str::<JsonValue>(text.trim()) {
                    Ok(json) => RequestBody::Json(json),
                    Err(_) => RequestBody::Raw(text),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::execution::Val;
    use crate::http::{HttpClient, HttpResponse};
    use crate::output::SilentReporter;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the last request and replays a canned response.
    pub struct MockClient {
        pub response: HttpResponse,
        pub seen: Rc<RefCell<Vec<(String, String, RequestOptions)>>>,
        pub fail: Option<String>,
    }

    impl HttpClient for MockClient {
        fn send(
            &self,
            method: &str,
            uri: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, String> {
            self.seen
                .borrow_mut()
                .push((method.to_string(), uri.to_string(), options));
            match &self.fail {
                Some(message) => Err(message.clone()),
                None => Ok(self.response.clone()),
            }
        }
    }

    fn ctx_with_mock(
        response: HttpResponse,
        fail: Option<String>,
    ) -> (Context, Rc<RefCell<Vec<(String, String, RequestOptions)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        ctx.set_client(Box::new(MockClient {
            response,
            seen: seen.clone(),
            fail,
        }));
        (ctx, seen)
    }

    fn line(content: &str) -> Line {
        Line::new("test.rest", 1, content)
    }

    fn get(uri: &str) -> RequestRunner {
        RequestRunner {
            line: line(&format!("GET {uri}")),
            method: "GET".into(),
            uri: uri.into(),
            headers: vec![],
            options: vec![],
            body: BodySpec::None,
        }
    }

    #[test]
    fn test_sends_and_stores_response() {
        let (mut ctx, seen) = ctx_with_mock(
            HttpResponse {
                status: 200,
                headers: vec![],
                body: b"ok".to_vec(),
            },
            None,
        );

        get("http://localhost/hello").run(&mut ctx).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "GET");
        assert_eq!(seen[0].1, "http://localhost/hello");
        assert_eq!(ctx.response().unwrap().status, 200);
        assert_eq!(ctx.body().unwrap(), "ok");
    }

    #[test]
    fn test_resolves_placeholders_in_uri_and_headers() {
        let (mut ctx, seen) = ctx_with_mock(HttpResponse::default(), None);
        ctx.set_var("id", Val::Int(7));
        ctx.set_var("token", Val::Str("abc".into()));

        let runner = RequestRunner {
            line: line("GET /users/{{id}}"),
            method: "GET".into(),
            uri: "http://x/users/{{id}}".into(),
            headers: vec![("Authorization".into(), Value::new("Bearer {{token}}"))],
            options: vec![],
            body: BodySpec::None,
        };
        runner.run(&mut ctx).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen[0].1, "http://x/users/7");
        assert_eq!(
            seen[0].2.headers,
            vec![("Authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[test]
    fn test_json_body_classification() {
        let (mut ctx, seen) = ctx_with_mock(HttpResponse::default(), None);

        let mut runner = get("http://x/");
        runner.body = BodySpec::Text {
            line: line(r#"{"a": 1}"#),
            text: r#"{"a": 1}"#.into(),
        };
        runner.run(&mut ctx).unwrap();

        let seen = seen.borrow();
        assert_eq!(
            seen[0].2.body,
            RequestBody::Json(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn test_raw_body_classification() {
        let (mut ctx, seen) = ctx_with_mock(HttpResponse::default(), None);

        let mut runner = get("http://x/");
        runner.body = BodySpec::Text {
            line: line("plain text body"),
            text: "plain text body".into(),
        };
        runner.run(&mut ctx).unwrap();

        assert_eq!(
            seen.borrow()[0].2.body,
            RequestBody::Raw("plain text body".into())
        );
    }

    #[test]
    fn test_file_embed_body() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("payload.json")).unwrap();
        f.write_all(br#"{"k": true}"#).unwrap();

        let (mut ctx, seen) = ctx_with_mock(HttpResponse::default(), None);
        let body_line = Line::new(dir.path().join("test.rest"), 3, "< payload.json");
        let mut runner = get("http://x/");
        runner.body = BodySpec::Text {
            line: body_line,
            text: "< payload.json".into(),
        };
        runner.run(&mut ctx).unwrap();

        assert_eq!(
            seen.borrow()[0].2.body,
            RequestBody::Json(serde_json::json!({"k": true}))
        );
    }

    #[test]
    fn test_transport_failure_is_http_client_error() {
        let (mut ctx, _) = ctx_with_mock(HttpResponse::default(), Some("connection refused".into()));
        let err = get("http://x/").run(&mut ctx).unwrap_err();
        assert!(matches!(err, Error::HttpClient { .. }));
        assert!(!ctx.has_response());
    }
}
