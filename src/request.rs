use std::collections::{BTreeMap, HashSet};
use std::fmt;

use reqwest::header::{self, HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};

use crate::{HttpExecError, Result};

/// Authentication applied to one request.
#[derive(Clone, Default, Eq, PartialEq)]
pub enum Auth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl Auth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Checks that the selected mode carries every credential it needs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Bearer { token } if token.is_empty() => Err(HttpExecError::InvalidAuthInput {
                mode: "Bearer",
                field: "token",
            }),
            Self::Bearer { .. } => Ok(()),
            Self::Basic { username, .. } if username.is_empty() => {
                Err(HttpExecError::InvalidAuthInput {
                    mode: "Basic",
                    field: "username",
                })
            }
            Self::Basic { password, .. } if password.is_empty() => {
                Err(HttpExecError::InvalidAuthInput {
                    mode: "Basic",
                    field: "password",
                })
            }
            Self::Basic { .. } => Ok(()),
        }
    }
}

/// Description of one HTTP call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestSpec {
    /// HTTP verb, used as supplied.
    pub method: String,
    /// Absolute URI.
    pub uri: String,
    /// JSON text; re-serialized before sending.
    pub json_body: Option<String>,
    /// Headers set on the request, overwriting defaults of the same name.
    pub headers: BTreeMap<String, String>,
    pub auth: Auth,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, body: impl Into<String>) -> Self {
        self.json_body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}

/// Status and raw body of a completed call. Any status code is a result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseResult {
    pub status_code: u16,
    pub body: String,
}

/// Parses and re-serializes a JSON body. Object keys come out sorted.
pub fn canonical_json(body: &str) -> Result<Vec<u8>> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(HttpExecError::MalformedInput)?;
    serde_json::to_vec(&value).map_err(HttpExecError::MalformedInput)
}

/// Turns a [`RequestSpec`] into a ready-to-send request without touching the network.
///
/// Header precedence: the JSON content type default, then caller headers,
/// then the auth mode. A caller `Authorization` header is only kept when the
/// auth mode is [`Auth::None`]. Header names are case-insensitive, so two
/// caller headers that differ only in case are rejected.
pub(crate) fn build_request(http: &reqwest::Client, spec: &RequestSpec) -> Result<Request> {
    let body = spec.json_body.as_deref().map(canonical_json).transpose()?;
    spec.auth.validate()?;

    let method = Method::from_bytes(spec.method.as_bytes())
        .map_err(|_| HttpExecError::InvalidRequest(format!("invalid method '{}'", spec.method)))?;
    if spec.uri.trim().is_empty() {
        return Err(HttpExecError::InvalidRequest("uri must not be empty".to_owned()));
    }
    let url = Url::parse(&spec.uri).map_err(|err| {
        HttpExecError::InvalidRequest(format!("invalid uri '{}': {err}", spec.uri))
    })?;

    let mut builder = http.request(method, url);
    if let Some(body) = body {
        builder = builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
    }
    builder = match &spec.auth {
        Auth::None => builder,
        Auth::Bearer { token } => builder.bearer_auth(token),
        Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
    };
    let mut request = builder
        .build()
        .map_err(|err| HttpExecError::InvalidRequest(err.to_string()))?;

    let mut seen = HashSet::with_capacity(spec.headers.len());
    for (name, value) in &spec.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpExecError::InvalidRequest(format!("invalid header name '{name}'")))?;
        if !seen.insert(name.clone()) {
            return Err(HttpExecError::InvalidRequest(format!(
                "header '{name}' is given more than once"
            )));
        }
        let value = HeaderValue::from_str(value).map_err(|_| {
            HttpExecError::InvalidRequest(format!("invalid value for header '{name}'"))
        })?;
        if name == header::AUTHORIZATION && spec.auth != Auth::None {
            #[cfg(feature = "tracing")]
            tracing::debug!("auth mode overrides caller Authorization header");
            continue;
        }
        request.headers_mut().insert(name, value);
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(spec: &RequestSpec) -> Result<Request> {
        build_request(&reqwest::Client::new(), spec)
    }

    fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    #[test]
    fn canonical_json_ignores_input_key_order() {
        let a = canonical_json(r#"{ "b": [1, 2], "a": {"y": true, "x": null} }"#).expect("valid");
        let b = canonical_json(r#"{"a":{"x":null,"y":true},"b":[1,2]}"#).expect("valid");
        assert_eq!(a, b);
        assert_eq!(a, br#"{"a":{"x":null,"y":true},"b":[1,2]}"#.to_vec());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = canonical_json("{not json").expect_err("must fail");
        assert!(matches!(err, HttpExecError::MalformedInput(_)));
    }

    #[test]
    fn body_is_canonical_and_typed_as_json() {
        let spec = RequestSpec::new("POST", "http://localhost/echo").with_json(r#"{ "a" : 1 }"#);
        let request = build(&spec).expect("request builds");

        let body = request.body().and_then(|body| body.as_bytes());
        assert_eq!(body, Some(&br#"{"a":1}"#[..]));
        assert_eq!(header(&request, "content-type"), Some("application/json"));
    }

    #[test]
    fn no_body_without_json() {
        let request = build(&RequestSpec::new("GET", "http://localhost/")).expect("builds");
        assert!(request.body().is_none());
        assert!(request.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn caller_headers_override_defaults() {
        let spec = RequestSpec::new("PUT", "http://localhost/")
            .with_json("[]")
            .with_header("Content-Type", "application/vnd.api+json")
            .with_header("X-Trace", "abc");
        let request = build(&spec).expect("builds");

        assert_eq!(header(&request, "content-type"), Some("application/vnd.api+json"));
        assert_eq!(header(&request, "x-trace"), Some("abc"));
    }

    #[test]
    fn bearer_sets_authorization() {
        let spec = RequestSpec::new("GET", "http://localhost/").with_auth(Auth::bearer("t0k"));
        let request = build(&spec).expect("builds");
        assert_eq!(header(&request, "authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn basic_uses_standard_encoding() {
        let spec =
            RequestSpec::new("GET", "http://localhost/").with_auth(Auth::basic("user", "pass"));
        let request = build(&spec).expect("builds");
        assert_eq!(header(&request, "authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn auth_mode_wins_over_caller_authorization_header() {
        let spec = RequestSpec::new("GET", "http://localhost/")
            .with_header("Authorization", "Token caller")
            .with_auth(Auth::bearer("from-auth"));
        let request = build(&spec).expect("builds");

        let values: Vec<_> = request.headers().get_all("authorization").iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(header(&request, "authorization"), Some("Bearer from-auth"));
    }

    #[test]
    fn caller_authorization_is_kept_without_auth_mode() {
        let spec = RequestSpec::new("GET", "http://localhost/")
            .with_header("Authorization", "Token caller");
        let request = build(&spec).expect("builds");
        assert_eq!(header(&request, "authorization"), Some("Token caller"));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let cases = [
            (Auth::bearer(""), "token"),
            (Auth::basic("", "x"), "username"),
            (Auth::basic("user", ""), "password"),
        ];
        for (auth, expected) in cases {
            let spec = RequestSpec::new("GET", "http://localhost/").with_auth(auth);
            match build(&spec) {
                Err(HttpExecError::InvalidAuthInput { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected auth error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_method_uri_and_header_are_request_errors() {
        let specs = [
            RequestSpec::new("GE T", "http://localhost/"),
            RequestSpec::new("GET", ""),
            RequestSpec::new("GET", "/relative/path"),
            RequestSpec::new("GET", "http://localhost/").with_header("bad header", "x"),
            RequestSpec::new("GET", "http://localhost/").with_header("X-Ok", "line\nbreak"),
        ];
        for spec in specs {
            assert!(
                matches!(build(&spec), Err(HttpExecError::InvalidRequest(_))),
                "expected invalid request for {spec:?}"
            );
        }
    }

    #[test]
    fn headers_differing_only_in_case_are_rejected() {
        let spec = RequestSpec::new("GET", "http://localhost/")
            .with_header("X-A", "1")
            .with_header("x-a", "2");

        match build(&spec) {
            Err(HttpExecError::InvalidRequest(message)) => assert!(message.contains("x-a")),
            other => panic!("expected duplicate header error, got {other:?}"),
        }
    }

    #[test]
    fn method_is_used_as_supplied() {
        let request = build(&RequestSpec::new("PATCH", "http://localhost/")).expect("builds");
        assert_eq!(*request.method(), Method::PATCH);
    }

    #[test]
    fn debug_redacts_credentials() {
        let debug = format!("{:?}", Auth::basic("alice", "hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{:?}", Auth::bearer("secret-token")).contains("secret-token"));
    }
}
