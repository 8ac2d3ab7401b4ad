//! Route rules and their compiled matchers.

use http::Method;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn compile(pattern: &str) -> Vec<Segment> {
    segments(pattern)
        .map(|s| match s.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// Maps a public path pattern to a downstream service.
///
/// Patterns are `/`-separated; a segment starting with `:` captures any
/// single request segment under that name. A request may carry more
/// segments than the pattern: the extra ones are appended to the target.
///
/// ```rust
/// use bento_router::RouteRule;
/// use http::Method;
/// use std::time::Duration;
///
/// let rule = RouteRule::new("/v1/upload-file", "UPLOAD")
///     .timeout(Duration::from_secs(60))
///     .methods([Method::POST]);
///
/// assert!(rule.matches("/v1/upload-file"));
/// assert!(rule.allows(&Method::POST));
/// assert!(!rule.allows(&Method::GET));
/// ```
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: String,
    service: String,
    rewrite: Option<String>,
    timeout: Option<Duration>,
    methods: Option<Vec<Method>>,
    segments: Vec<Segment>,
}

impl RouteRule {
    /// A rule for `pattern` served by `service`.
    ///
    /// Defaults: rewrite to the pattern without its `/v1` prefix, no
    /// per-route timeout, every method.
    pub fn new(pattern: impl Into<String>, service: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let segments = compile(&pattern);
        Self {
            pattern,
            service: service.into(),
            rewrite: None,
            timeout: None,
            methods: None,
            segments,
        }
    }

    /// Sets the target path template. `:name` segments are filled from the
    /// captured parameters.
    pub fn rewrite(mut self, template: impl Into<String>) -> Self {
        self.rewrite = Some(template.into());
        self
    }

    /// Overrides the call timeout for this route.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Restricts the rule to these methods.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// The path pattern as declared, e.g. `/v1/users/:id`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Id of the service the rule forwards to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The per-route call timeout, if one was set.
    ///
    /// ```rust
    /// use bento_router::RouteRule;
    /// use std::time::Duration;
    ///
    /// let upload = RouteRule::new("/v1/upload-file", "UPLOAD").timeout(Duration::from_secs(60));
    /// assert_eq!(upload.timeout_override(), Some(Duration::from_secs(60)));
    /// assert_eq!(upload.service(), "UPLOAD");
    /// assert_eq!(RouteRule::new("/v1/posts", "POST").timeout_override(), None);
    /// ```
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// The rewrite template, or the pattern without its `/v1` prefix.
    pub fn target_template(&self) -> &str {
        match &self.rewrite {
            Some(template) => template,
            None => self.pattern.strip_prefix("/v1").unwrap_or(&self.pattern),
        }
    }

    /// True when the rule has no method filter or lists `method`.
    pub fn allows(&self, method: &Method) -> bool {
        match &self.methods {
            Some(methods) => methods.contains(method),
            None => true,
        }
    }

    /// True when every pattern segment matches the leading request segments.
    pub fn matches(&self, path: &str) -> bool {
        let mut request = segments(path);
        self.segments.iter().all(|segment| match request.next() {
            Some(part) => match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Param(_) => true,
            },
            None => false,
        })
    }

    /// Parameter values captured from `path`, by name.
    ///
    /// Only meaningful when [`matches`](Self::matches) holds.
    pub fn extract_params(&self, path: &str) -> HashMap<String, String> {
        self.segments
            .iter()
            .zip(segments(path))
            .filter_map(|(segment, part)| match segment {
                Segment::Param(name) => Some((name.clone(), part.to_string())),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Request segments beyond the pattern's length.
    pub(crate) fn trailing<'a>(&self, path: &'a str) -> Vec<&'a str> {
        segments(path).skip(self.segments.len()).collect()
    }
}

/// Fills the rule's target template and appends trailing segments.
///
/// ```rust
/// use bento_router::{build_target_url, RouteRule};
///
/// let rule = RouteRule::new("/v1/users/:id", "USER");
/// let params = rule.extract_params("/v1/users/42/posts");
/// assert_eq!(
///     build_target_url("http://users:3002", &rule, &params, "/v1/users/42/posts"),
///     "http://users:3002/users/42/posts"
/// );
/// ```
pub fn build_target_url(
    service_url: &str,
    rule: &RouteRule,
    params: &HashMap<String, String>,
    path: &str,
) -> String {
    let base = service_url.trim_end_matches('/');
    let mut url = String::from(base);

    for part in segments(rule.target_template()) {
        url.push('/');
        match part.strip_prefix(':').and_then(|name| params.get(name)) {
            Some(value) => url.push_str(value),
            None => url.push_str(part),
        }
    }
    for part in rule.trailing(path) {
        url.push('/');
        url.push_str(part);
    }

    if url.len() == base.len() {
        url.push('/');
    }
    url
}
