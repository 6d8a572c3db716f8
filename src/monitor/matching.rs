use std::fmt;

use axum::http::Method;

/// Glob-like pattern over `::`-separated module paths.
///
/// Segments are separated by `::`. A `..` stands for any number of
/// segments (including none) and `*` for exactly one. The pattern only has
/// to match a prefix of the namespace, so `shop..services` covers
/// `shop::services`, `shop::services::users` and
/// `shop::api::services::orders` alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePattern {
    raw: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    AnyOne,
    AnyMany,
}

impl NamespacePattern {
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .replace("..", "::..::")
            .split("::")
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                ".." => Token::AnyMany,
                "*" => Token::AnyOne,
                lit => Token::Literal(lit.to_owned()),
            })
            .collect();
        Self {
            raw: raw.to_owned(),
            tokens,
        }
    }

    pub fn matches(&self, namespace: &str) -> bool {
        let segments: Vec<&str> = namespace.split("::").filter(|s| !s.is_empty()).collect();
        match_prefix(&self.tokens, &segments)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for NamespacePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_prefix(tokens: &[Token], segments: &[&str]) -> bool {
    let Some((head, rest)) = tokens.split_first() else {
        return true;
    };
    match head {
        Token::AnyMany => (0..=segments.len()).any(|skip| match_prefix(rest, &segments[skip..])),
        Token::AnyOne => !segments.is_empty() && match_prefix(rest, &segments[1..]),
        Token::Literal(lit) => {
            segments.first() == Some(&lit.as_str()) && match_prefix(rest, &segments[1..])
        }
    }
}

/// Which calls get wrapped: service calls by namespace, HTTP handlers by
/// request method.
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    service_namespaces: Vec<NamespacePattern>,
    http_methods: Vec<Method>,
}

impl MatchPolicy {
    pub fn new(service_namespaces: Vec<NamespacePattern>, http_methods: Vec<Method>) -> Self {
        Self {
            service_namespaces,
            http_methods,
        }
    }

    pub fn default_http_methods() -> Vec<Method> {
        vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]
    }

    pub fn matches_service(&self, namespace: &str) -> bool {
        self.service_namespaces.iter().any(|p| p.matches(namespace))
    }

    pub fn matches_http(&self, method: &Method) -> bool {
        self.http_methods.contains(method)
    }
}

impl Default for MatchPolicy {
    /// Every `services` module of this crate, plus GET/POST/PUT/DELETE.
    fn default() -> Self {
        Self::new(
            vec![NamespacePattern::parse(concat!(env!("CARGO_CRATE_NAME"), "..services"))],
            Self::default_http_methods(),
        )
    }
}
