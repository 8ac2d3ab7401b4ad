use bento_router::{RouteError, RouteRule, Router};
use http::Method;
use std::collections::HashMap;

fn services() -> HashMap<String, String> {
    HashMap::from([
        ("POST".to_string(), "http://posts:3003/".to_string()),
        ("FEED".to_string(), "http://feed:4000".to_string()),
    ])
}

#[test]
fn longest_pattern_wins_regardless_of_declaration_order() {
    let router = Router::new([
        RouteRule::new("/v1/posts", "POST"),
        RouteRule::new("/v1/posts/:id", "POST"),
        RouteRule::new("/v1/posts/:id/feed", "FEED"),
    ]);

    let patterns: Vec<_> = router.rules().iter().map(|r| r.pattern()).collect();
    assert_eq!(patterns, vec!["/v1/posts/:id/feed", "/v1/posts/:id", "/v1/posts"]);

    let route = router.resolve("/v1/posts/3/feed", &Method::GET, &services()).unwrap();
    assert_eq!(route.service, "FEED");
}

#[test]
fn method_filters_fall_through_to_the_next_rule() {
    let router = Router::new([
        RouteRule::new("/v1/posts/:id", "FEED").methods([Method::GET]),
        RouteRule::new("/v1/posts", "POST"),
    ]);

    let read = router.resolve("/v1/posts/1", &Method::GET, &services()).unwrap();
    assert_eq!(read.service, "FEED");

    let write = router.resolve("/v1/posts/1", &Method::PUT, &services()).unwrap();
    assert_eq!(write.service, "POST");
    assert_eq!(write.target_url, "http://posts:3003/posts/1");
}

#[test]
fn trailing_segments_are_appended() {
    let router = Router::new([RouteRule::new("/v1/posts", "POST")]);

    let route = router
        .resolve("/v1/posts/9/attachments/2", &Method::GET, &services())
        .unwrap();

    assert_eq!(route.target_url, "http://posts:3003/posts/9/attachments/2");
}

#[test]
fn rewrites_fill_parameters() {
    let router = Router::new([RouteRule::new("/v1/feed/:user", "FEED").rewrite("/timeline/:user/home")]);

    let route = router.resolve("/v1/feed/ana", &Method::GET, &services()).unwrap();

    assert_eq!(route.target_url, "http://feed:4000/timeline/ana/home");
}

#[test]
fn missing_service_url_is_a_server_error() {
    let router = Router::new([RouteRule::new("/v1/search", "SEARCH")]);

    let err = router.resolve("/v1/search", &Method::GET, &services()).unwrap_err();

    assert_eq!(
        err,
        RouteError::ServiceNotConfigured {
            service: "SEARCH".into()
        }
    );
    assert_eq!(err.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn not_found_names_the_path() {
    let router = Router::new([RouteRule::new("/v1/posts", "POST")]);

    let err = router.resolve("/v1/nope", &Method::GET, &services()).unwrap_err();

    assert_eq!(err.to_string(), "No route found for path: /v1/nope");
}
