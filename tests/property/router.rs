//! Property tests for route resolution.
//!
//! Invariants tested:
//! - The longest matching pattern wins whatever the declaration order
//! - Path parameters come back exactly as they appeared in the path
//! - Segments past the pattern are appended to the target

use bento_router::{RouteRule, Router};
use http::Method;
use proptest::prelude::*;
use std::collections::HashMap;

fn services() -> HashMap<String, String> {
    HashMap::from([
        ("LIST".to_string(), "http://list:9001".to_string()),
        ("ITEM".to_string(), "http://item:9002".to_string()),
        ("PART".to_string(), "http://part:9003".to_string()),
    ])
}

fn rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new("/v1/things", "LIST"),
        RouteRule::new("/v1/things/:id", "ITEM"),
        RouteRule::new("/v1/things/:id/parts/:part", "PART"),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: declaration order never changes which rule wins
    #[test]
    fn longest_pattern_wins(
        id in "[a-z0-9]{1,12}",
        part in "[a-z0-9]{1,12}",
        rotation in 0usize..3,
    ) {
        let mut declared = rules();
        declared.rotate_left(rotation);
        let router = Router::new(declared);

        let path = format!("/v1/things/{}/parts/{}", id, part);
        let route = router.resolve(&path, &Method::GET, &services()).unwrap();

        prop_assert_eq!(route.service, "PART");
        prop_assert_eq!(route.pattern, "/v1/things/:id/parts/:part");
        prop_assert_eq!(route.target_url, format!("http://part:9003/things/{}/parts/{}", id, part));
    }

    /// Property: parameters round-trip through matching
    #[test]
    fn params_round_trip(
        id in "[A-Za-z0-9_-]{1,24}",
        part in "[A-Za-z0-9_-]{1,24}",
    ) {
        let router = Router::new(rules());
        let path = format!("/v1/things/{}/parts/{}", id, part);

        let route = router.resolve(&path, &Method::DELETE, &services()).unwrap();

        prop_assert_eq!(route.params.get("id"), Some(&id));
        prop_assert_eq!(route.params.get("part"), Some(&part));
        prop_assert_eq!(route.params.len(), 2);
    }

    /// Property: trailing segments survive into the target URL
    #[test]
    fn trailing_segments_are_kept(
        id in "[a-z0-9]{1,8}",
        tail in proptest::collection::vec("[a-z0-9]{1,8}", 1..4),
    ) {
        let router = Router::new([RouteRule::new("/v1/things/:id", "ITEM")]);
        let path = format!("/v1/things/{}/{}", id, tail.join("/"));

        let route = router.resolve(&path, &Method::GET, &services()).unwrap();

        prop_assert_eq!(
            route.target_url,
            format!("http://item:9002/things/{}/{}", id, tail.join("/"))
        );
    }
}
