//! Wildcard matching property tests
//!
//! Table cases live next to the implementation; these exercise the
//! matching rules over generated topics.

use mqttprobe::topic::{matches, validate_filter, validate_publish_topic};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,8}"
}

fn segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..6)
}

proptest! {
    #[test]
    fn concrete_topic_matches_itself(segs in segments()) {
        let topic = segs.join("/");
        prop_assert!(matches(&topic, &topic));
    }

    #[test]
    fn plus_matches_any_single_segment(
        prefix in segments(),
        middle in segment(),
        suffix in segments(),
    ) {
        let filter = format!("{}/+/{}", prefix.join("/"), suffix.join("/"));
        let topic = format!("{}/{}/{}", prefix.join("/"), middle, suffix.join("/"));
        prop_assert!(matches(&filter, &topic));
    }

    #[test]
    fn plus_rejects_two_segments(a in segment(), b in segment()) {
        // `+` matches exactly one segment, never two
        let topic = format!("{a}/{b}");
        prop_assert!(!matches("+", &topic));
    }

    #[test]
    fn hash_matches_any_extension(prefix in segments(), extension in segments()) {
        let filter = format!("{}/#", prefix.join("/"));
        let exact = prefix.join("/");
        let extended = format!("{}/{}", exact, extension.join("/"));

        // `#` absorbs zero or more segments, including none
        prop_assert!(matches(&filter, &exact));
        prop_assert!(matches(&filter, &extended));
    }

    #[test]
    fn hash_never_matches_sibling(prefix in segments(), sibling in segment()) {
        prop_assume!(prefix[0] != sibling);
        let filter = format!("{}/#", prefix.join("/"));
        prop_assert!(!matches(&filter, &sibling));
    }

    #[test]
    fn concrete_filters_are_valid_both_ways(segs in segments()) {
        let topic = segs.join("/");
        prop_assert!(validate_filter(&topic).is_ok());
        prop_assert!(validate_publish_topic(&topic).is_ok());
    }

    #[test]
    fn wildcard_filters_are_never_publish_topics(
        prefix in segments(),
        wildcard in prop::sample::select(vec!["+", "#"]),
    ) {
        let filter = format!("{}/{}", prefix.join("/"), wildcard);
        prop_assert!(validate_filter(&filter).is_ok());
        prop_assert!(validate_publish_topic(&filter).is_err());
    }

    #[test]
    fn matching_requires_equal_depth_without_hash(
        filter_segs in segments(),
        topic_segs in segments(),
    ) {
        prop_assume!(filter_segs.len() != topic_segs.len());
        // Without `#`, a filter only matches topics of the same depth
        let filter = filter_segs
            .iter()
            .map(|_| "+")
            .collect::<Vec<_>>()
            .join("/");
        prop_assert!(!matches(&filter, &topic_segs.join("/")));
    }
}
