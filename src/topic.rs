//! Topic filter validation and segment-wise wildcard matching
//!
//! A filter is compared against a topic one `/`-delimited segment at a
//! time: `+` matches exactly one segment, a trailing `#` absorbs zero or
//! more remaining segments. Publish topics must be concrete (no wildcard
//! characters anywhere).

/// Check whether a topic filter matches a concrete topic.
///
/// Assumes the filter has already passed [`validate_filter`]; an invalid
/// filter (e.g. `#` in a non-final position) never matches anything.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_segments = filter.split('/').peekable();
    let mut topic_segments = topic.split('/');

    loop {
        match (filter_segments.next(), topic_segments.next()) {
            (Some("#"), _) => {
                // Only valid as the final segment; absorbs zero or more
                // remaining segments, so `a/#` also matches `a` itself
                return filter_segments.peek().is_none();
            }
            (Some("+"), Some(_)) => continue,
            (Some("+"), None) => return false,
            (Some(expected), Some(actual)) => {
                if expected != actual {
                    return false;
                }
            }
            (Some(_), None) => return false,
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}

/// Validate a subscription filter.
///
/// Rules: non-empty, wildcards must occupy a whole segment, and `#` is
/// only permitted as the final segment. Empty segments (`a//b`) are legal
/// per the MQTT spec and are accepted.
pub fn validate_filter(filter: &str) -> Result<(), String> {
    if filter.is_empty() {
        return Err("filter must not be empty".to_string());
    }

    let segments: Vec<&str> = filter.split('/').collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if segment.contains('#') {
            if *segment != "#" {
                return Err(format!("'#' must occupy a whole segment, got {segment:?}"));
            }
            if i != last {
                return Err("'#' is only valid as the final segment".to_string());
            }
        }
        if segment.contains('+') && *segment != "+" {
            return Err(format!("'+' must occupy a whole segment, got {segment:?}"));
        }
    }

    Ok(())
}

/// Validate a publish topic: non-empty and free of wildcard characters.
pub fn validate_publish_topic(topic: &str) -> Result<(), String> {
    if topic.is_empty() {
        return Err("topic must not be empty".to_string());
    }
    if topic.contains('+') || topic.contains('#') {
        return Err("publish topics must not contain wildcards".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("sdk/test/js", "sdk/test/js"));
        assert!(!matches("sdk/test/js", "sdk/test/python"));
        assert!(!matches("sdk/test/js", "sdk/test"));
        assert!(!matches("sdk/test", "sdk/test/js"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(matches("sdk/+/js", "sdk/test/js"));
        assert!(!matches("sdk/+/js", "sdk/test/python"));
        assert!(!matches("sdk/+/js", "sdk/a/b/js"));
        assert!(matches("+/+/+", "a/b/c"));
        assert!(!matches("+/+/+", "a/b"));
    }

    #[test]
    fn test_plus_matches_exactly_one_segment() {
        assert!(matches("+", "sensors"));
        assert!(!matches("+", "sensors/temp"));
        assert!(matches("sensors/+", "sensors/temp"));
        assert!(!matches("sensors/+", "sensors"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(matches("sdk/#", "sdk/test/js"));
        assert!(matches("sdk/#", "sdk/test"));
        assert!(matches("sdk/#", "sdk"));
        assert!(matches("#", "anything/at/all"));
        assert!(!matches("sdk/#", "other/test"));
    }

    #[test]
    fn test_empty_segments() {
        assert!(matches("a//b", "a//b"));
        assert!(!matches("a//b", "a/b"));
        assert!(matches("a/+/b", "a//b"));
    }

    #[test]
    fn test_invalid_filter_never_matches() {
        // `#` in a non-final position is rejected by validation and
        // must not match either
        assert!(!matches("a/#/b", "a/x/b"));
    }

    #[test]
    fn test_validate_filter() {
        assert!(validate_filter("sdk/test/js").is_ok());
        assert!(validate_filter("sdk/+/js").is_ok());
        assert!(validate_filter("sdk/#").is_ok());
        assert!(validate_filter("#").is_ok());
        assert!(validate_filter("+").is_ok());
        assert!(validate_filter("a//b").is_ok());

        assert!(validate_filter("").is_err());
        assert!(validate_filter("a/#/b").is_err());
        assert!(validate_filter("a/b#").is_err());
        assert!(validate_filter("a/b+/c").is_err());
        assert!(validate_filter("sport/tennis#").is_err());
    }

    #[test]
    fn test_validate_publish_topic() {
        assert!(validate_publish_topic("sdk/test/js").is_ok());
        assert!(validate_publish_topic("").is_err());
        assert!(validate_publish_topic("sdk/+/js").is_err());
        assert!(validate_publish_topic("sdk/#").is_err());
    }
}
