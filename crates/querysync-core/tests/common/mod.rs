#![allow(dead_code)]
use querysync_core::{KeyFilter, KeyParams, QueryKey, build_key};

/// Keys of a profile screen: two post feeds, a follow toggle, a tag list.
pub fn profile_keys() -> Vec<QueryKey> {
    vec![
        build_key("userPosts", &KeyParams::new().with("userId", 7).with("postType", "archive")),
        build_key("userPosts", &KeyParams::new().with("userId", 7).with("postType", "liked")),
        build_key("userPosts", &KeyParams::new().with("userId", 8).with("postType", "archive")),
        QueryKey::new("follow").with(7),
        QueryKey::new("tags"),
    ]
}

/// Display forms of the keys selected by `filter`, in input order.
pub fn selected(keys: &[QueryKey], filter: &KeyFilter) -> Vec<String> {
    keys.iter()
        .filter(|key| filter.matches(key))
        .map(ToString::to_string)
        .collect()
}
