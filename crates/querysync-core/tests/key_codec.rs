mod common;

use std::collections::HashSet;

use common::{profile_keys, selected};
use querysync_core::{KeyFilter, KeyParams, QueryKey, StaticIdentity, build_key, build_key_from, matches};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserPostsParams {
    post_type: &'static str,
    user_id: i64,
    tag: Option<&'static str>,
}

#[test]
fn keys_from_equal_params_are_identical() {
    let a = build_key("userPosts", &KeyParams::new().with("userId", 7).with("postType", "archive"));
    let b = build_key("userPosts", &KeyParams::new().with("postType", "archive").with("userId", 7));

    assert_eq!(a, b);
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(HashSet::from([a.clone(), b]).len(), 1);
    assert_eq!(a.to_string(), "userPosts:{postType=archive,userId=7}");
}

#[test]
fn typed_params_build_the_same_key_as_records() {
    let typed = build_key_from(
        "userPosts",
        &UserPostsParams {
            post_type: "archive",
            user_id: 7,
            tag: None,
        },
    )
    .unwrap();
    let record = build_key(
        "userPosts",
        &KeyParams::new()
            .with("userId", 7)
            .with("postType", "archive")
            .with("tag", Option::<&str>::None),
    );

    assert_eq!(typed, record);
}

#[test]
fn empty_params_collapse_to_the_name() {
    assert_eq!(build_key("tags", &KeyParams::new()), QueryKey::new("tags"));
    assert_eq!(build_key_from("tags", &json!({})).unwrap(), QueryKey::new("tags"));
    assert_eq!(build_key_from("tags", &()).unwrap(), QueryKey::new("tags"));
}

#[test]
fn different_values_never_share_a_key() {
    let seven = build_key("userPosts", &KeyParams::new().with("userId", 7));
    let seven_text = build_key("userPosts", &KeyParams::new().with("userId", "7"));
    let eight = build_key("userPosts", &KeyParams::new().with("userId", 8));

    assert_ne!(seven, eight);
    assert_ne!(seven, seven_text);
}

#[test]
fn viewer_seeding_separates_signed_in_and_anonymous() {
    let params = KeyParams::new().with("userId", 7);
    let signed_in = build_key("profile", &params.clone().with_viewer(&StaticIdentity::new(42)));
    let anonymous = build_key("profile", &params.clone().with_viewer(&StaticIdentity::anonymous()));

    assert_ne!(signed_in, anonymous);
    assert_ne!(anonymous, build_key("profile", &params));
    assert_eq!(signed_in.to_string(), "profile:{userId=7,viewerId=42}");
}

#[test]
fn keys_serialize_as_json_arrays() {
    let key = QueryKey::new("userPosts").with(KeyParams::new().with("userId", 7));

    let encoded = serde_json::to_value(&key).unwrap();
    assert_eq!(encoded, json!(["userPosts", {"userId": 7}]));
    assert_eq!(serde_json::from_value::<QueryKey>(encoded).unwrap(), key);
}

#[test]
fn filters_select_expected_keys() {
    let keys = profile_keys();

    assert_eq!(
        selected(&keys, &KeyFilter::prefix(QueryKey::new("userPosts"))).len(),
        3
    );
    assert_eq!(
        selected(&keys, &KeyFilter::containing("archive")),
        vec![
            "userPosts:{postType=archive,userId=7}",
            "userPosts:{postType=archive,userId=8}",
        ]
    );
    assert_eq!(
        selected(&keys, &KeyFilter::pattern("follow:*").unwrap()),
        vec!["follow:7"]
    );
    assert_eq!(
        selected(&keys, &KeyFilter::exact(QueryKey::new("tags"))),
        vec!["tags"]
    );
    assert_eq!(selected(&keys, &KeyFilter::All).len(), keys.len());
}

#[test]
fn predicate_filters_inspect_segments() {
    let keys = profile_keys();
    let user_seven = KeyFilter::predicate(|key: &QueryKey| {
        key.segments()
            .iter()
            .filter_map(|segment| segment.as_object())
            .any(|params| params.get("userId").and_then(|id| id.as_i64()) == Some(7))
    });

    assert_eq!(selected(&keys, &user_seven).len(), 2);
    assert!(matches(&keys[0], &user_seven));
    assert!(!matches(&keys[3], &user_seven));
}

#[test]
fn invalid_pattern_is_rejected() {
    let err = KeyFilter::pattern("userPosts:[").unwrap_err();
    assert!(err.is_validation());
}
