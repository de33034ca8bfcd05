//! Deterministic cache key derivation.
//!
//! A key pins down the full request shape: block, optional user and
//! product subjects, context type, and a digest of the context payload.
//! Identical inputs must always produce the identical string so that
//! concurrent workers agree on cache rows.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::ranking::types::RequestContext;

const SEPARATOR: &str = "|";

/// Hex digest over the canonical JSON form of the context payload.
/// `BTreeMap` keys serialize in sorted order, so logically-equal maps
/// digest identically. Returns `None` for an empty payload.
pub fn context_digest(data: &BTreeMap<String, serde_json::Value>) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let canonical = serde_json::to_string(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Some(format!("{:x}", hasher.finalize())[..16].to_string())
}

/// Derive the cache key for a block + request pair, omitting absent
/// components.
pub fn derive(block_name: &str, request: &RequestContext) -> String {
    let mut parts = vec![block_name.to_string()];

    if let Some(user_id) = &request.user_id {
        parts.push(format!("user:{user_id}"));
    }
    if let Some(product_id) = &request.product_id {
        parts.push(format!("product:{product_id}"));
    }
    if let Some(context_type) = &request.context_type {
        parts.push(format!("context:{context_type}"));
    }
    if let Some(digest) = context_digest(&request.context_data) {
        parts.push(format!("data:{digest}"));
    }

    parts.join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{context_digest, derive};
    use crate::domain::behavior::UserId;
    use crate::domain::product::ProductId;
    use crate::ranking::types::RequestContext;

    fn request() -> RequestContext {
        RequestContext::new(Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap())
    }

    #[test]
    fn bare_block_key_is_just_the_block_name() {
        assert_eq!(derive("related-products", &request()), "related-products");
    }

    #[test]
    fn all_components_join_in_fixed_order() {
        let ctx = request()
            .with_user(UserId("u42".to_string()))
            .with_product(ProductId("p7".to_string()))
            .with_context_type("category_page")
            .with_context_value("category", json!("audio"));

        let key = derive("related-products", &ctx);
        assert!(key.starts_with("related-products|user:u42|product:p7|context:category_page|data:"));
    }

    #[test]
    fn identical_requests_derive_identical_keys() {
        let build = || {
            request()
                .with_user(UserId("u42".to_string()))
                .with_context_type("search")
                .with_context_value("query", json!("headphones"))
                .with_context_value("page", json!(2))
        };

        assert_eq!(derive("search-related", &build()), derive("search-related", &build()));
    }

    #[test]
    fn context_data_changes_change_the_key() {
        let base = request()
            .with_context_type("search")
            .with_context_value("query", json!("headphones"));
        let altered = request()
            .with_context_type("search")
            .with_context_value("query", json!("headphones"))
            .with_context_value("page", json!(2));

        assert_ne!(derive("search-related", &base), derive("search-related", &altered));
    }

    #[test]
    fn context_insertion_order_does_not_matter() {
        let forward = request()
            .with_context_value("a", json!(1))
            .with_context_value("b", json!(2));
        let backward = request()
            .with_context_value("b", json!(2))
            .with_context_value("a", json!(1));

        assert_eq!(derive("b1", &forward), derive("b1", &backward));
    }

    #[test]
    fn empty_context_has_no_digest() {
        assert_eq!(context_digest(&Default::default()), None);
    }
}
