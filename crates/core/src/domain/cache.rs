use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::behavior::UserId;
use super::block::BlockId;
use super::product::ProductId;
use crate::ranking::types::{RankedProduct, RequestContext};

/// One stored recommendation result. Created on a miss, read on hits
/// (which bump `hit_count`), dead once `expires_at` passes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub block_id: BlockId,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub context_type: Option<String>,
    pub context_data: BTreeMap<String, serde_json::Value>,
    pub payload: Vec<RankedProduct>,
    pub hit_count: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build a fresh entry for a request's result.
    pub fn for_request(
        cache_key: String,
        block_id: BlockId,
        request: &RequestContext,
        payload: Vec<RankedProduct>,
        ttl_secs: u32,
    ) -> Self {
        Self {
            cache_key,
            block_id,
            user_id: request.user_id.clone(),
            product_id: request.product_id.clone(),
            context_type: request.context_type.clone(),
            context_data: request.context_data.clone(),
            payload,
            hit_count: 0,
            expires_at: request.now + Duration::seconds(i64::from(ttl_secs)),
            created_at: request.now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
