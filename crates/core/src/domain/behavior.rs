use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::{CategoryId, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Behavior event kinds, ordered by how strong a preference signal each
/// one carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    View,
    Click,
    AddToCart,
    Purchase,
    Rate,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::View => "view",
            BehaviorKind::Click => "click",
            BehaviorKind::AddToCart => "add_to_cart",
            BehaviorKind::Purchase => "purchase",
            BehaviorKind::Rate => "rate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(BehaviorKind::View),
            "click" => Some(BehaviorKind::Click),
            "add_to_cart" => Some(BehaviorKind::AddToCart),
            "purchase" => Some(BehaviorKind::Purchase),
            "rate" => Some(BehaviorKind::Rate),
            _ => None,
        }
    }

    /// Relative preference strength, used to keep the strongest kind on
    /// the (user, product) aggregate.
    pub fn strength(&self) -> u8 {
        match self {
            BehaviorKind::View => 1,
            BehaviorKind::Click => 2,
            BehaviorKind::AddToCart => 3,
            BehaviorKind::Rate => 4,
            BehaviorKind::Purchase => 5,
        }
    }
}

/// Raw ingestion event from the serving layer; the stream feeding the
/// interaction matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub id: String,
    pub user_id: Option<UserId>,
    pub session_id: String,
    pub product_id: ProductId,
    pub category_id: Option<CategoryId>,
    pub kind: BehaviorKind,
    /// Only meaningful for `Rate` events; 0-5 scale.
    pub rating: Option<f64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

/// (user, product) aggregate consumed by the collaborative strategies.
/// `interaction_count` is monotone until an explicit reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProductInteraction {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub interaction_type: BehaviorKind,
    pub rating: Option<f64>,
    pub interaction_count: u64,
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl UserProductInteraction {
    /// First event for a (user, product) pair opens the aggregate.
    pub fn open(event: &BehaviorEvent, user_id: UserId) -> Self {
        Self {
            user_id,
            product_id: event.product_id.clone(),
            interaction_type: event.kind,
            rating: event.rating,
            interaction_count: 1,
            first_interaction: event.occurred_at,
            last_interaction: event.occurred_at,
        }
    }

    /// Fold a subsequent event into the aggregate: bump the count,
    /// refresh the last-seen timestamp, overwrite the rating only when
    /// the event carries one, keep the strongest kind observed.
    pub fn absorb(&mut self, event: &BehaviorEvent) {
        self.interaction_count += 1;
        if event.occurred_at > self.last_interaction {
            self.last_interaction = event.occurred_at;
        }
        if event.rating.is_some() {
            self.rating = event.rating;
        }
        if event.kind.strength() > self.interaction_type.strength() {
            self.interaction_type = event.kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{BehaviorEvent, BehaviorKind, UserId, UserProductInteraction};
    use crate::domain::product::ProductId;

    fn event(kind: BehaviorKind, rating: Option<f64>) -> BehaviorEvent {
        BehaviorEvent {
            id: "evt-1".to_string(),
            user_id: Some(UserId("u1".to_string())),
            session_id: "sess-1".to_string(),
            product_id: ProductId("p1".to_string()),
            category_id: None,
            kind,
            rating,
            metadata: serde_json::Map::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn repeated_views_accumulate_and_keep_first_seen() {
        let first = event(BehaviorKind::View, None);
        let mut aggregate = UserProductInteraction::open(&first, UserId("u1".to_string()));

        let mut second = event(BehaviorKind::View, None);
        second.occurred_at = first.occurred_at + Duration::seconds(90);
        aggregate.absorb(&second);

        assert_eq!(aggregate.interaction_count, 2);
        assert_eq!(aggregate.first_interaction, first.occurred_at);
        assert_eq!(aggregate.last_interaction, second.occurred_at);
    }

    #[test]
    fn rating_is_overwritten_only_when_present() {
        let first = event(BehaviorKind::Rate, Some(4.0));
        let mut aggregate = UserProductInteraction::open(&first, UserId("u1".to_string()));

        aggregate.absorb(&event(BehaviorKind::View, None));
        assert_eq!(aggregate.rating, Some(4.0));

        aggregate.absorb(&event(BehaviorKind::Rate, Some(2.5)));
        assert_eq!(aggregate.rating, Some(2.5));
    }

    #[test]
    fn strongest_interaction_kind_wins() {
        let first = event(BehaviorKind::View, None);
        let mut aggregate = UserProductInteraction::open(&first, UserId("u1".to_string()));

        aggregate.absorb(&event(BehaviorKind::Purchase, None));
        aggregate.absorb(&event(BehaviorKind::Click, None));

        assert_eq!(aggregate.interaction_type, BehaviorKind::Purchase);
    }
}
