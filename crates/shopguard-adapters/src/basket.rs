use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopguard_core::collaborators::BasketTransfer;
use shopguard_core::error::BasketError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketItem {
    pub catalog_item_id: u32,
    pub unit_price_minor: u64,
    pub quantity: u32,
}

/// Baskets keyed by buyer id, which is either an anonymous id or an account identity.
#[derive(Debug, Default)]
pub struct InMemoryBasketService {
    baskets: RwLock<HashMap<String, Vec<BasketItem>>>,
}

impl InMemoryBasketService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item` to the buyer's basket, merging quantities per catalog item.
    pub async fn add_item(&self, buyer_id: &str, item: BasketItem) {
        let mut baskets = self.baskets.write().await;
        merge_item(baskets.entry(buyer_id.to_string()).or_default(), item);
    }

    pub async fn items(&self, buyer_id: &str) -> Vec<BasketItem> {
        self.baskets
            .read()
            .await
            .get(buyer_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn merge_item(items: &mut Vec<BasketItem>, item: BasketItem) {
    match items
        .iter_mut()
        .find(|existing| existing.catalog_item_id == item.catalog_item_id)
    {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
        None => items.push(item),
    }
}

#[async_trait]
impl BasketTransfer for InMemoryBasketService {
    async fn transfer(&self, anonymous_id: &str, identity: &str) -> Result<usize, BasketError> {
        if identity.trim().is_empty() {
            return Err(BasketError::Transfer("identity is required".to_string()));
        }

        let mut baskets = self.baskets.write().await;
        let Some(anonymous) = baskets.remove(anonymous_id) else {
            debug!(anonymous_id, "No anonymous basket to transfer");
            return Ok(0);
        };

        let moved = anonymous.len();
        let target = baskets.entry(identity.to_string()).or_default();
        for item in anonymous {
            merge_item(target, item);
        }
        info!(anonymous_id, identity, items = moved, "Basket transferred");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(catalog_item_id: u32, quantity: u32) -> BasketItem {
        BasketItem {
            catalog_item_id,
            unit_price_minor: 1_250,
            quantity,
        }
    }

    #[tokio::test]
    async fn transfer_merges_into_identity_basket() {
        let service = InMemoryBasketService::new();
        service.add_item("anon-1", item(1, 2)).await;
        service.add_item("anon-1", item(2, 1)).await;
        service.add_item("ada@example.com", item(1, 1)).await;

        assert_eq!(service.transfer("anon-1", "ada@example.com").await.unwrap(), 2);

        let items = service.items("ada@example.com").await;
        assert_eq!(items, vec![item(1, 3), item(2, 1)]);
        assert!(service.items("anon-1").await.is_empty());
    }

    #[tokio::test]
    async fn repeated_transfer_is_a_no_op() {
        let service = InMemoryBasketService::new();
        service.add_item("anon-1", item(7, 1)).await;

        assert_eq!(service.transfer("anon-1", "ada@example.com").await.unwrap(), 1);
        assert_eq!(service.transfer("anon-1", "ada@example.com").await.unwrap(), 0);

        assert_eq!(service.items("ada@example.com").await, vec![item(7, 1)]);
    }
}
