use std::collections::HashMap;
use std::sync::RwLock;

use storefront_cart::Cart;
use storefront_core::{AggregateRoot, ExpectedVersion, UserId};

use super::r#trait::{CartStore, CartStoreError};

/// In-memory cart store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<UserId, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError> {
        let carts = self
            .carts
            .read()
            .map_err(|_| CartStoreError::Storage("lock poisoned".to_string()))?;

        Ok(carts.get(&user_id).cloned())
    }

    async fn load_or_create(&self, user_id: UserId) -> Result<Cart, CartStoreError> {
        let mut carts = self
            .carts
            .write()
            .map_err(|_| CartStoreError::Storage("lock poisoned".to_string()))?;

        let cart = carts.entry(user_id).or_insert_with(|| {
            let mut cart = Cart::new(user_id);
            cart.set_version(1);
            cart
        });

        Ok(cart.clone())
    }

    async fn save(
        &self,
        cart: &mut Cart,
        expected: ExpectedVersion,
    ) -> Result<u64, CartStoreError> {
        let mut carts = self
            .carts
            .write()
            .map_err(|_| CartStoreError::Storage("lock poisoned".to_string()))?;

        // A vanished row is a form of lost race; the caller's retry recreates it.
        let current = match carts.get(&cart.user_id()) {
            Some(stored) => stored.version(),
            None => {
                return Err(CartStoreError::Conflict(format!(
                    "no cart row for user {}",
                    cart.user_id()
                )));
            }
        };

        if !expected.matches(current) {
            return Err(CartStoreError::Conflict(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        let next = current + 1;
        cart.set_version(next);
        carts.insert(cart.user_id(), cart.clone());

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_returns_none_for_unknown_user() {
        let store = InMemoryCartStore::new();
        assert!(store.load(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_or_create_persists_an_empty_cart_at_version_one() {
        let store = InMemoryCartStore::new();
        let user_id = UserId::new();

        let cart = store.load_or_create(user_id).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.version(), 1);

        // A second call finds the same cart instead of minting a new id.
        let again = store.load_or_create(user_id).await.unwrap();
        assert_eq!(again.id_typed(), cart.id_typed());
        assert_eq!(store.load(user_id).await.unwrap().unwrap().version(), 1);
    }

    #[tokio::test]
    async fn save_bumps_the_version_on_match() {
        let store = InMemoryCartStore::new();
        let user_id = UserId::new();
        let mut cart = store.load_or_create(user_id).await.unwrap();

        let v = store
            .save(&mut cart, ExpectedVersion::Exact(1))
            .await
            .unwrap();

        assert_eq!(v, 2);
        assert_eq!(cart.version(), 2);
        assert_eq!(store.load(user_id).await.unwrap().unwrap().version(), 2);
    }

    #[tokio::test]
    async fn save_with_stale_version_is_a_conflict() {
        let store = InMemoryCartStore::new();
        let user_id = UserId::new();

        let mut first = store.load_or_create(user_id).await.unwrap();
        let mut second = first.clone();

        store
            .save(&mut first, ExpectedVersion::Exact(1))
            .await
            .unwrap();

        let err = store
            .save(&mut second, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CartStoreError::Conflict(_)));

        // The loser's in-memory copy is untouched by the failed save.
        assert_eq!(second.version(), 1);
    }

    #[tokio::test]
    async fn save_any_skips_the_version_check() {
        let store = InMemoryCartStore::new();
        let user_id = UserId::new();

        let mut stale = store.load_or_create(user_id).await.unwrap();
        let mut winner = stale.clone();
        store
            .save(&mut winner, ExpectedVersion::Exact(1))
            .await
            .unwrap();

        let v = store.save(&mut stale, ExpectedVersion::Any).await.unwrap();
        assert_eq!(v, 3);
    }

    #[tokio::test]
    async fn save_without_a_row_is_a_conflict() {
        let store = InMemoryCartStore::new();
        let mut cart = Cart::new(UserId::new());
        cart.set_version(1);

        let err = store
            .save(&mut cart, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CartStoreError::Conflict(_)));
    }
}
