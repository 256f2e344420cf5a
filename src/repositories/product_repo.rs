use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::product::Product;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("SKU already registered: {0}")]
    DuplicateSku(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Local product store. The reconciliation core reads through this and never
/// owns the storage behind it.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    async fn list(&self) -> Result<Vec<Product>>;

    /// Insert or replace by id. A second product may not take an existing SKU.
    async fn save(&self, product: &Product) -> Result<()>;
}

/// Process-local repository backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            products: RwLock::new(products),
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .values()
            .find(|p| p.sku == sku)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.products.read().await.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn save(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;

        if products
            .values()
            .any(|existing| existing.sku == product.sku && existing.id != product.id)
        {
            return Err(RepositoryError::DuplicateSku(product.sku.clone()));
        }

        products.insert(product.id, product.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = InMemoryProductRepository::new();
        let product = Product::new("SKU-1", "Widget", Decimal::ONE);

        repo.save(&product).await.unwrap();

        assert_eq!(repo.find_by_id(product.id).await.unwrap(), Some(product.clone()));
        assert_eq!(repo.find_by_sku("SKU-1").await.unwrap(), Some(product));
        assert_eq!(repo.find_by_sku("SKU-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let repo = InMemoryProductRepository::new();
        repo.save(&Product::new("SKU-1", "Widget", Decimal::ONE)).await.unwrap();

        let err = repo
            .save(&Product::new("SKU-1", "Other", Decimal::ONE))
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::DuplicateSku("SKU-1".to_string()));
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_sku() {
        let repo = InMemoryProductRepository::with_products([
            Product::new("SKU-B", "B", Decimal::ONE),
            Product::new("SKU-A", "A", Decimal::ONE),
        ]);

        let skus: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.sku).collect();
        assert_eq!(skus, vec!["SKU-A", "SKU-B"]);
    }
}
