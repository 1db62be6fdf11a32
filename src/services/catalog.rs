use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Category, Product, ProductWithVariants, Variant},
    repositories::{ProductRepo, VariantRepo},
};

/// Catalog reads and admin catalog writes. Products are never hard-deleted;
/// deactivation keeps historical order items resolvable.
#[derive(Clone)]
pub struct CatalogService {
    products: ProductRepo,
    variants: VariantRepo,
}

impl CatalogService {
    pub fn new(products: ProductRepo, variants: VariantRepo) -> Self {
        Self { products, variants }
    }

    /// Storefront listing: active products (optionally one category, with an
    /// optional case-insensitive name/description search) and their active
    /// variants attached.
    pub async fn list_active(
        &self,
        category: Option<Category>,
        search: Option<&str>,
    ) -> Result<Vec<ProductWithVariants>, ServiceError> {
        let products = self.products.list_active().await?;
        let variants = self.variants.list_all().await?;
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());
        Ok(products
            .into_iter()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .filter(|p| {
                needle.as_deref().map_or(true, |needle| {
                    p.name.to_lowercase().contains(needle)
                        || p.description.to_lowercase().contains(needle)
                })
            })
            .map(|product| {
                let variants = variants
                    .iter()
                    .filter(|v| v.product_id == product.id && v.active)
                    .cloned()
                    .collect();
                ProductWithVariants { product, variants }
            })
            .collect())
    }

    /// Admin listing: everything, inactive included.
    pub async fn list_all(&self) -> Result<Vec<ProductWithVariants>, ServiceError> {
        let products = self.products.list_all().await?;
        let variants = self.variants.list_all().await?;
        Ok(products
            .into_iter()
            .map(|product| {
                let variants = variants
                    .iter()
                    .filter(|v| v.product_id == product.id)
                    .cloned()
                    .collect();
                ProductWithVariants { product, variants }
            })
            .collect())
    }

    pub async fn get(&self, product_id: Uuid) -> Result<ProductWithVariants, ServiceError> {
        let product = self
            .products
            .find(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;
        let variants = self.variants.list_for_product(product_id).await?;
        Ok(ProductWithVariants { product, variants })
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn create_product(&self, product: Product) -> Result<Product, ServiceError> {
        self.products.insert(&product).await?;
        Ok(product)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn update_product(&self, mut product: Product) -> Result<Product, ServiceError> {
        product.updated_at = Utc::now();
        self.products.update(&product).await
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.id))]
    pub async fn create_variant(&self, variant: Variant) -> Result<Variant, ServiceError> {
        // The parent must exist so the variant is reachable from a listing.
        self.products
            .find(variant.product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", variant.product_id))
            })?;
        self.variants.insert(&variant).await?;
        Ok(variant)
    }

    /// Admin override: rewrites the variant row outright, including an
    /// absolute stock figure. Customer-driven stock changes never come
    /// through here.
    #[instrument(skip(self, variant), fields(variant_id = %variant.id))]
    pub async fn update_variant(&self, mut variant: Variant) -> Result<Variant, ServiceError> {
        if variant.stock < 0 {
            return Err(ServiceError::InvalidInput(
                "Stock cannot be negative".to_string(),
            ));
        }
        variant.updated_at = Utc::now();
        self.variants.update(&variant).await?;
        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRowStore;
    use std::sync::Arc;

    fn service() -> CatalogService {
        let store = Arc::new(MemoryRowStore::new());
        CatalogService::new(ProductRepo::new(store.clone()), VariantRepo::new(store))
    }

    fn product(category: Category, active: bool) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku: "SKU".into(),
            category,
            name: "Item".into(),
            description: String::new(),
            price: 9900,
            images: vec![],
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn active_listing_filters_category_and_inactive() {
        let service = service();
        service.create_product(product(Category::Handbags, true)).await.unwrap();
        service.create_product(product(Category::Shoes, true)).await.unwrap();
        service.create_product(product(Category::Shoes, false)).await.unwrap();

        let shoes = service
            .list_active(Some(Category::Shoes), None)
            .await
            .unwrap();
        assert_eq!(shoes.len(), 1);
        let all = service.list_active(None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let admin = service.list_all().await.unwrap();
        assert_eq!(admin.len(), 3);
    }

    #[tokio::test]
    async fn search_matches_name_and_description_case_insensitively() {
        let service = service();
        let mut tote = product(Category::Handbags, true);
        tote.name = "Leather Tote".into();
        tote.description = "Full-grain".into();
        let mut pump = product(Category::Shoes, true);
        pump.name = "Suede Pump".into();
        pump.description = "Block heel".into();
        service.create_product(tote).await.unwrap();
        service.create_product(pump).await.unwrap();

        let by_name = service.list_active(None, Some("TOTE")).await.unwrap();
        assert_eq!(by_name.len(), 1);
        let by_description = service.list_active(None, Some("heel")).await.unwrap();
        assert_eq!(by_description[0].product.name, "Suede Pump");
        let none = service.list_active(None, Some("clutch")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn variant_requires_existing_product() {
        let service = service();
        let orphan = Variant {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            size: "40".into(),
            color: "Red".into(),
            stock: 3,
            low_stock_threshold: 1,
            active: true,
            updated_at: Utc::now(),
        };
        let err = service.create_variant(orphan).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn negative_stock_is_rejected() {
        let service = service();
        let parent = product(Category::Shoes, true);
        service.create_product(parent.clone()).await.unwrap();
        let mut variant = Variant {
            id: Uuid::new_v4(),
            product_id: parent.id,
            size: "40".into(),
            color: "Red".into(),
            stock: 3,
            low_stock_threshold: 1,
            active: true,
            updated_at: Utc::now(),
        };
        service.create_variant(variant.clone()).await.unwrap();
        variant.stock = -1;
        let err = service.update_variant(variant).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
