use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Cart, CartItem},
    repositories::{ProductRepo, VariantRepo},
};

pub const CART_COOKIE: &str = "atelier_cart";
const CART_TTL_DAYS: i64 = 7;

/// Per-line quantity cap; keeps a single cart line from draining a variant.
pub const MAX_CART_ITEM_QTY: u32 = 10;

/// Cart mutations. The cart itself lives in a signed cookie on the customer's
/// browser; this service validates mutations against the live catalog and
/// keeps the derived subtotal consistent.
#[derive(Clone)]
pub struct CartService {
    products: ProductRepo,
    variants: VariantRepo,
}

impl CartService {
    pub fn new(products: ProductRepo, variants: VariantRepo) -> Self {
        Self { products, variants }
    }

    /// Reads the cart from the signed jar; a missing or unparseable cookie
    /// yields an empty cart rather than an error.
    pub fn read(jar: &SignedCookieJar) -> Cart {
        jar.get(CART_COOKIE)
            .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
            .unwrap_or_default()
    }

    /// Serializes the cart back into the jar.
    pub fn write(jar: SignedCookieJar, cart: &Cart) -> Result<SignedCookieJar, ServiceError> {
        let value = serde_json::to_string(cart)
            .map_err(|e| ServiceError::InternalError(format!("cart serialization: {e}")))?;
        let cookie = Cookie::build((CART_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::days(CART_TTL_DAYS))
            .build();
        Ok(jar.add(cookie))
    }

    pub fn clear(jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build((CART_COOKIE, "")).path("/").build())
    }

    /// Adds `qty` of a variant, merging into an existing line for the same
    /// variant. The line snapshot (name, price, image) is taken from the
    /// current catalog at add time.
    #[instrument(skip(self, cart), fields(product_id = %product_id, variant_id = %variant_id, qty))]
    pub async fn add_item(
        &self,
        cart: &mut Cart,
        product_id: Uuid,
        variant_id: Uuid,
        qty: u32,
    ) -> Result<(), ServiceError> {
        if qty == 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let product = self
            .products
            .find(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let variant = self
            .variants
            .find(variant_id)
            .await?
            .map(|f| f.variant)
            .filter(|v| v.product_id == product_id && v.active)
            .ok_or_else(|| ServiceError::NotFound("Variant not found".to_string()))?;

        if variant.stock <= 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "{} is out of stock",
                product.name
            )));
        }

        let existing_qty = cart
            .items
            .iter()
            .find(|item| item.variant_id == variant_id)
            .map(|item| item.qty)
            .unwrap_or(0);
        let new_qty = existing_qty.saturating_add(qty);
        if new_qty > MAX_CART_ITEM_QTY {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity is limited to {MAX_CART_ITEM_QTY} per item"
            )));
        }
        if i64::from(new_qty) > variant.stock {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {} available",
                variant.stock, product.name
            )));
        }

        match cart
            .items
            .iter_mut()
            .find(|item| item.variant_id == variant_id)
        {
            Some(line) => line.qty = new_qty,
            None => cart.items.push(CartItem {
                product_id,
                variant_id,
                sku: product.sku.clone(),
                name: product.name.clone(),
                size: variant.size.clone(),
                color: variant.color.clone(),
                qty: new_qty,
                unit_price: product.price,
                image: product.images.first().cloned().unwrap_or_default(),
            }),
        }
        recompute(cart);
        Ok(())
    }

    /// Sets the quantity of an existing line; zero removes it. The new
    /// quantity is checked against current stock, same as adding.
    pub async fn update_qty(
        &self,
        cart: &mut Cart,
        variant_id: Uuid,
        qty: u32,
    ) -> Result<(), ServiceError> {
        if qty > MAX_CART_ITEM_QTY {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity is limited to {MAX_CART_ITEM_QTY} per item"
            )));
        }
        if qty == 0 {
            Self::remove_item(cart, variant_id);
            return Ok(());
        }
        let name = cart
            .items
            .iter()
            .find(|item| item.variant_id == variant_id)
            .map(|item| item.name.clone())
            .ok_or_else(|| ServiceError::NotFound("Item not in cart".to_string()))?;
        let variant = self
            .variants
            .find(variant_id)
            .await?
            .map(|f| f.variant)
            .filter(|v| v.active)
            .ok_or_else(|| ServiceError::NotFound("Variant not found".to_string()))?;
        if i64::from(qty) > variant.stock {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {name} available",
                variant.stock
            )));
        }
        if let Some(line) = cart
            .items
            .iter_mut()
            .find(|item| item.variant_id == variant_id)
        {
            line.qty = qty;
        }
        recompute(cart);
        Ok(())
    }

    pub fn remove_item(cart: &mut Cart, variant_id: Uuid) {
        cart.items.retain(|item| item.variant_id != variant_id);
        recompute(cart);
    }
}

fn recompute(cart: &mut Cart) {
    cart.subtotal = cart
        .items
        .iter()
        .map(|item| item.unit_price * i64::from(item.qty))
        .sum();
}
