//! Business logic. Each service owns one workflow, holds its repositories
//! behind `Arc`, and surfaces failures as [`crate::errors::ServiceError`].

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService};
pub use inventory::InventoryService;
pub use notifications::{Mailer, NoopMailer, NotificationService, ResendMailer};
pub use orders::{NewOrder, NewOrderItem, OrderService};
pub use payments::{
    FlutterwaveGateway, PaymentGateway, PaymentService, WebhookAck,
};
