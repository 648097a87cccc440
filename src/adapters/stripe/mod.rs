//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port with Stripe Checkout:
//! - Hosted checkout sessions built from locked tickets
//! - Session lookup and expiry
//! - Webhook signature verification
//!
//! # Configuration
//!
//! Read from the `payment` config section:
//! - `SHOWTIME__PAYMENT__STRIPE_API_KEY`: Stripe secret API key
//! - `SHOWTIME__PAYMENT__STRIPE_WEBHOOK_SECRET`: Webhook signing secret (whsec_...)

mod mock_payment_gateway;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway, MOCK_WEBHOOK_SECRET};
pub use stripe_adapter::{StripeConfig, StripeGatewayAdapter};
pub use webhook_types::{StripeCheckoutSession, StripeWebhookEvent};
