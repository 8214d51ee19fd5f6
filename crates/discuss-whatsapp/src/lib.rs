//! WhatsApp Cloud API channel: outbound transport, webhook payload decoding
//! and request authentication.

pub mod signature;
pub mod transport;
pub mod webhook;

pub use signature::{verify_signature, SignatureError};
pub use transport::CloudApiTransport;
pub use webhook::{VerifyRequest, WebhookPayload};
