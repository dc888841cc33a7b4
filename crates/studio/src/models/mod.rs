//! Domain models owned by the studio service.

pub mod settings;

pub use settings::{AdminSettings, PaymentSettings};
