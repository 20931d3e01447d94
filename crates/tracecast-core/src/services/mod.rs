//! Service layer.
//!
//! Services orchestrate ports; they hold an `Arc<dyn Port>` and carry no
//! runtime machinery of their own.

mod preference_service;

pub use preference_service::PreferenceService;
