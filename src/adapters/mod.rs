//! Adapters connecting the domain to the outside world: the HTTP API,
//! file storage, notification dispatch, and outbound webhooks.

pub mod api_handler;
pub mod file_storage;
pub mod notifier;
pub mod webhook;
