//! Transport layer for Trapline
//!
//! REST access to the mail-trap server plus the live event stream,
//! decoded into typed events at this boundary.

pub mod api;
pub mod client;
pub mod error;
pub mod events;
pub mod stream;
pub mod types;

pub use api::MailApi;
pub use client::{ClientConfig, MailtrapClient};
pub use error::{ClientError, ClientResult};
pub use events::StreamEvent;
pub use stream::{EventStream, StreamMessage};
pub use types::*;
