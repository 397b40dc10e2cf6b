//! The REST seam between the message store and the server

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{MessageDetail, MessageId, MessageSummary};

/// Operations the inbox needs from the mail-trap server.
///
/// [`crate::MailtrapClient`] talks HTTP; tests substitute in-memory fakes.
#[async_trait]
pub trait MailApi: Send + Sync {
    /// `GET /messages/`
    async fn list_messages(&self) -> ClientResult<Vec<MessageSummary>>;

    /// `GET /messages/{id}.json`
    async fn get_message(&self, id: &MessageId) -> ClientResult<MessageDetail>;

    /// `DELETE /messages/{id}`
    async fn delete_message(&self, id: &MessageId) -> ClientResult<()>;

    /// `DELETE /messages/`
    async fn delete_messages(&self) -> ClientResult<()>;

    /// `DELETE /` - asks the server process to terminate
    async fn terminate(&self) -> ClientResult<()>;
}
