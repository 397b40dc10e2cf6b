//! In-memory server and notifier used by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;
use trapline_client::{
    ClientError, ClientResult, MailApi, MessageDetail, MessageId, MessageSummary, Recipients,
};

use crate::notifications::{MessageNotification, NotificationHandle, Notifier, Permission};
use crate::CoreResult;

pub fn summary(id: u64, subject: &str) -> MessageSummary {
    MessageSummary {
        id: MessageId::from(id),
        sender: format!("sender{}@example.com", id),
        recipients: Recipients {
            to: vec![format!("rcpt{}@example.com", id)],
            ..Recipients::default()
        },
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, id as u32 % 60).unwrap(),
        subject: subject.to_string(),
        size: 100 + id,
    }
}

pub fn detail(id: u64, subject: &str) -> MessageDetail {
    MessageDetail {
        summary: summary(id, subject),
        href: format!("http://trap/messages/{}.eml", id),
        formats: [("plain".to_string(), format!("http://trap/messages/{}.plain", id))]
            .into_iter()
            .collect(),
        attachments: Vec::new(),
    }
}

fn unavailable() -> ClientError {
    ClientError::ApiError {
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// Scriptable stand-in for the mail-trap server
#[derive(Default)]
pub struct FakeApi {
    list: Mutex<Vec<MessageSummary>>,
    details: Mutex<HashMap<MessageId, MessageDetail>>,
    detail_gates: Mutex<HashMap<MessageId, oneshot::Receiver<()>>>,
    list_gate: Mutex<Option<oneshot::Receiver<()>>>,
    delete_gate: Mutex<Option<oneshot::Receiver<()>>>,
    fail_list: AtomicBool,
    fail_delete: AtomicBool,
    detail_requests: AtomicUsize,
    list_requests: AtomicUsize,
    deleted: Mutex<Vec<MessageId>>,
    cleared: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_list(&self, messages: Vec<MessageSummary>) {
        *self.list.lock().unwrap() = messages;
    }

    pub fn put_detail(&self, detail: MessageDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(detail.summary.id.clone(), detail);
    }

    /// Hold the next detail fetch for `id` until the returned sender fires
    pub fn hold_detail(&self, id: u64) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.detail_gates
            .lock()
            .unwrap()
            .insert(MessageId::from(id), rx);
        tx
    }

    /// Hold the next list fetch until the returned sender fires
    pub fn hold_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.list_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Hold the next delete until the returned sender fires
    pub fn hold_delete(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.delete_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn detail_requests(&self) -> usize {
        self.detail_requests.load(Ordering::SeqCst)
    }

    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailApi for FakeApi {
    async fn list_messages(&self) -> ClientResult<Vec<MessageSummary>> {
        self.list_requests.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.list.lock().unwrap().clone())
    }

    async fn get_message(&self, id: &MessageId) -> ClientResult<MessageDetail> {
        self.detail_requests.fetch_add(1, Ordering::SeqCst);
        let gate = self.detail_gates.lock().unwrap().remove(id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::ApiError {
                status: 404,
                body: "404: message does not exist".to_string(),
            })
    }

    async fn delete_message(&self, id: &MessageId) -> ClientResult<()> {
        let gate = self.delete_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn delete_messages(&self) -> ClientResult<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&self) -> ClientResult<()> {
        Ok(())
    }
}

/// Notifier that records what it was asked to show
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<MessageNotification>>,
    dismissed: Arc<AtomicUsize>,
}

struct CountingHandle(Arc<AtomicUsize>);

impl NotificationHandle for CountingHandle {
    fn dismiss(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shown(&self) -> Vec<MessageNotification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn available(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, notification: &MessageNotification) -> CoreResult<Box<dyn NotificationHandle>> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(Box::new(CountingHandle(self.dismissed.clone())))
    }
}
