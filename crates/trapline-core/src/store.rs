//! Client-side message cache
//!
//! [`MessageStore`] mirrors the server's inbox: summaries from the list
//! endpoint, details fetched lazily, and changes pushed over the event
//! stream. Every fetch is tagged with the store's generation; a
//! [`MessageStore::clear`] bumps the generation so results of fetches
//! still in flight are dropped instead of applied.
//!
//! The state lives behind a mutex that is never held across an await,
//! so any number of fetches may be outstanding at once.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use trapline_client::{Attachment, MailApi, MessageDetail, MessageId, MessageSummary};
use tracing::{debug, error, info, warn};

use crate::notifications::{MessageNotification, NotificationHandle, Notifier};
use crate::{CoreError, CoreResult};

/// A cached message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub summary: MessageSummary,
    /// Download URL of the raw message, once loaded
    pub href: Option<String>,
    /// Format name to URL, once loaded
    pub formats: BTreeMap<String, String>,
    pub attachments: Vec<Attachment>,
    /// Detail fields are populated
    pub loaded: bool,
    /// A remote delete is pending for this message
    pub deleted: bool,
}

impl Message {
    /// A summary-only record; details load on demand
    pub fn from_summary(summary: MessageSummary) -> Self {
        Self {
            summary,
            href: None,
            formats: BTreeMap::new(),
            attachments: Vec::new(),
            loaded: false,
            deleted: false,
        }
    }

    /// A fully loaded record
    pub fn from_detail(detail: MessageDetail) -> Self {
        let mut message = Self::from_summary(detail.summary.clone());
        message.apply_detail(detail);
        message
    }

    pub fn id(&self) -> &MessageId {
        &self.summary.id
    }

    fn apply_detail(&mut self, detail: MessageDetail) {
        self.href = Some(detail.href);
        self.formats = detail.formats;
        self.attachments = detail.attachments;
        self.loaded = true;
    }

    /// Lower-cased text the inbox filter matches against
    pub fn search_text(&self) -> String {
        let s = &self.summary;
        format!(
            "{} {} {} {} {}",
            s.sender,
            s.recipients.to.join(", "),
            s.subject,
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            s.size
        )
        .to_lowercase()
    }
}

struct Entry {
    message: Message,
    notification: Option<Box<dyn NotificationHandle>>,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<MessageId, Entry>,
    /// Display order, newest first
    order: VecDeque<MessageId>,
    generation: u64,
    /// Lower-cased; empty means no filter
    filter: String,
    selected: Option<MessageId>,
}

impl StoreState {
    fn insert(&mut self, message: Message) -> Option<Message> {
        let id = message.id().clone();
        if self.entries.contains_key(&id) {
            warn!("Message {} already exists", id);
            return None;
        }
        self.order.push_front(id.clone());
        self.entries.insert(
            id,
            Entry {
                message: message.clone(),
                notification: None,
            },
        );
        Some(message)
    }

    fn is_visible(&self, id: &MessageId) -> bool {
        match self.entries.get(id) {
            Some(entry) => {
                self.filter.is_empty() || entry.message.search_text().contains(&self.filter)
            }
            None => false,
        }
    }

    /// Visible and not pending deletion
    fn is_selectable(&self, id: &MessageId) -> bool {
        self.is_visible(id) && self.entries.get(id).is_some_and(|e| !e.message.deleted)
    }

    /// Nearest selectable record after `id`, else before it
    fn neighbor(&self, id: &MessageId) -> Option<MessageId> {
        let pos = self.order.iter().position(|other| other == id)?;
        self.order
            .iter()
            .skip(pos + 1)
            .chain(self.order.iter().take(pos).rev())
            .find(|other| self.is_selectable(other))
            .cloned()
    }

    /// If `id` is selected, move the selection to its neighbor.
    ///
    /// Returns the new selection when it moved.
    fn move_selection_from(&mut self, id: &MessageId) -> Option<Option<MessageId>> {
        if self.selected.as_ref() != Some(id) {
            return None;
        }
        let next = self.neighbor(id);
        debug!("Selection moves from {} to {:?}", id, next);
        self.selected = next.clone();
        Some(next)
    }

    fn apply_filter(&mut self) {
        if let Some(selected) = self.selected.clone() {
            if !self.is_visible(&selected) {
                debug!("Deselecting {} hidden by filter", selected);
                self.selected = None;
            }
        }
    }

    fn visible_ids(&self) -> Vec<MessageId> {
        self.order
            .iter()
            .filter(|id| self.is_visible(id))
            .cloned()
            .collect()
    }
}

/// In-memory inbox synchronized with the mail-trap server
pub struct MessageStore {
    api: Arc<dyn MailApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<StoreState>,
}

impl MessageStore {
    pub fn new(api: Arc<dyn MailApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn filter(&self) -> String {
        self.lock().filter.clone()
    }

    pub fn selected_id(&self) -> Option<MessageId> {
        self.lock().selected.clone()
    }

    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.lock().entries.get(id).map(|e| e.message.clone())
    }

    pub fn get_selected(&self) -> Option<Message> {
        let state = self.lock();
        let id = state.selected.as_ref()?;
        state.entries.get(id).map(|e| e.message.clone())
    }

    /// Messages to display: newest first, filtered
    pub fn visible(&self) -> Vec<Message> {
        let state = self.lock();
        state
            .visible_ids()
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|e| e.message.clone())
            .collect()
    }

    /// Insert a message at the top of the inbox.
    ///
    /// Returns `None` and leaves the existing record untouched if the
    /// id is already cached.
    pub fn add(&self, message: Message) -> Option<Message> {
        self.lock().insert(message)
    }

    /// Drop everything and invalidate fetches in flight.
    ///
    /// Returns the new generation.
    pub fn clear(&self) -> u64 {
        let (generation, handles) = {
            let mut state = self.lock();
            state.generation += 1;
            state.selected = None;
            state.order.clear();
            let handles: Vec<_> = state
                .entries
                .drain()
                .filter_map(|(_, e)| e.notification)
                .collect();
            (state.generation, handles)
        };

        for handle in handles {
            handle.dismiss();
        }
        info!("Message store cleared (generation {})", generation);
        generation
    }

    /// Replace the cache with the server's current message list.
    ///
    /// Returns the number of messages added. On failure the store stays
    /// empty.
    pub async fn load_all(&self) -> CoreResult<usize> {
        let generation = self.clear();
        let result = self.api.list_messages().await;

        let mut state = self.lock();
        let outcome = match result {
            Ok(_) if state.generation != generation => {
                debug!("Discarding message list from generation {}", generation);
                Ok(0)
            }
            Ok(summaries) => {
                let added = summaries
                    .into_iter()
                    .filter_map(|s| state.insert(Message::from_summary(s)))
                    .count();
                info!("Loaded {} messages", added);
                Ok(added)
            }
            Err(e) => {
                error!("Failed to load messages: {}", e);
                Err(e.into())
            }
        };
        state.apply_filter();
        outcome
    }

    /// Fetch and insert a message announced by the server.
    ///
    /// Returns `None` if the message was already cached or the store was
    /// cleared while fetching.
    pub async fn remote_add(&self, id: &MessageId, notify: bool) -> CoreResult<Option<Message>> {
        let generation = {
            let state = self.lock();
            if state.entries.contains_key(id) {
                warn!("Message {} already exists", id);
                return Ok(None);
            }
            state.generation
        };

        let detail = self.api.get_message(id).await?;

        let inserted = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("Dropping stale message {} from generation {}", id, generation);
                return Ok(None);
            }
            let inserted = state.insert(Message::from_detail(detail));
            state.apply_filter();
            inserted
        };

        if let (Some(message), true) = (&inserted, notify) {
            self.notify(message);
        }
        Ok(inserted)
    }

    fn notify(&self, message: &Message) {
        let notification = MessageNotification::for_message(&message.summary);
        let handle = match self.notifier.show(&notification) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Could not show notification for {}: {}", message.id(), e);
                return;
            }
        };

        let orphan = {
            let mut state = self.lock();
            match state.entries.get_mut(message.id()) {
                Some(entry) => entry.notification.replace(handle),
                None => Some(handle),
            }
        };
        if let Some(orphan) = orphan {
            orphan.dismiss();
        }
    }

    /// Remove a message locally.
    ///
    /// A selected message hands the selection to its nearest neighbor.
    pub fn delete(&self, id: &MessageId) -> Option<Message> {
        let entry = {
            let mut state = self.lock();
            if !state.entries.contains_key(id) {
                return None;
            }
            state.move_selection_from(id);
            state.order.retain(|other| other != id);
            state.entries.remove(id)
        }?;

        if let Some(handle) = entry.notification {
            handle.dismiss();
        }
        debug!("Deleted message {} locally", id);
        Some(entry.message)
    }

    /// Delete a message on the server, optimistically.
    ///
    /// The message is marked deleted and loses the selection right away.
    /// If the server refuses, the mark is removed again and, if the
    /// selection still sits where the delete moved it, it returns to the
    /// message. Returns `false` if a delete is already pending.
    pub async fn delete_remote(&self, id: &MessageId) -> CoreResult<bool> {
        let (handle, moved_to, generation) = {
            let mut state = self.lock();
            let generation = state.generation;
            let entry = state
                .entries
                .get_mut(id)
                .ok_or_else(|| CoreError::MessageNotFound(id.to_string()))?;
            if entry.message.deleted {
                debug!("Delete of {} already pending", id);
                return Ok(false);
            }
            entry.message.deleted = true;
            let handle = entry.notification.take();
            (handle, state.move_selection_from(id), generation)
        };

        if let Some(handle) = handle {
            handle.dismiss();
        }

        match self.api.delete_message(id).await {
            Ok(()) => {
                info!("Deleted message {} on server", id);
                Ok(true)
            }
            Err(e) => {
                warn!("Deleting message {} failed, restoring it: {}", id, e);
                let mut state = self.lock();
                if state.generation != generation {
                    debug!("Store cleared while deleting {}; nothing to restore", id);
                    return Err(e.into());
                }
                if let Some(entry) = state.entries.get_mut(id) {
                    entry.message.deleted = false;
                    if let Some(moved_to) = moved_to {
                        if state.selected == moved_to && state.is_visible(id) {
                            state.selected = Some(id.clone());
                        }
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Make sure a message's details are present.
    ///
    /// Returns `None` without touching the store if it was cleared, or
    /// the message removed, while the fetch was in flight.
    pub async fn load(&self, id: &MessageId) -> CoreResult<Option<Message>> {
        let generation = {
            let state = self.lock();
            let entry = state
                .entries
                .get(id)
                .ok_or_else(|| CoreError::MessageNotFound(id.to_string()))?;
            if entry.message.loaded {
                return Ok(Some(entry.message.clone()));
            }
            state.generation
        };

        let detail = self.api.get_message(id).await?;

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Dropping stale details of {} from generation {}", id, generation);
            return Ok(None);
        }
        match state.entries.get_mut(id) {
            Some(entry) => {
                if !entry.message.loaded {
                    entry.message.apply_detail(detail);
                }
                Ok(Some(entry.message.clone()))
            }
            None => {
                debug!("Message {} removed while loading", id);
                Ok(None)
            }
        }
    }

    /// Select a message and load its details.
    ///
    /// The details are returned only if the message is still selected
    /// once they arrive. Messages hidden by the filter or pending
    /// deletion are not selectable.
    pub async fn select(&self, id: &MessageId) -> CoreResult<Option<Message>> {
        let handle = {
            let mut state = self.lock();
            if state.entries.contains_key(id) && !state.is_visible(id) {
                debug!("Ignoring selection of {} hidden by filter", id);
                return Ok(None);
            }
            let entry = state
                .entries
                .get_mut(id)
                .ok_or_else(|| CoreError::MessageNotFound(id.to_string()))?;
            if entry.message.deleted {
                debug!("Ignoring selection of {} pending deletion", id);
                return Ok(None);
            }
            let handle = entry.notification.take();
            state.selected = Some(id.clone());
            handle
        };

        if let Some(handle) = handle {
            handle.dismiss();
        }

        let message = self.load(id).await?;
        let still_selected = self.lock().selected.as_ref() == Some(id);
        Ok(message.filter(|_| still_selected))
    }

    pub fn deselect(&self) {
        self.lock().selected = None;
    }

    /// Select the next visible message, or the first if none is selected
    pub async fn select_next(&self) -> CoreResult<Option<Message>> {
        let target = {
            let state = self.lock();
            let ids = state.visible_ids();
            match &state.selected {
                Some(current) => ids
                    .iter()
                    .skip_while(|id| *id != current)
                    .skip(1)
                    .find(|id| state.is_selectable(id))
                    .cloned(),
                None => ids.into_iter().find(|id| state.is_selectable(id)),
            }
        };
        self.select_target(target).await
    }

    /// Select the previous visible message, or the last if none is selected
    pub async fn select_previous(&self) -> CoreResult<Option<Message>> {
        let target = {
            let state = self.lock();
            let ids = state.visible_ids();
            match &state.selected {
                Some(current) => ids
                    .iter()
                    .rev()
                    .skip_while(|id| *id != current)
                    .skip(1)
                    .find(|id| state.is_selectable(id))
                    .cloned(),
                None => ids.into_iter().rev().find(|id| state.is_selectable(id)),
            }
        };
        self.select_target(target).await
    }

    pub async fn select_first(&self) -> CoreResult<Option<Message>> {
        let target = {
            let state = self.lock();
            state
                .visible_ids()
                .into_iter()
                .find(|id| state.is_selectable(id))
        };
        self.select_target(target).await
    }

    pub async fn select_last(&self) -> CoreResult<Option<Message>> {
        let target = {
            let state = self.lock();
            state
                .visible_ids()
                .into_iter()
                .rev()
                .find(|id| state.is_selectable(id))
        };
        self.select_target(target).await
    }

    async fn select_target(&self, target: Option<MessageId>) -> CoreResult<Option<Message>> {
        match target {
            Some(id) => self.select(&id).await,
            None => Ok(None),
        }
    }

    /// Filter the visible messages by a case-insensitive substring.
    ///
    /// An empty term shows everything. A selected message that becomes
    /// hidden is deselected.
    pub fn set_filter(&self, term: &str) {
        let mut state = self.lock();
        state.filter = term.trim().to_lowercase();
        state.apply_filter();
    }

    /// Withdraw every pending notification, keeping the messages
    pub fn close_notifications(&self) {
        let handles: Vec<_> = {
            let mut state = self.lock();
            state
                .entries
                .values_mut()
                .filter_map(|e| e.notification.take())
                .collect()
        };
        for handle in handles {
            handle.dismiss();
        }
    }

    /// Ask the server to delete every message.
    ///
    /// The store itself empties when the server broadcasts the clear.
    pub async fn clear_remote(&self) -> CoreResult<()> {
        self.api.delete_messages().await?;
        Ok(())
    }

    /// Ask the server process to terminate
    pub async fn terminate_remote(&self) -> CoreResult<()> {
        self.api.terminate().await?;
        Ok(())
    }
}
