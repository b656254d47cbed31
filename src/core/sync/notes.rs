use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::{
    IntentError, Mirror, Reconcile, SharedMirror, Snapshot, WriteHandle, fire_and_forget, lock,
};
use crate::core::api::{Gateway, Note, NoteDraft, NoteUpdate, now_iso};
use crate::core::autosave::NoteSink;
use crate::core::cache::{Query, QueryClient, QueryKey, QueryPolicy};
use crate::core::debounce::DebouncedInput;
use crate::core::search::SEARCH_DEBOUNCE;

/// Pinned first, then most recently updated. Stable for equal keys.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by_key(|n| (!n.pinned, Reverse(n.updated_millis())));
}

/// Notes list search box. Queries follow the settled text only.
pub struct NoteSearch {
    input: DebouncedInput,
}

impl Default for NoteSearch {
    fn default() -> Self {
        Self {
            input: DebouncedInput::new(SEARCH_DEBOUNCE),
        }
    }
}

impl NoteSearch {
    pub fn set_text(&mut self, text: &str) {
        self.input.set(text);
    }

    pub fn text(&self) -> &str {
        self.input.raw()
    }

    pub fn settled(&self) -> String {
        self.input.settled()
    }

    pub fn query(&self, book: &NoteBook) -> Arc<Query<Vec<Note>>> {
        book.query(&self.input.settled())
    }
}

#[derive(Clone)]
pub struct NoteBook {
    mirror: SharedMirror<Note>,
    /// Placeholder id -> server id, for holders of a pre-rename id.
    renamed: Renames,
    gateway: Gateway,
    client: QueryClient,
}

type Renames = Arc<Mutex<HashMap<String, String>>>;

fn lock_renames(renamed: &Renames) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    renamed.lock().unwrap_or_else(|e| e.into_inner())
}

fn not_found(id: &str) -> IntentError {
    IntentError::NotFound {
        kind: "note",
        id: id.to_string(),
    }
}

impl NoteBook {
    pub fn new(gateway: Gateway, client: QueryClient) -> Self {
        Self {
            mirror: Arc::new(Mutex::new(Mirror::default())),
            renamed: Arc::default(),
            gateway,
            client,
        }
    }

    /// Note list for `search`; an empty search lists everything.
    pub fn query(&self, search: &str) -> Arc<Query<Vec<Note>>> {
        let key = if search.is_empty() {
            QueryKey::notes()
        } else {
            QueryKey::notes_search(search)
        };
        let gateway = self.gateway.clone();
        let search = search.to_string();
        self.client.query(key, QueryPolicy::NOTES, move || {
            let gateway = gateway.clone();
            let search = search.clone();
            async move { gateway.notes(Some(&search)).await }
        })
    }

    pub fn notes(&self) -> Vec<Note> {
        let mut notes = lock(&self.mirror).items().to_vec();
        sort_notes(&mut notes);
        notes
    }

    /// Current id for `id`, following a placeholder rename.
    pub fn resolve(&self, id: &str) -> String {
        lock_renames(&self.renamed)
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn get(&self, id: &str) -> Option<Note> {
        let id = self.resolve(id);
        lock(&self.mirror).items().iter().find(|n| n.id == id).cloned()
    }

    fn invalidation(&self) -> Option<(QueryClient, QueryKey)> {
        Some((self.client.clone(), QueryKey::notes()))
    }

    /// Insert a placeholder immediately; once the server answers, the
    /// placeholder takes the server id and the note list is invalidated.
    pub fn create(&self, draft: NoteDraft) -> Result<(String, WriteHandle), IntentError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(IntentError::Required("title"));
        }
        let local_id = format!("local-{}", Uuid::new_v4());
        let now = now_iso();
        let note = Note {
            id: local_id.clone(),
            title: title.clone(),
            content: draft.content.clone(),
            tags: draft.tags.clone(),
            pinned: false,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        lock(&self.mirror).apply(|items| items.push(note));

        let gateway = self.gateway.clone();
        let mirror = self.mirror.clone();
        let renamed = self.renamed.clone();
        let placeholder = local_id.clone();
        let draft = NoteDraft { title, ..draft };
        let handle = fire_and_forget("create note", self.invalidation(), async move {
            let server_id = gateway.create_note(&draft).await?;
            if let Some(server_id) = server_id {
                let mut guard = lock(&mirror);
                if let Some(note) = guard.items_mut().iter_mut().find(|n| n.id == placeholder) {
                    note.id = server_id.clone();
                }
                lock_renames(&renamed).insert(placeholder, server_id);
            }
            Ok(())
        });
        Ok((local_id, handle))
    }

    pub fn update(&self, id: &str, update: NoteUpdate) -> Result<WriteHandle, IntentError> {
        let id = self.resolve(id);
        let id = id.as_str();
        let found = lock(&self.mirror).apply(|items| {
            items
                .iter_mut()
                .find(|n| n.id == id)
                .map(|note| {
                    update.apply_to(note);
                    note.updated_at = Some(now_iso());
                })
                .is_some()
        });
        if !found {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("update note", self.invalidation(), async move {
            gateway.update_note(&id, &update).await
        }))
    }

    pub fn toggle_pin(&self, id: &str) -> Result<WriteHandle, IntentError> {
        let pinned = self.get(id).ok_or_else(|| not_found(id))?.pinned;
        self.update(
            id,
            NoteUpdate {
                pinned: Some(!pinned),
                ..NoteUpdate::default()
            },
        )
    }

    pub fn delete(&self, id: &str) -> Result<WriteHandle, IntentError> {
        let id = self.resolve(id);
        let id = id.as_str();
        let removed = lock(&self.mirror).apply(|items| {
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        });
        if !removed {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("delete note", self.invalidation(), async move {
            gateway.delete_note(&id).await
        }))
    }
}

impl NoteSink for NoteBook {
    fn save(&self, id: &str, update: NoteUpdate) -> Option<WriteHandle> {
        self.update(id, update).ok()
    }
}

impl Reconcile for NoteBook {
    type Item = Note;

    fn reconcile(&self, snapshot: Snapshot<Note>) -> bool {
        lock(&self.mirror).reconcile(snapshot)
    }
}
