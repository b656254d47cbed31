//! Debounced autosave for the note editor.
//!
//! `Idle -> Dirty -> (quiet period) -> Saving -> Idle`. Further edits while
//! `Dirty` restart the quiet period. Selecting a note loads its fields and
//! ignores edits for one settling tick so the load itself is never saved.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::api::{Note, NoteUpdate};
use crate::core::debounce::Debouncer;
use crate::core::sync::WriteHandle;

pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Where combined editor saves go.
pub trait NoteSink: Send + Sync + 'static {
    fn save(&self, id: &str, update: NoteUpdate) -> Option<WriteHandle>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Dirty,
    Saving,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorFields {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub tag_input: String,
}

#[derive(Debug)]
struct EditorInner {
    note_id: Option<String>,
    fields: EditorFields,
    state: SaveState,
    settling: bool,
}

pub struct NoteEditor<S: NoteSink> {
    inner: Arc<Mutex<EditorInner>>,
    sink: Arc<S>,
    autosave: Debouncer,
    settle: Debouncer,
}

fn lock(inner: &Arc<Mutex<EditorInner>>) -> MutexGuard<'_, EditorInner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl<S: NoteSink> NoteEditor<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self::with_delays(sink, AUTOSAVE_DELAY, SETTLE_DELAY)
    }

    pub fn with_delays(sink: Arc<S>, autosave: Duration, settle: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EditorInner {
                note_id: None,
                fields: EditorFields::default(),
                state: SaveState::Idle,
                settling: false,
            })),
            sink,
            autosave: Debouncer::new(autosave),
            settle: Debouncer::new(settle),
        }
    }

    /// Load `note` into the editor. Unsaved edits to the previous note are
    /// discarded.
    pub fn select(&mut self, note: &Note) {
        self.autosave.cancel();
        {
            let mut inner = lock(&self.inner);
            inner.note_id = Some(note.id.clone());
            inner.fields = EditorFields {
                title: note.title.clone(),
                content: note.content.clone(),
                tags: note.tags.clone(),
                tag_input: String::new(),
            };
            inner.state = SaveState::Idle;
            inner.settling = true;
        }
        let inner = Arc::clone(&self.inner);
        self.settle.schedule(async move {
            let mut inner = lock(&inner);
            inner.settling = false;
            inner.state = SaveState::Idle;
        });
    }

    /// Deselect. A pending save is dropped, not flushed.
    pub fn close(&mut self) {
        self.autosave.cancel();
        self.settle.cancel();
        let mut inner = lock(&self.inner);
        inner.note_id = None;
        inner.state = SaveState::Idle;
        inner.settling = false;
    }

    pub fn note_id(&self) -> Option<String> {
        lock(&self.inner).note_id.clone()
    }

    pub fn state(&self) -> SaveState {
        lock(&self.inner).state
    }

    pub fn fields(&self) -> EditorFields {
        lock(&self.inner).fields.clone()
    }

    pub fn set_title(&mut self, title: &str) {
        self.edit(|f| {
            if f.title == title {
                return false;
            }
            f.title = title.to_string();
            true
        });
    }

    pub fn set_content(&mut self, content: &str) {
        self.edit(|f| {
            if f.content == content {
                return false;
            }
            f.content = content.to_string();
            true
        });
    }

    pub fn set_tag_input(&mut self, input: &str) {
        lock(&self.inner).fields.tag_input = input.to_string();
    }

    /// Add the buffered tag. Blank and duplicate tags are ignored; the
    /// buffer is cleared either way.
    pub fn add_tag(&mut self) {
        self.edit(|f| {
            let tag = std::mem::take(&mut f.tag_input).trim().to_string();
            if tag.is_empty() || f.tags.contains(&tag) {
                return false;
            }
            f.tags.push(tag);
            true
        });
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.edit(|f| {
            let before = f.tags.len();
            f.tags.retain(|t| t != tag);
            f.tags.len() != before
        });
    }

    fn edit(&mut self, change: impl FnOnce(&mut EditorFields) -> bool) {
        let mut inner = lock(&self.inner);
        let changed = change(&mut inner.fields);
        if !changed || inner.settling || inner.note_id.is_none() {
            return;
        }
        inner.state = SaveState::Dirty;
        drop(inner);

        let inner = Arc::clone(&self.inner);
        let sink = Arc::clone(&self.sink);
        self.autosave.schedule(async move {
            let (id, update) = {
                let mut guard = lock(&inner);
                let Some(id) = guard.note_id.clone() else {
                    return;
                };
                if guard.state != SaveState::Dirty {
                    return;
                }
                guard.state = SaveState::Saving;
                let update = NoteUpdate {
                    title: Some(guard.fields.title.clone()),
                    content: Some(guard.fields.content.clone()),
                    tags: Some(guard.fields.tags.clone()),
                    pinned: None,
                };
                (id, update)
            };

            if let Some(write) = sink.save(&id, update) {
                write.settled().await;
            }

            let mut guard = lock(&inner);
            if guard.state == SaveState::Saving {
                guard.state = SaveState::Idle;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::Note;

    #[derive(Default)]
    struct RecordingSink {
        saves: Mutex<Vec<(String, NoteUpdate, tokio::time::Instant)>>,
    }

    impl RecordingSink {
        fn saves(&self) -> Vec<(String, NoteUpdate, tokio::time::Instant)> {
            self.saves.lock().unwrap().clone()
        }
    }

    impl NoteSink for RecordingSink {
        fn save(&self, id: &str, update: NoteUpdate) -> Option<WriteHandle> {
            self.saves
                .lock()
                .unwrap()
                .push((id.to_string(), update, tokio::time::Instant::now()));
            None
        }
    }

    fn note(id: &str, title: &str) -> Note {
        Note {
            id: id.to_string(),
            title: title.to_string(),
            content: "body".to_string(),
            tags: vec!["ops".to_string()],
            pinned: false,
            created_at: None,
            updated_at: None,
        }
    }

    async fn settled_editor(sink: &Arc<RecordingSink>, n: &Note) -> NoteEditor<RecordingSink> {
        let mut editor = NoteEditor::new(sink.clone());
        editor.select(n);
        tokio::time::sleep(Duration::from_millis(60)).await;
        editor
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_save() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = settled_editor(&sink, &note("n1", "draft")).await;

        editor.set_title("shipped");
        tokio::time::sleep(Duration::from_millis(150)).await;
        editor.set_title("shipping");
        let last_edit = tokio::time::Instant::now();
        assert_eq!(editor.state(), SaveState::Dirty);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(sink.saves().is_empty(), "nothing before the quiet period ends");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let saves = sink.saves();
        assert_eq!(saves.len(), 1);
        let (id, update, at) = &saves[0];
        assert_eq!(id, "n1");
        assert_eq!(update.title.as_deref(), Some("shipping"));
        assert_eq!(update.content.as_deref(), Some("body"));
        assert_eq!(update.tags.as_deref(), Some(&["ops".to_string()][..]));
        assert_eq!(*at - last_edit, AUTOSAVE_DELAY);
        assert_eq!(editor.state(), SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_a_note_is_not_an_edit() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = NoteEditor::new(sink.clone());
        editor.select(&note("n1", "draft"));
        editor.set_title("during settle");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sink.saves().is_empty());
        assert_eq!(editor.state(), SaveState::Idle);
        assert_eq!(editor.fields().title, "during settle");
    }

    #[tokio::test(start_paused = true)]
    async fn switching_notes_discards_pending_save() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = settled_editor(&sink, &note("n1", "first")).await;
        editor.set_content("unsaved");
        tokio::time::sleep(Duration::from_millis(500)).await;

        editor.select(&note("n2", "second"));
        assert_eq!(editor.fields().title, "second");
        assert_eq!(editor.state(), SaveState::Idle);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sink.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_save() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = settled_editor(&sink, &note("n1", "first")).await;
        editor.set_title("edited");
        drop(editor);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sink.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tag_rules() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = settled_editor(&sink, &note("n1", "t")).await;

        editor.set_tag_input("  infra  ");
        editor.add_tag();
        assert_eq!(editor.fields().tags, vec!["ops", "infra"]);
        assert_eq!(editor.fields().tag_input, "");

        editor.set_tag_input("ops");
        editor.add_tag();
        assert_eq!(editor.fields().tags, vec!["ops", "infra"], "exact duplicate rejected");
        assert_eq!(editor.fields().tag_input, "", "buffer cleared on rejection too");

        editor.set_tag_input("Ops");
        editor.add_tag();
        assert_eq!(editor.fields().tags, vec!["ops", "infra", "Ops"], "case-sensitive");

        editor.set_tag_input("   ");
        editor.add_tag();
        assert_eq!(editor.fields().tags.len(), 3);

        editor.remove_tag("ops");
        assert_eq!(editor.fields().tags, vec!["infra", "Ops"]);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let saves = sink.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(
            saves[0].1.tags,
            Some(vec!["infra".to_string(), "Ops".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_value_does_not_mark_dirty() {
        let sink = Arc::new(RecordingSink::default());
        let mut editor = settled_editor(&sink, &note("n1", "same")).await;
        editor.set_title("same");
        assert_eq!(editor.state(), SaveState::Idle);
        editor.remove_tag("missing");
        assert_eq!(editor.state(), SaveState::Idle);
    }
}
