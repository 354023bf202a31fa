use crate::domain::models::{sort_in_list_order, Todo, WidgetTodo};
use crate::infrastructure::widget_store::{WidgetRefresher, WidgetSnapshotStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Change notification seam between the canonical todo store and anything
/// that derives state from it. The sync bridge subscribes so every canonical
/// mutation re-publishes the widget snapshot.
pub trait TodoChangeListener: Send + Sync {
    fn todos_changed(&self, todos: &[Todo]);
}

/// Two-way bridge between the canonical todo set and the shared snapshot the
/// widget surface renders. The widget edits only the snapshot; the app owns
/// the canonical store and reconciles with `merge`.
///
/// None of these operations surface storage errors: a snapshot that cannot be
/// read behaves as empty, and a snapshot that cannot be written leaves the
/// previous one standing.
pub struct WidgetSyncService<S: WidgetSnapshotStore> {
    snapshot_store: Arc<S>,
    refresher: Arc<dyn WidgetRefresher>,
    now_provider: NowProvider,
}

impl<S: WidgetSnapshotStore> WidgetSyncService<S> {
    pub fn new(snapshot_store: Arc<S>, refresher: Arc<dyn WidgetRefresher>) -> Self {
        Self {
            snapshot_store,
            refresher,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Replaces the snapshot with the given todo set, sorted for display, and
    /// cues a widget reload. Identical input produces an identical document.
    pub fn push(&self, todos: &[Todo]) {
        let mut records: Vec<WidgetTodo> = todos.iter().map(WidgetTodo::from).collect();
        sort_in_list_order(&mut records);
        self.replace_snapshot(&records);
    }

    /// The snapshot as last written, already in display order. Missing or
    /// undecodable documents read as empty.
    pub fn pull(&self) -> Vec<WidgetTodo> {
        self.snapshot_store.read().ok().flatten().unwrap_or_default()
    }

    /// Completion toggle for the widget surface, which has no access to the
    /// canonical store. Unknown ids leave the stored document untouched.
    pub fn toggle(&self, todo_id: &str) {
        let mut records = self.pull();
        let Some(record) = records.iter_mut().find(|record| record.id == todo_id) else {
            return;
        };

        let now = (self.now_provider)();
        record.is_completed = !record.is_completed;
        if record.is_completed {
            record.completed_at = Some(now);
        } else {
            record.completed_at = None;
            record.sort_date = now;
        }

        sort_in_list_order(&mut records);
        self.replace_snapshot(&records);
    }

    /// Applies outstanding widget edits to the canonical todo set. The
    /// snapshot's completion flag wins; when it differs, the completion
    /// metadata comes along with it. Title and creation time are never
    /// rewritten, and todos absent from the snapshot pass through as-is.
    pub fn merge(&self, mut todos: Vec<Todo>) -> Vec<Todo> {
        let snapshot: HashMap<String, WidgetTodo> = self
            .pull()
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        for todo in &mut todos {
            let Some(record) = snapshot.get(&todo.id) else {
                continue;
            };
            if record.is_completed != todo.is_completed {
                todo.is_completed = record.is_completed;
                todo.completed_at = record.completed_at;
                todo.sort_date = record.sort_date;
            }
        }
        todos
    }

    fn replace_snapshot(&self, records: &[WidgetTodo]) {
        if self.snapshot_store.write(records).is_ok() {
            self.refresher.request_reload();
        }
    }
}

impl<S: WidgetSnapshotStore> TodoChangeListener for WidgetSyncService<S> {
    fn todos_changed(&self, todos: &[Todo]) {
        self.push(todos);
    }
}
