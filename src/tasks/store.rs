//! The authoritative in-memory task collection.

use std::collections::HashMap;

use super::model::{Task, TaskStatus};

/// Insertion-ordered task collection with idempotent upsert.
///
/// The store is the single point where the three update sources — snapshot,
/// mutation results, live events — meet. Deduplication happens here and only
/// here, keyed on the server-assigned id: applying the same creation twice
/// leaves one entry. There is no delete path.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    seeded: bool,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    /// Whether a snapshot has been installed yet.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Insert-or-replace keyed by id.
    ///
    /// A replace keeps the task's original position so a rendered column does
    /// not jump; a new id appends.
    pub fn upsert(&mut self, task: Task) {
        match self.index.get(task.id.as_str()) {
            Some(&pos) => self.tasks[pos] = task,
            None => {
                self.index.insert(task.id.clone(), self.tasks.len());
                self.tasks.push(task);
            }
        }
    }

    /// Install the snapshot as the new base collection.
    ///
    /// Live events can land before the snapshot response does. Any task
    /// already present is re-applied on top of the snapshot rather than
    /// dropped; for an id in both, the already-present version wins — the
    /// event that carried it was emitted no earlier than the snapshot was
    /// taken.
    pub fn seed(&mut self, snapshot: Vec<Task>) {
        let early = std::mem::take(&mut self.tasks);
        self.index.clear();
        for task in snapshot {
            self.upsert(task);
        }
        for task in early {
            self.upsert(task);
        }
        self.seeded = true;
    }

    /// The three status columns, preserving store order within each.
    pub fn by_status(&self) -> [(TaskStatus, Vec<&Task>); 3] {
        [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ]
        .map(|status| {
            (
                status,
                self.tasks.iter().filter(|t| t.status == status).collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, title: &str, status: TaskStatus) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            status,
            description: None,
            due_date: None,
            assigned_to: None,
            created_by: None,
            created_at: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "A", TaskStatus::Pending));
        store.upsert(task("1", "A", TaskStatus::Pending));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_keeps_position() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "A", TaskStatus::Pending));
        store.upsert(task("2", "B", TaskStatus::Pending));
        store.upsert(task("1", "A2", TaskStatus::InProgress));
        let titles: Vec<_> = store.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["A2", "B"]);
    }

    #[test]
    fn seed_then_upsert_replaces_in_place() {
        let mut store = TaskStore::new();
        store.seed(vec![task("1", "A", TaskStatus::Pending)]);
        store.upsert(task("1", "A", TaskStatus::InProgress));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn upserts_before_seed_are_not_lost() {
        let mut store = TaskStore::new();
        store.upsert(task("9", "early", TaskStatus::Pending));
        assert!(!store.is_seeded());

        store.seed(vec![task("1", "A", TaskStatus::Pending)]);
        assert!(store.is_seeded());
        assert_eq!(store.len(), 2);
        assert!(store.get("9").is_some());
    }

    #[test]
    fn seed_prefers_already_present_version_of_same_id() {
        let mut store = TaskStore::new();
        // Event for id 1 arrived while the snapshot request was in flight.
        store.upsert(task("1", "A", TaskStatus::InProgress));
        store.seed(vec![task("1", "A", TaskStatus::Pending)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn by_status_partitions_in_order() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "A", TaskStatus::Completed));
        store.upsert(task("2", "B", TaskStatus::Pending));
        store.upsert(task("3", "C", TaskStatus::Pending));
        let [(_, pending), (_, in_progress), (_, completed)] = store.by_status();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "2");
        assert!(in_progress.is_empty());
        assert_eq!(completed[0].id, "1");
    }
}
