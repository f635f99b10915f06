use std::collections::HashMap;
use std::collections::VecDeque;

pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Default)]
struct TableHistory {
    undo: VecDeque<String>,
    redo: VecDeque<String>,
}

fn push_bounded(stack: &mut VecDeque<String>, snapshot: String) {
    stack.push_back(snapshot);
    if stack.len() > HISTORY_LIMIT {
        stack.pop_front();
    }
}

/// Per-table bounded undo/redo stacks of prior CSV snapshots. Exhausted
/// stacks are a silent no-op; the UI reflects that as disabled buttons.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    tables: HashMap<String, TableHistory>,
}

impl HistoryLedger {
    /// Push the pre-mutation snapshot onto the undo stack (evicting the
    /// oldest entry past capacity) and clear the redo stack.
    pub fn record_before_mutation(&mut self, table: &str, previous_csv: String) {
        let history = self.tables.entry(table.to_string()).or_default();
        push_bounded(&mut history.undo, previous_csv);
        history.redo.clear();
    }

    /// Pop the most recent snapshot, stashing the current state on the redo
    /// stack. `None` when there is nothing to undo.
    pub fn undo(&mut self, table: &str, current_csv: &str) -> Option<String> {
        let history = self.tables.get_mut(table)?;
        let previous = history.undo.pop_back()?;
        push_bounded(&mut history.redo, current_csv.to_string());
        Some(previous)
    }

    pub fn redo(&mut self, table: &str, current_csv: &str) -> Option<String> {
        let history = self.tables.get_mut(table)?;
        let next = history.redo.pop_back()?;
        push_bounded(&mut history.undo, current_csv.to_string());
        Some(next)
    }

    /// Clear both stacks, used on reset-to-original and table creation.
    pub fn reset(&mut self, table: &str) {
        self.tables.remove(table);
    }

    pub fn remove(&mut self, table: &str) {
        self.tables.remove(table);
    }

    pub fn can_undo(&self, table: &str) -> bool {
        self.tables
            .get(table)
            .map(|history| !history.undo.is_empty())
            .unwrap_or(false)
    }

    pub fn can_redo(&self, table: &str) -> bool {
        self.tables
            .get(table)
            .map(|history| !history.redo.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryLedger, HISTORY_LIMIT};

    #[test]
    fn undo_and_redo_are_symmetric() {
        let mut ledger = HistoryLedger::default();
        let states = ["s0", "s1", "s2", "s3"];
        for pair in states.windows(2) {
            ledger.record_before_mutation("t", pair[0].to_string());
        }

        let mut current = states[states.len() - 1].to_string();
        for expected in states[..states.len() - 1].iter().rev() {
            current = ledger.undo("t", &current).expect("undo should pop");
            assert_eq!(current, *expected);
        }
        assert_eq!(current, "s0");
        assert!(ledger.undo("t", &current).is_none());

        for expected in &states[1..] {
            current = ledger.redo("t", &current).expect("redo should pop");
            assert_eq!(current, *expected);
        }
        assert_eq!(current, "s3");
        assert!(ledger.redo("t", &current).is_none());
    }

    #[test]
    fn capacity_retains_only_the_most_recent_snapshots() {
        let mut ledger = HistoryLedger::default();
        for step in 0..HISTORY_LIMIT + 5 {
            ledger.record_before_mutation("t", format!("v{step}"));
        }

        let mut reachable = Vec::new();
        let mut current = "head".to_string();
        while let Some(previous) = ledger.undo("t", &current) {
            current = previous.clone();
            reachable.push(previous);
        }
        assert_eq!(reachable.len(), HISTORY_LIMIT);
        assert_eq!(reachable.first().map(String::as_str), Some("v24"));
        assert_eq!(reachable.last().map(String::as_str), Some("v5"));
    }

    #[test]
    fn mutation_clears_redo() {
        let mut ledger = HistoryLedger::default();
        ledger.record_before_mutation("t", "a".to_string());
        let undone = ledger.undo("t", "b").expect("undo should pop");
        assert_eq!(undone, "a");
        assert!(ledger.can_redo("t"));

        ledger.record_before_mutation("t", "a'".to_string());
        assert!(!ledger.can_redo("t"));
    }

    #[test]
    fn stacks_are_kept_per_table() {
        let mut ledger = HistoryLedger::default();
        ledger.record_before_mutation("left", "l0".to_string());
        ledger.record_before_mutation("right", "r0".to_string());
        assert_eq!(ledger.undo("left", "l1").as_deref(), Some("l0"));
        assert_eq!(ledger.undo("right", "r1").as_deref(), Some("r0"));
    }

    #[test]
    fn reset_empties_both_stacks() {
        let mut ledger = HistoryLedger::default();
        ledger.record_before_mutation("t", "a".to_string());
        ledger.undo("t", "b");
        ledger.reset("t");
        assert!(!ledger.can_undo("t"));
        assert!(!ledger.can_redo("t"));
    }
}
