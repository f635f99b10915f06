use crate::engine::csv;
use serde::{Deserialize, Serialize};

/// One named dataset. `original_data` is captured at first ingestion and only
/// ever replaced through an explicit reset; `current_data` tracks the latest
/// accepted mutation. Tables keep their name for their whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(rename = "originalData")]
    pub original_data: String,
    #[serde(rename = "currentData")]
    pub current_data: String,
}

impl Table {
    pub fn new(name: impl Into<String>, csv_text: impl Into<String>) -> Self {
        let csv_text = csv_text.into();
        Self {
            name: name.into(),
            original_data: csv_text.clone(),
            current_data: csv_text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub columns: usize,
    pub rows: usize,
}

/// Column/row counts of a CSV body, header excluded from the row count.
pub fn table_stats(csv_text: &str) -> TableStats {
    let rows = csv::parse(csv_text);
    let columns = rows.first().map(Vec::len).unwrap_or(0);
    TableStats {
        columns,
        rows: rows.len().saturating_sub(1),
    }
}

/// Named tables in insertion order. Lookups are linear; a workspace holds a
/// handful of tables at most.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableStore {
    tables: Vec<Table>,
}

impl TableStore {
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|table| table.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a new table or overwrite the current data of an existing one.
    /// An existing table keeps its original snapshot and list position.
    pub fn upsert(&mut self, name: &str, csv_text: String) {
        match self.get_mut(name) {
            Some(table) => table.current_data = csv_text,
            None => self.tables.push(Table::new(name, csv_text)),
        }
    }

    pub fn insert(&mut self, table: Table) {
        match self.get_mut(&table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.tables.len();
        self.tables.retain(|table| table.name != name);
        self.tables.len() != before
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.tables.first().map(|table| table.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{table_stats, Table, TableStore};

    #[test]
    fn upsert_creates_then_updates_in_place() {
        let mut store = TableStore::default();
        store.upsert("sales", "a,b\n1,2".to_string());
        store.upsert("costs", "x\n9".to_string());
        store.upsert("sales", "a,b\n3,4".to_string());

        let sales = store.get("sales").expect("sales should exist");
        assert_eq!(sales.original_data, "a,b\n1,2");
        assert_eq!(sales.current_data, "a,b\n3,4");
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["sales", "costs"]);
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let mut store = TableStore::default();
        store.insert(Table::new("only", "h\n1"));
        assert!(store.remove("only"));
        assert!(!store.remove("only"));
        assert!(store.is_empty());
    }

    #[test]
    fn stats_exclude_the_header_row() {
        let stats = table_stats("name,amount\nA,10\nB,20");
        assert_eq!(stats.columns, 2);
        assert_eq!(stats.rows, 2);
        assert_eq!(table_stats("").rows, 0);
    }
}
