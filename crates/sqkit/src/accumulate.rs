//! Rebuilding one-to-many results from flat join rows.
//!
//! Rows belonging to one logical group must be contiguous, which in practice
//! means ordering the query by the grouping key. Debug builds check this and
//! fail when a key reappears after a different key was seen.
//!
//! # Example
//! ```ignore
//! let mut pages = Vec::new();
//! let mut acc = Accumulator::new(|page: Page| pages.push(page));
//! select(Vec::<Field>::new())
//!     .from(&p)
//!     .left_join(&t, [t.page_id.eq(&p.page_id)])
//!     .order_by([&p.page_id])
//!     .fetch_each(&db, |row| {
//!         let id = row.int64(&p.page_id)?;
//!         let title = row.string(&p.title)?;
//!         let tag = row.nullable_string(&t.name)?;
//!         acc.accumulate(
//!             row,
//!             id,
//!             || Page { id, title, tags: Vec::new() },
//!             |page| page.tags.extend(tag),
//!         )
//!     })
//!     .await?;
//! acc.finish();
//! ```

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::SqResult;
use crate::row::Row;

/// Folds consecutive rows sharing a key into one group and hands each
/// finished group to `emit`.
pub struct Accumulator<K, G, E>
where
    E: FnMut(G),
{
    current: Option<(K, G)>,
    emit: E,
    #[cfg(debug_assertions)]
    finished: HashSet<K>,
}

impl<K, G, E> Accumulator<K, G, E>
where
    K: Eq + Hash + Debug,
    E: FnMut(G),
{
    pub fn new(emit: E) -> Self {
        Self {
            current: None,
            emit,
            #[cfg(debug_assertions)]
            finished: HashSet::new(),
        }
    }

    /// Feed one physical row.
    ///
    /// `start` creates the group when `key` differs from the previous row's
    /// key; `fold` then adds this row's contribution. Rows with
    /// [`Row::count`] zero (unmatched outer-join rows, the registration pass)
    /// are skipped.
    pub fn accumulate(
        &mut self,
        row: &Row<'_>,
        key: K,
        start: impl FnOnce() -> G,
        fold: impl FnOnce(&mut G),
    ) -> SqResult<()> {
        if row.count() == 0 {
            return Ok(());
        }
        if let Some((current, group)) = &mut self.current
            && *current == key
        {
            fold(group);
            return Ok(());
        }
        self.check_contiguous(&key)?;
        if let Some((done, group)) = self.current.take() {
            self.mark_finished(done);
            (self.emit)(group);
        }
        let mut group = start();
        fold(&mut group);
        self.current = Some((key, group));
        Ok(())
    }

    /// Emit the last group.
    pub fn finish(mut self) {
        if let Some((_, group)) = self.current.take() {
            (self.emit)(group);
        }
    }

    #[cfg(debug_assertions)]
    fn check_contiguous(&self, key: &K) -> SqResult<()> {
        if self.finished.contains(key) {
            return Err(crate::error::SqError::validation(format!(
                "group key {key:?} reappeared after other keys; order the query by the grouping key"
            )));
        }
        Ok(())
    }

    #[cfg(not(debug_assertions))]
    fn check_contiguous(&self, _key: &K) -> SqResult<()> {
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn mark_finished(&mut self, key: K) {
        self.finished.insert(key);
    }

    #[cfg(not(debug_assertions))]
    fn mark_finished(&mut self, _key: K) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqError;
    use crate::field::{Field, FieldType, TableInfo};
    use crate::value::Value;

    #[derive(Debug, PartialEq)]
    struct Page {
        id: i64,
        tags: Vec<String>,
    }

    fn run(records: &[Vec<Value>]) -> SqResult<Vec<Page>> {
        let p = TableInfo::new("pages");
        let t = TableInfo::new("tags");
        let id = Field::new(&p, "page_id", FieldType::Number);
        let tag = Field::new(&t, "name", FieldType::String);
        let columns = vec![id.clone(), tag.clone()];

        let mut pages = Vec::new();
        let mut acc = Accumulator::new(|page: Page| pages.push(page));
        for record in records {
            let mut row = Row::read(&columns, record);
            let page_id = row.nullable_int64(&id)?;
            let name = row.nullable_string(&tag)?;
            acc.accumulate(
                &row,
                page_id.unwrap_or_default(),
                || Page {
                    id: page_id.unwrap_or_default(),
                    tags: Vec::new(),
                },
                |page| page.tags.extend(name),
            )?;
        }
        acc.finish();
        Ok(pages)
    }

    #[test]
    fn groups_consecutive_rows() {
        let pages = run(&[
            vec![Value::Int(1), Value::from("rust")],
            vec![Value::Int(1), Value::from("sql")],
            vec![Value::Int(2), Value::Null],
            vec![Value::Int(3), Value::from("go")],
        ])
        .unwrap();
        assert_eq!(
            pages,
            vec![
                Page {
                    id: 1,
                    tags: vec!["rust".into(), "sql".into()]
                },
                Page {
                    id: 2,
                    tags: vec![]
                },
                Page {
                    id: 3,
                    tags: vec!["go".into()]
                },
            ]
        );
    }

    #[test]
    fn all_null_rows_are_skipped() {
        let pages = run(&[
            vec![Value::Null, Value::Null],
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Null, Value::Null],
        ])
        .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].tags, vec!["a".to_string()]);
    }

    #[test]
    fn empty_input_emits_nothing() {
        assert!(run(&[]).unwrap().is_empty());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn non_contiguous_key_fails() {
        let err = run(&[
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2), Value::from("b")],
            vec![Value::Int(1), Value::from("c")],
        ])
        .unwrap_err();
        assert!(matches!(err, SqError::Validation(ref m) if m.contains("reappeared")));
    }
}
