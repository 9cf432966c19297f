//! A position inside the tree: a leaf page and a cell within it, plus an
//! end-of-table flag. Cursors are cheap values, valid only until the next
//! mutation of the tree they reference.
use super::node::{NodeView, NO_SIBLING};
use super::pager::Pager;
use super::record::Record;
use crate::errors::Error;

#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: u32,
    pub end_of_table: bool,
}

impl Cursor {
    /// Moves to the next cell, crossing into the sibling leaf when the
    /// current one is exhausted.
    pub fn advance(&mut self, pager: &mut Pager) -> Result<(), Error> {
        self.cell_num += 1;
        let (cells_count, next_leaf) = {
            let node = NodeView::new(pager.get(self.page_num)?);
            (node.leaf_cells_count(), node.leaf_next_leaf())
        };
        if self.cell_num >= cells_count {
            if next_leaf == NO_SIBLING {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }

    pub fn value(&self, pager: &mut Pager) -> Result<Record, Error> {
        let node = NodeView::new(pager.get(self.page_num)?);
        Record::decode(node.leaf_value(self.cell_num as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::node::NodeType;
    use crate::storage::tree::{leaf_insert, table_start, ROOT_PAGE_NUM};

    fn fresh_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.db");
        let mut pager = Pager::open(&path).unwrap();
        {
            let mut node = NodeView::new(pager.get(ROOT_PAGE_NUM).unwrap());
            node.initialize_leaf();
            node.set_is_root(true);
        }
        (dir, pager)
    }

    #[test]
    fn table_start_on_empty_table_is_end_of_table() {
        let (_dir, mut pager) = fresh_pager();
        let cursor = table_start(&mut pager).unwrap();
        assert!(cursor.end_of_table);
        assert_eq!(cursor.page_num, ROOT_PAGE_NUM);
    }

    #[test]
    fn advance_past_last_cell_sets_end_of_table() {
        let (_dir, mut pager) = fresh_pager();
        let record = Record::new(1, "a", "b").unwrap();
        let encoded = record.encode().unwrap();
        let cursor = crate::storage::tree::find(&mut pager, 1).unwrap();
        leaf_insert(&mut pager, &cursor, 1, &encoded).unwrap();

        let mut cursor = table_start(&mut pager).unwrap();
        assert!(!cursor.end_of_table);
        assert_eq!(cursor.value(&mut pager).unwrap(), record);
        cursor.advance(&mut pager).unwrap();
        assert!(cursor.end_of_table);
    }

    #[test]
    fn node_type_accessor_still_reports_leaf_on_fresh_root() {
        let (_dir, mut pager) = fresh_pager();
        let node = NodeView::new(pager.get(ROOT_PAGE_NUM).unwrap());
        assert_eq!(node.node_type().unwrap(), NodeType::Leaf);
    }
}
