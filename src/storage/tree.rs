//! Root-anchored B+tree operations: search descent, leaf insertion and
//! split, internal insertion and split, root replacement. Every routine
//! re-borrows pages from the pager rather than holding views across a
//! recursive call.
use super::cursor::Cursor;
use super::node::{
    NodeType, NodeView, INTERNAL_MAX_CELLS, INVALID_PAGE_NUM, LEAF_LEFT_SPLIT_COUNT, LEAF_MAX_CELLS,
    LEAF_RIGHT_SPLIT_COUNT,
};
use super::pager::{Pager, TABLE_MAX_PAGES};
use crate::errors::Error;
use tracing::{debug, trace};

pub const ROOT_PAGE_NUM: u32 = 0;

fn check_capacity(pager: &Pager) -> Result<(), Error> {
    if pager.get_unused_page_num() as usize >= TABLE_MAX_PAGES {
        return Err(Error::TreeFull);
    }
    Ok(())
}

/// Max key of the subtree rooted at `page_num`: a leaf's last key, or an
/// internal node's recursive descent into its right child.
pub fn node_max_key(pager: &mut Pager, page_num: u32) -> Result<u32, Error> {
    let leaf_key = {
        let node = NodeView::new(pager.get(page_num)?);
        match node.node_type()? {
            NodeType::Leaf => Some(node.leaf_key(node.leaf_cells_count() as usize - 1)),
            NodeType::Internal => None,
        }
    };
    match leaf_key {
        Some(key) => Ok(key),
        None => {
            let right_child = {
                let node = NodeView::new(pager.get(page_num)?);
                node.internal_right_child()
            };
            node_max_key(pager, right_child)
        }
    }
}

/// Root-anchored descent to the cell where `key` is, or where it would be
/// inserted.
pub fn find(pager: &mut Pager, key: u32) -> Result<Cursor, Error> {
    let mut page_num = ROOT_PAGE_NUM;
    loop {
        let node = NodeView::new(pager.get(page_num)?);
        match node.node_type()? {
            NodeType::Leaf => {
                let cell_num = node.leaf_find_cell_index(key);
                return Ok(Cursor { page_num, cell_num, end_of_table: false });
            }
            NodeType::Internal => {
                let child_index = node.internal_find_child_index(key);
                page_num = node.internal_child(child_index);
            }
        }
    }
}

pub fn table_start(pager: &mut Pager) -> Result<Cursor, Error> {
    let mut cursor = find(pager, 0)?;
    let cells_count = {
        let node = NodeView::new(pager.get(cursor.page_num)?);
        node.leaf_cells_count()
    };
    cursor.end_of_table = cells_count == 0;
    Ok(cursor)
}

/// Inserts `(key, value)` at `cursor`, splitting the leaf if it is full.
/// `value` must already be `RECORD_SIZE` bytes (the caller encodes).
pub fn leaf_insert(pager: &mut Pager, cursor: &Cursor, key: u32, value: &[u8]) -> Result<(), Error> {
    let cells_count = {
        let node = NodeView::new(pager.get(cursor.page_num)?);
        node.leaf_cells_count()
    };

    if cells_count as usize >= LEAF_MAX_CELLS {
        return leaf_split_insert(pager, cursor, key, value);
    }

    let mut node = NodeView::new(pager.get(cursor.page_num)?);
    if cursor.cell_num < cells_count {
        node.leaf_shift_cells_right(cursor.cell_num as usize, cells_count as usize);
    }
    node.set_leaf_key(cursor.cell_num as usize, key);
    node.set_leaf_value(cursor.cell_num as usize, value)?;
    node.set_leaf_cells_count(cells_count + 1);
    Ok(())
}

fn leaf_split_insert(pager: &mut Pager, cursor: &Cursor, key: u32, value: &[u8]) -> Result<(), Error> {
    debug!(page_num = cursor.page_num, "Splitting leaf node...");
    check_capacity(pager)?;
    let old_page_num = cursor.page_num;

    let old_max_before_split = {
        let node = NodeView::new(pager.get(old_page_num)?);
        node.leaf_key(LEAF_MAX_CELLS - 1)
    };
    let (old_parent, old_next_leaf, is_root) = {
        let node = NodeView::new(pager.get(old_page_num)?);
        (node.parent(), node.leaf_next_leaf(), node.is_root())
    };

    let new_page_num = pager.get_unused_page_num();
    {
        let mut node = NodeView::new(pager.get(new_page_num)?);
        node.initialize_leaf();
        node.set_parent(old_parent);
        node.set_leaf_next_leaf(old_next_leaf);
    }
    {
        let mut node = NodeView::new(pager.get(old_page_num)?);
        node.set_leaf_next_leaf(new_page_num);
    }

    for i in (0..=LEAF_MAX_CELLS).rev() {
        let mut cell_buf = [0u8; super::node::LEAF_CELL_SIZE];
        if i == cursor.cell_num as usize {
            cell_buf[0..4].copy_from_slice(&key.to_le_bytes());
            cell_buf[4..].copy_from_slice(value);
        } else {
            let source_index = if i > cursor.cell_num as usize { i - 1 } else { i };
            let node = NodeView::new(pager.get(old_page_num)?);
            cell_buf.copy_from_slice(node.leaf_cell(source_index));
        }

        let destination_page = if i >= LEAF_LEFT_SPLIT_COUNT { new_page_num } else { old_page_num };
        let destination_index = i % LEAF_LEFT_SPLIT_COUNT;
        let mut node = NodeView::new(pager.get(destination_page)?);
        node.leaf_cell_mut(destination_index).copy_from_slice(&cell_buf);
    }

    {
        let mut node = NodeView::new(pager.get(old_page_num)?);
        node.set_leaf_cells_count(LEAF_LEFT_SPLIT_COUNT as u32);
    }
    {
        let mut node = NodeView::new(pager.get(new_page_num)?);
        node.set_leaf_cells_count(LEAF_RIGHT_SPLIT_COUNT as u32);
    }

    if is_root {
        create_new_root(pager, new_page_num)?;
    } else {
        let new_max_of_old = node_max_key(pager, old_page_num)?;
        update_internal_key(pager, old_parent, old_max_before_split, new_max_of_old)?;
        internal_insert(pager, old_parent, new_page_num)?;
    }
    Ok(())
}

/// Replaces the current root with a fresh internal root whose left child
/// is a verbatim copy of the old root page and whose right child is
/// `right_child_page` (already initialized by the caller).
pub fn create_new_root(pager: &mut Pager, right_child_page: u32) -> Result<(), Error> {
    debug!(right_child_page, "Creating a new root");
    check_capacity(pager)?;
    let left_child_page = pager.get_unused_page_num();

    let root_bytes = *pager.get(ROOT_PAGE_NUM)?;
    *pager.get(left_child_page)? = root_bytes;
    {
        let mut node = NodeView::new(pager.get(left_child_page)?);
        node.set_is_root(false);
    }

    let left_is_internal = {
        let node = NodeView::new(pager.get(left_child_page)?);
        node.node_type()? == NodeType::Internal
    };
    if left_is_internal {
        let (keys_count, right_child) = {
            let node = NodeView::new(pager.get(left_child_page)?);
            (node.internal_keys_count(), node.internal_right_child())
        };
        for i in 0..keys_count {
            let child = {
                let node = NodeView::new(pager.get(left_child_page)?);
                node.internal_child(i)
            };
            let mut child_node = NodeView::new(pager.get(child)?);
            child_node.set_parent(left_child_page);
        }
        let mut right_node = NodeView::new(pager.get(right_child)?);
        right_node.set_parent(left_child_page);
    }

    let left_max_key = node_max_key(pager, left_child_page)?;

    {
        let mut node = NodeView::new(pager.get(ROOT_PAGE_NUM)?);
        node.initialize_internal();
        node.set_is_root(true);
        node.set_internal_keys_count(1);
        node.set_internal_child(0, left_child_page);
        node.set_internal_key(0, left_max_key);
        node.set_internal_right_child(right_child_page);
    }
    {
        let mut node = NodeView::new(pager.get(left_child_page)?);
        node.set_parent(ROOT_PAGE_NUM);
    }
    {
        let mut node = NodeView::new(pager.get(right_child_page)?);
        node.set_parent(ROOT_PAGE_NUM);
    }
    Ok(())
}

/// Searches `parent`'s key entries for `old_key` and overwrites it with
/// `new_key`. A leaf that split while it was the rightmost child has no
/// matching entry (its bound is implicit in the right child); that's not
/// an error.
fn update_internal_key(pager: &mut Pager, parent_page: u32, old_key: u32, new_key: u32) -> Result<(), Error> {
    let mut node = NodeView::new(pager.get(parent_page)?);
    let keys_count = node.internal_keys_count();
    for i in 0..keys_count {
        if node.internal_key(i) == old_key {
            node.set_internal_key(i, new_key);
            break;
        }
    }
    Ok(())
}

/// Inserts `child_page` under `parent_page`, splitting the parent if full.
pub fn internal_insert(pager: &mut Pager, parent_page: u32, child_page: u32) -> Result<(), Error> {
    debug!(parent_page, child_page, "Inserting internal node");
    let child_max = node_max_key(pager, child_page)?;
    let keys_count = {
        let node = NodeView::new(pager.get(parent_page)?);
        node.internal_keys_count()
    };

    if keys_count as usize >= INTERNAL_MAX_CELLS {
        return internal_split_insert(pager, parent_page, child_page);
    }

    let right_child = {
        let node = NodeView::new(pager.get(parent_page)?);
        node.internal_right_child()
    };
    if right_child == INVALID_PAGE_NUM {
        let mut node = NodeView::new(pager.get(parent_page)?);
        node.set_internal_right_child(child_page);
        return Ok(());
    }

    let right_child_max = node_max_key(pager, right_child)?;
    let index = {
        let node = NodeView::new(pager.get(parent_page)?);
        node.internal_find_child_index(child_max)
    };

    let mut node = NodeView::new(pager.get(parent_page)?);
    node.set_internal_keys_count(keys_count + 1);
    if child_max > right_child_max {
        trace!("Replace right child");
        node.set_internal_child(keys_count, right_child);
        node.set_internal_key(keys_count, right_child_max);
        node.set_internal_right_child(child_page);
    } else {
        trace!("Make room for the new cell");
        node.internal_shift_cells_right(index, keys_count);
        node.set_internal_child(index, child_page);
        node.set_internal_key(index, child_max);
    }
    Ok(())
}

fn internal_split_insert(pager: &mut Pager, parent_page: u32, child_page: u32) -> Result<(), Error> {
    debug!(parent_page, child_page, "Splitting internal node...");
    check_capacity(pager)?;
    let old_page_num = parent_page;
    let old_max = node_max_key(pager, old_page_num)?;
    let splitting_root = {
        let node = NodeView::new(pager.get(old_page_num)?);
        node.is_root()
    };

    let new_page_num = pager.get_unused_page_num();
    {
        let mut node = NodeView::new(pager.get(new_page_num)?);
        node.initialize_internal();
    }

    let (old_page_num, grandparent_page) = if splitting_root {
        create_new_root(pager, new_page_num)?;
        let real_old = {
            let node = NodeView::new(pager.get(ROOT_PAGE_NUM)?);
            node.internal_child(0)
        };
        (real_old, ROOT_PAGE_NUM)
    } else {
        let grandparent = {
            let node = NodeView::new(pager.get(old_page_num)?);
            node.parent()
        };
        (old_page_num, grandparent)
    };

    {
        let mut node = NodeView::new(pager.get(new_page_num)?);
        node.set_parent(grandparent_page);
    }

    let old_right_child = {
        let node = NodeView::new(pager.get(old_page_num)?);
        node.internal_right_child()
    };
    internal_insert(pager, new_page_num, old_right_child)?;
    {
        let mut node = NodeView::new(pager.get(old_right_child)?);
        node.set_parent(new_page_num);
    }
    {
        let mut node = NodeView::new(pager.get(old_page_num)?);
        node.set_internal_right_child(INVALID_PAGE_NUM);
    }

    let move_from = INTERNAL_MAX_CELLS / 2 + 1;
    for i in (move_from..INTERNAL_MAX_CELLS).rev() {
        let child = {
            let node = NodeView::new(pager.get(old_page_num)?);
            node.internal_child(i as u32)
        };
        internal_insert(pager, new_page_num, child)?;
        {
            let mut node = NodeView::new(pager.get(child)?);
            node.set_parent(new_page_num);
        }
        {
            let mut node = NodeView::new(pager.get(old_page_num)?);
            let kc = node.internal_keys_count();
            node.set_internal_keys_count(kc - 1);
        }
    }

    {
        let mut node = NodeView::new(pager.get(old_page_num)?);
        let kc = node.internal_keys_count();
        let promoted = node.internal_child(kc - 1);
        node.set_internal_right_child(promoted);
        node.set_internal_keys_count(kc - 1);
    }

    let old_max_after_split = node_max_key(pager, old_page_num)?;
    let child_max = node_max_key(pager, child_page)?;
    let destination = if child_max < old_max_after_split { old_page_num } else { new_page_num };
    internal_insert(pager, destination, child_page)?;
    {
        let mut node = NodeView::new(pager.get(child_page)?);
        node.set_parent(destination);
    }

    update_internal_key(pager, grandparent_page, old_max, old_max_after_split)?;
    if !splitting_root {
        internal_insert(pager, grandparent_page, new_page_num)?;
        let mut node = NodeView::new(pager.get(new_page_num)?);
        node.set_parent(grandparent_page);
    }

    Ok(())
}
