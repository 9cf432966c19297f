//! Page codec: typed, offset-based accessors over a borrowed 4096-byte page
//! buffer. This module is the sole authority for on-disk byte layout; all
//! multi-byte fields are little-endian regardless of host architecture.
use super::pager::PAGE_SIZE;
use super::record::RECORD_SIZE;
use crate::errors::Error;

pub const INVALID_PAGE_NUM: u32 = u32::MAX;
/// `next_leaf_page` sentinel meaning "no next leaf" (rightmost leaf).
pub const NO_SIBLING: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

// Common header.
const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;
const PARENT_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_SIZE: usize = 4;
const COMMON_HEADER_SIZE: usize = PARENT_OFFSET + PARENT_SIZE;

// Leaf header.
const LEAF_CELLS_COUNT_OFFSET: usize = COMMON_HEADER_SIZE;
const LEAF_CELLS_COUNT_SIZE: usize = 4;
const LEAF_NEXT_LEAF_OFFSET: usize = LEAF_CELLS_COUNT_OFFSET + LEAF_CELLS_COUNT_SIZE;
const LEAF_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_HEADER_SIZE: usize = LEAF_NEXT_LEAF_OFFSET + LEAF_NEXT_LEAF_SIZE;

// Leaf body.
const LEAF_KEY_SIZE: usize = 4;
pub const LEAF_CELL_SIZE: usize = LEAF_KEY_SIZE + RECORD_SIZE;
const LEAF_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_HEADER_SIZE;
pub const LEAF_MAX_CELLS: usize = LEAF_SPACE_FOR_CELLS / LEAF_CELL_SIZE;
pub const LEAF_RIGHT_SPLIT_COUNT: usize = (LEAF_MAX_CELLS + 1) / 2;
pub const LEAF_LEFT_SPLIT_COUNT: usize = (LEAF_MAX_CELLS + 1) - LEAF_RIGHT_SPLIT_COUNT;

// Internal header.
const INTERNAL_KEYS_COUNT_OFFSET: usize = COMMON_HEADER_SIZE;
const INTERNAL_KEYS_COUNT_SIZE: usize = 4;
const INTERNAL_RIGHT_CHILD_OFFSET: usize = INTERNAL_KEYS_COUNT_OFFSET + INTERNAL_KEYS_COUNT_SIZE;
const INTERNAL_RIGHT_CHILD_SIZE: usize = 4;
pub const INTERNAL_HEADER_SIZE: usize = INTERNAL_RIGHT_CHILD_OFFSET + INTERNAL_RIGHT_CHILD_SIZE;

// Internal body.
const INTERNAL_CHILD_SIZE: usize = 4;
const INTERNAL_KEY_SIZE: usize = 4;
pub const INTERNAL_CELL_SIZE: usize = INTERNAL_CHILD_SIZE + INTERNAL_KEY_SIZE;
/// Small on purpose: the reference keeps this low to exercise internal
/// splits under test, not to bound production capacity.
pub const INTERNAL_MAX_CELLS: usize = 3;

/// A page reinterpreted as a tree node. Borrows the page buffer for the
/// duration of the operation instead of copying it.
pub struct NodeView<'a> {
    pub data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> NodeView<'a> {
    pub fn new(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        NodeView { data }
    }

    // --- Common header ---

    pub fn node_type(&self) -> Result<NodeType, Error> {
        match self.data[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::Leaf),
            1 => Ok(NodeType::Internal),
            other => Err(crate::err!(Storage, "unknown node type byte: {}", other)),
        }
    }

    pub fn set_node_type(&mut self, t: NodeType) {
        self.data[NODE_TYPE_OFFSET] = match t {
            NodeType::Leaf => 0,
            NodeType::Internal => 1,
        };
    }

    pub fn is_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET] == 1
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root as u8;
    }

    pub fn parent(&self) -> u32 {
        read_u32(self.data, PARENT_OFFSET)
    }

    pub fn set_parent(&mut self, page_num: u32) {
        write_u32(self.data, PARENT_OFFSET, page_num);
    }

    // --- Leaf header ---

    pub fn leaf_cells_count(&self) -> u32 {
        read_u32(self.data, LEAF_CELLS_COUNT_OFFSET)
    }

    pub fn set_leaf_cells_count(&mut self, n: u32) {
        write_u32(self.data, LEAF_CELLS_COUNT_OFFSET, n);
    }

    pub fn leaf_next_leaf(&self) -> u32 {
        read_u32(self.data, LEAF_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_next_leaf(&mut self, page_num: u32) {
        write_u32(self.data, LEAF_NEXT_LEAF_OFFSET, page_num);
    }

    pub fn initialize_leaf(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_is_root(false);
        self.set_leaf_cells_count(0);
        self.set_leaf_next_leaf(NO_SIBLING);
    }

    // --- Leaf body ---

    fn leaf_cell_offset(&self, cell_num: usize) -> usize {
        LEAF_HEADER_SIZE + cell_num * LEAF_CELL_SIZE
    }

    pub fn leaf_cell(&self, cell_num: usize) -> &[u8] {
        let offset = self.leaf_cell_offset(cell_num);
        &self.data[offset..offset + LEAF_CELL_SIZE]
    }

    pub fn leaf_cell_mut(&mut self, cell_num: usize) -> &mut [u8] {
        let offset = self.leaf_cell_offset(cell_num);
        &mut self.data[offset..offset + LEAF_CELL_SIZE]
    }

    pub fn leaf_key(&self, cell_num: usize) -> u32 {
        read_u32(self.leaf_cell(cell_num), 0)
    }

    pub fn set_leaf_key(&mut self, cell_num: usize, key: u32) {
        write_u32(self.leaf_cell_mut(cell_num), 0, key);
    }

    pub fn leaf_value(&self, cell_num: usize) -> &[u8] {
        &self.leaf_cell(cell_num)[LEAF_KEY_SIZE..]
    }

    pub fn set_leaf_value(&mut self, cell_num: usize, value: &[u8]) -> Result<(), Error> {
        if value.len() != RECORD_SIZE {
            return Err(crate::err!(
                Storage,
                "value size mismatch: expected {}, got {}",
                RECORD_SIZE,
                value.len()
            ));
        }
        self.leaf_cell_mut(cell_num)[LEAF_KEY_SIZE..].copy_from_slice(value);
        Ok(())
    }

    /// Shifts cells `[from, to)` right by one slot, making room at `from`.
    pub fn leaf_shift_cells_right(&mut self, from: usize, to: usize) {
        for i in (from..to).rev() {
            let offset = self.leaf_cell_offset(i);
            self.data.copy_within(offset..offset + LEAF_CELL_SIZE, offset + LEAF_CELL_SIZE);
        }
    }

    // --- Internal header ---

    pub fn internal_keys_count(&self) -> u32 {
        read_u32(self.data, INTERNAL_KEYS_COUNT_OFFSET)
    }

    pub fn set_internal_keys_count(&mut self, n: u32) {
        write_u32(self.data, INTERNAL_KEYS_COUNT_OFFSET, n);
    }

    pub fn internal_right_child(&self) -> u32 {
        read_u32(self.data, INTERNAL_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_right_child(&mut self, page_num: u32) {
        write_u32(self.data, INTERNAL_RIGHT_CHILD_OFFSET, page_num);
    }

    pub fn initialize_internal(&mut self) {
        self.set_node_type(NodeType::Internal);
        self.set_is_root(false);
        self.set_internal_keys_count(0);
        // The root page number is 0; omitting this would falsely make an
        // uninitialized internal node a parent of the root.
        self.set_internal_right_child(INVALID_PAGE_NUM);
    }

    // --- Internal body ---

    fn internal_cell_offset(&self, cell_num: usize) -> usize {
        INTERNAL_HEADER_SIZE + cell_num * INTERNAL_CELL_SIZE
    }

    pub fn internal_cell(&self, cell_num: usize) -> &[u8] {
        let offset = self.internal_cell_offset(cell_num);
        &self.data[offset..offset + INTERNAL_CELL_SIZE]
    }

    pub fn internal_cell_mut(&mut self, cell_num: usize) -> &mut [u8] {
        let offset = self.internal_cell_offset(cell_num);
        &mut self.data[offset..offset + INTERNAL_CELL_SIZE]
    }

    /// Child pointer for index `child_num`; `child_num == keys_count` maps
    /// to the right child.
    pub fn internal_child(&self, child_num: u32) -> u32 {
        let keys_count = self.internal_keys_count();
        if child_num == keys_count {
            self.internal_right_child()
        } else {
            read_u32(self.internal_cell(child_num as usize), 0)
        }
    }

    pub fn set_internal_child(&mut self, child_num: u32, page_num: u32) {
        let keys_count = self.internal_keys_count();
        if child_num == keys_count {
            self.set_internal_right_child(page_num);
        } else {
            write_u32(self.internal_cell_mut(child_num as usize), 0, page_num);
        }
    }

    pub fn internal_key(&self, key_num: u32) -> u32 {
        read_u32(self.internal_cell(key_num as usize), INTERNAL_CHILD_SIZE)
    }

    pub fn set_internal_key(&mut self, key_num: u32, key: u32) {
        write_u32(self.internal_cell_mut(key_num as usize), INTERNAL_CHILD_SIZE, key);
    }

    /// Shifts cells `[from, to)` right by one slot, making room at `from`.
    pub fn internal_shift_cells_right(&mut self, from: u32, to: u32) {
        for i in (from..to).rev() {
            let offset = self.internal_cell_offset(i as usize);
            self.data
                .copy_within(offset..offset + INTERNAL_CELL_SIZE, offset + INTERNAL_CELL_SIZE);
        }
    }

    /// Finds the smallest index `i` with `key(i) >= key` (binary search over
    /// `keys_count` keys); may equal `keys_count` (route to the right
    /// child).
    pub fn internal_find_child_index(&self, key: u32) -> u32 {
        let mut min = 0u32;
        let mut max = self.internal_keys_count();
        while min < max {
            let mid = min + (max - min) / 2;
            if self.internal_key(mid) >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }

    /// Finds the smallest index `i` with `key(i) >= key` among
    /// `cells_count` leaf cells; equal to `cells_count` if `key` exceeds
    /// every key present.
    pub fn leaf_find_cell_index(&self, key: u32) -> u32 {
        let mut min = 0u32;
        let mut max = self.leaf_cells_count();
        while min < max {
            let mid = min + (max - min) / 2;
            if self.leaf_key(mid as usize) == key {
                return mid;
            } else if key < self.leaf_key(mid as usize) {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_page() -> Box<[u8; PAGE_SIZE]> {
        Box::new([0u8; PAGE_SIZE])
    }

    #[test]
    fn leaf_max_cells_matches_reference_width() {
        // A 4096-byte page with 293-byte records holds 13 leaf cells.
        assert_eq!(LEAF_MAX_CELLS, 13);
    }

    #[test]
    fn initializes_leaf_with_expected_defaults() {
        let mut page = blank_page();
        let mut node = NodeView::new(&mut page);
        node.initialize_leaf();
        assert_eq!(node.node_type().unwrap(), NodeType::Leaf);
        assert!(!node.is_root());
        assert_eq!(node.leaf_cells_count(), 0);
        assert_eq!(node.leaf_next_leaf(), NO_SIBLING);
    }

    #[test]
    fn initializes_internal_with_invalid_right_child_sentinel() {
        let mut page = blank_page();
        let mut node = NodeView::new(&mut page);
        node.initialize_internal();
        assert_eq!(node.node_type().unwrap(), NodeType::Internal);
        assert_eq!(node.internal_right_child(), INVALID_PAGE_NUM);
        assert_eq!(node.internal_keys_count(), 0);
    }

    #[test]
    fn leaf_cell_round_trips_key_and_value() {
        let mut page = blank_page();
        let mut node = NodeView::new(&mut page);
        node.initialize_leaf();
        node.set_leaf_cells_count(1);
        node.set_leaf_key(0, 42);
        let value = [7u8; RECORD_SIZE];
        node.set_leaf_value(0, &value).unwrap();
        assert_eq!(node.leaf_key(0), 42);
        assert_eq!(node.leaf_value(0), &value[..]);
    }

    #[test]
    fn internal_child_maps_last_index_to_right_child() {
        let mut page = blank_page();
        let mut node = NodeView::new(&mut page);
        node.initialize_internal();
        node.set_internal_keys_count(1);
        node.set_internal_child(0, 5);
        node.set_internal_key(0, 10);
        node.set_internal_right_child(6);
        assert_eq!(node.internal_child(0), 5);
        assert_eq!(node.internal_child(1), 6);
    }

    #[test]
    fn leaf_find_cell_index_locates_insertion_slot() {
        let mut page = blank_page();
        let mut node = NodeView::new(&mut page);
        node.initialize_leaf();
        node.set_leaf_cells_count(3);
        node.set_leaf_key(0, 1);
        node.set_leaf_key(1, 3);
        node.set_leaf_key(2, 5);
        assert_eq!(node.leaf_find_cell_index(3), 1);
        assert_eq!(node.leaf_find_cell_index(4), 2);
        assert_eq!(node.leaf_find_cell_index(0), 0);
        assert_eq!(node.leaf_find_cell_index(6), 3);
    }
}
