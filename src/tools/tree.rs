//! Static Huffman code tree.
//!
//! The tree is built once per file from a frequency table, flattened into
//! the archive header, and restored from the header on expansion.  Flattened
//! form is a pre-order bit sequence (1 = internal, 0 = leaf) followed by the
//! leaf values in left-to-right order.  Every internal node has exactly two
//! children, so a tree over n leaves always has 2n-1 nodes.

use bit_vec::BitVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use crate::Error;
use super::bits::{bits_to_bytes_lsb0,bytes_to_bits_lsb0};
use super::freq::FreqTable;

/// most leaves possible is 256, so most nodes possible is 511
const MAX_NODES: u16 = 511;

/// Nodes of the code tree.  Frequencies only matter while building;
/// a restored tree carries zeroes there.
pub enum Node {
    Leaf { value: u8, frequency: u64 },
    Internal { frequency: u64, left: Box<Node>, right: Box<Node> }
}

impl Node {
    fn frequency(&self) -> u64 {
        match self {
            Node::Leaf { frequency, .. } => *frequency,
            Node::Internal { frequency, .. } => *frequency
        }
    }
}

/// Heap entry ordered for min-extraction, ties broken by insertion
/// sequence so that repeated runs merge in the same order.
struct HeapNode {
    node: Node,
    seq: usize
}

impl Ord for HeapNode {
    fn cmp(&self, rhs: &Self) -> Ordering {
        (rhs.node.frequency(),rhs.seq).cmp(&(self.node.frequency(),self.seq))
    }
}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

impl PartialEq for HeapNode {
    fn eq(&self, rhs: &Self) -> bool {
        self.cmp(rhs) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

/// Serialized form of the tree as it appears in the archive header.
/// Shape bytes are packed LSB-first with zero padding at the tail.
#[derive(PartialEq,Debug)]
pub struct FlatTree {
    pub node_count: u16,
    pub shape: Vec<u8>,
    pub leaves: Vec<u8>
}

/// Code tree plus the code table derived from it.  The table is fixed
/// at construction, there is no rescaling or adaptation afterwards.
pub struct Tree {
    root: Node,
    codes: Vec<Option<BitVec>>
}

impl Tree {
    /// Build the code tree for a frequency table by repeatedly merging
    /// the two least frequent nodes.  Needs at least two distinct values.
    pub fn build(freq: &FreqTable) -> Result<Self,Error> {
        if freq.distinct() < 2 {
            return Err(Error::InsufficientAlphabet);
        }
        let mut heap = BinaryHeap::new();
        let mut seq = 0;
        for (value,frequency) in freq.iter_present() {
            heap.push(HeapNode { node: Node::Leaf { value, frequency }, seq });
            seq += 1;
        }
        while heap.len() > 1 {
            // the guard above means these cannot panic
            let first = heap.pop().unwrap();
            let second = heap.pop().unwrap();
            let merged = Node::Internal {
                frequency: first.node.frequency() + second.node.frequency(),
                left: Box::new(first.node),
                right: Box::new(second.node)
            };
            heap.push(HeapNode { node: merged, seq });
            seq += 1;
        }
        Ok(Self::from_root(heap.pop().unwrap().node))
    }
    /// Rebuild a tree from its flattened form.  The shape must describe a
    /// strict binary tree whose first node is internal, with exactly one
    /// leaf value per 0 bit and no value appearing twice.
    pub fn restore(flat: &FlatTree) -> Result<Self,Error> {
        if flat.node_count > MAX_NODES {
            return Err(Error::MalformedTree);
        }
        let mut shape = bytes_to_bits_lsb0(&flat.shape);
        if shape.len() < flat.node_count as usize {
            return Err(Error::MalformedTree);
        }
        shape.truncate(flat.node_count as usize);
        let mut bit_pos = 0;
        let mut leaf_pos = 0;
        let mut seen = [false;256];
        let root = restore_node(&shape,&flat.leaves,&mut bit_pos,&mut leaf_pos,&mut seen)?;
        if let Node::Leaf {..} = root {
            return Err(Error::MalformedTree);
        }
        if bit_pos != shape.len() || leaf_pos != flat.leaves.len() {
            return Err(Error::MalformedTree);
        }
        Ok(Self::from_root(root))
    }
    /// wrap a finished root and derive the code table from it
    fn from_root(root: Node) -> Self {
        let mut codes: Vec<Option<BitVec>> = vec![None;256];
        let mut path = BitVec::new();
        derive_codes(&root,&mut path,&mut codes);
        Self { root, codes }
    }
    /// Flatten for the archive header: pre-order shape bits, leaf
    /// values in left-to-right order.
    pub fn flatten(&self) -> FlatTree {
        let mut shape = BitVec::new();
        let mut leaves = Vec::new();
        flatten_node(&self.root,&mut shape,&mut leaves);
        FlatTree {
            node_count: shape.len() as u16,
            shape: bits_to_bytes_lsb0(&shape),
            leaves
        }
    }
    /// code for a byte value, root choice first, `None` if the value
    /// never occurred
    pub fn code(&self,value: u8) -> Option<&BitVec> {
        self.codes[value as usize].as_ref()
    }
    pub fn root(&self) -> &Node {
        &self.root
    }
}

fn flatten_node(node: &Node,shape: &mut BitVec,leaves: &mut Vec<u8>) {
    match node {
        Node::Leaf { value, .. } => {
            shape.push(false);
            leaves.push(*value);
        },
        Node::Internal { left, right, .. } => {
            shape.push(true);
            flatten_node(left,shape,leaves);
            flatten_node(right,shape,leaves);
        }
    }
}

fn restore_node(shape: &BitVec,leaves: &[u8],bit_pos: &mut usize,leaf_pos: &mut usize,seen: &mut [bool;256]) -> Result<Node,Error> {
    let internal = match shape.get(*bit_pos) {
        Some(bit) => bit,
        None => return Err(Error::MalformedTree)
    };
    *bit_pos += 1;
    if internal {
        let left = restore_node(shape,leaves,bit_pos,leaf_pos,seen)?;
        let right = restore_node(shape,leaves,bit_pos,leaf_pos,seen)?;
        return Ok(Node::Internal { frequency: 0, left: Box::new(left), right: Box::new(right) });
    }
    match leaves.get(*leaf_pos) {
        Some(value) => {
            *leaf_pos += 1;
            if seen[*value as usize] {
                return Err(Error::MalformedTree);
            }
            seen[*value as usize] = true;
            Ok(Node::Leaf { value: *value, frequency: 0 })
        },
        None => Err(Error::MalformedTree)
    }
}

/// walk the tree accumulating the path, 0 for left and 1 for right,
/// and record the path at each leaf
fn derive_codes(node: &Node,path: &mut BitVec,codes: &mut Vec<Option<BitVec>>) {
    match node {
        Node::Leaf { value, .. } => {
            codes[*value as usize] = Some(path.clone());
        },
        Node::Internal { left, right, .. } => {
            path.push(false);
            derive_codes(left,path,codes);
            path.pop();
            path.push(true);
            derive_codes(right,path,codes);
            path.pop();
        }
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn table_from(data: &[u8]) -> FreqTable {
    let mut freq = FreqTable::new();
    freq.accumulate(data);
    freq
}

#[cfg(test)]
fn code_bits(tree: &Tree,value: u8) -> Vec<u8> {
    tree.code(value).expect("value has no code").iter().map(|bit| bit as u8).collect()
}

#[test]
fn two_symbol_tree() {
    let tree = Tree::build(&table_from("xy".as_bytes())).expect("build failed");
    let flat = tree.flatten();
    assert_eq!(flat.node_count,3);
    assert_eq!(flat.shape,vec![0x01]);
    assert_eq!(flat.leaves,vec![0x78,0x79]);
    assert_eq!(code_bits(&tree,b'x'),vec![0]);
    assert_eq!(code_bits(&tree,b'y'),vec![1]);
}

#[test]
fn known_shape_and_codes() {
    let tree = Tree::build(&table_from("ab ab cab!".as_bytes())).expect("build failed");
    let flat = tree.flatten();
    assert_eq!(flat.node_count,9);
    assert_eq!(flat.shape,hex::decode("4b00").unwrap());
    assert_eq!(flat.leaves,hex::decode("2021636162").unwrap());
    assert_eq!(code_bits(&tree,b' '),vec![0,0]);
    assert_eq!(code_bits(&tree,b'!'),vec![0,1,0]);
    assert_eq!(code_bits(&tree,b'c'),vec![0,1,1]);
    assert_eq!(code_bits(&tree,b'a'),vec![1,0]);
    assert_eq!(code_bits(&tree,b'b'),vec![1,1]);
}

#[test]
fn code_lengths_are_optimal() {
    // a:3 b:3 space:2 c:1 !:1 gives an optimal weighted length of 22 bits
    let data = "ab ab cab!".as_bytes();
    let freq = table_from(data);
    let tree = Tree::build(&freq).expect("build failed");
    let mut weighted = 0;
    for (value,count) in freq.iter_present() {
        weighted += count * tree.code(value).expect("value has no code").len() as u64;
    }
    assert_eq!(weighted,22);
}

#[test]
fn insufficient_alphabet() {
    match Tree::build(&table_from(&[])) {
        Err(Error::InsufficientAlphabet) => {},
        _ => panic!("empty input should not build")
    }
    match Tree::build(&table_from(&[7;100])) {
        Err(Error::InsufficientAlphabet) => {},
        _ => panic!("uniform input should not build")
    }
}

#[test]
fn flatten_restore_inverts() {
    let tree = Tree::build(&table_from("the quick brown fox jumps over the lazy dog".as_bytes())).expect("build failed");
    let flat = tree.flatten();
    let restored = Tree::restore(&flat).expect("restore failed");
    assert_eq!(restored.flatten(),flat);
    for value in 0..=255 {
        assert_eq!(tree.code(value),restored.code(value));
    }
}

#[test]
fn codes_are_prefix_free() {
    let tree = Tree::build(&table_from("the quick brown fox jumps over the lazy dog".as_bytes())).expect("build failed");
    let codes: Vec<BitVec> = (0..=255).filter_map(|value| tree.code(value).cloned()).collect();
    for i in 0..codes.len() {
        for j in 0..codes.len() {
            if i == j || codes[i].len() > codes[j].len() {
                continue;
            }
            let is_prefix = (0..codes[i].len()).all(|k| codes[i].get(k) == codes[j].get(k));
            assert!(!is_prefix,"code {} is a prefix of code {}",i,j);
        }
    }
}

#[test]
fn rejects_leaf_first() {
    // shape bits 0,1,1
    let flat = FlatTree { node_count: 3, shape: vec![0x06], leaves: vec![0x78,0x79] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("leaf root should not restore")
    }
}

#[test]
fn rejects_duplicate_leaves() {
    let flat = FlatTree { node_count: 3, shape: vec![0x01], leaves: vec![0x41,0x41] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("duplicate leaf should not restore")
    }
}

#[test]
fn rejects_leaf_shortage() {
    let flat = FlatTree { node_count: 3, shape: vec![0x01], leaves: vec![0x41] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("missing leaf should not restore")
    }
}

#[test]
fn rejects_leaf_surplus() {
    let flat = FlatTree { node_count: 3, shape: vec![0x01], leaves: vec![0x41,0x42,0x43] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("extra leaf should not restore")
    }
}

#[test]
fn rejects_dangling_internal() {
    // shape bits 1,1,0 announce children that never arrive
    let flat = FlatTree { node_count: 3, shape: vec![0x03], leaves: vec![0x41] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("incomplete shape should not restore")
    }
}

#[test]
fn rejects_oversized_node_count() {
    let flat = FlatTree { node_count: 5000, shape: vec![0xff;625], leaves: vec![] };
    match Tree::restore(&flat) {
        Err(Error::MalformedTree) => {},
        _ => panic!("oversized tree should not restore")
    }
}

#[test]
fn full_alphabet_tree() {
    let mut data = Vec::new();
    for value in 0..=255 {
        data.push(value);
        data.push(value);
    }
    let tree = Tree::build(&table_from(&data)).expect("build failed");
    let flat = tree.flatten();
    assert_eq!(flat.node_count,511);
    assert_eq!(flat.leaves.len(),256);
    let restored = Tree::restore(&flat).expect("restore failed");
    assert_eq!(restored.flatten(),flat);
}
