//! Tools
//!
//! This module contains the reusable pieces of the Huffman machinery:
//! byte frequency accounting, the code tree, and bit-level packing.

pub mod bits;
pub mod freq;
pub mod tree;
