//! Static Huffman Compression
//!
//! This implements the `.par` archive format: classic two-pass Huffman
//! coding with the flattened code tree stored in the file header.  The
//! first pass counts byte frequencies, the second pass emits one code per
//! byte.  Expansion restores the tree from the header and walks it bit by
//! bit until the recorded original length has been produced.
//!
//! Layout of an archive:
//!
//! ```text
//! offset  size        field
//! 0       2           node count N of the code tree, big endian
//! 2       ceil(N/8)   shape bits, pre-order, 1 = internal and 0 = leaf,
//!                     packed LSB-first within each byte
//! ...     L           leaf values in left-to-right order, where L is the
//!                     number of 0 bits among the N shape bits
//! ...     8           length of the original file, big endian
//! ...     rest        payload, one code per original byte, packed
//!                     LSB-first, final byte zero-padded
//! ```
//!
//! Integer fields are big endian while bit packing is LSB-first; files
//! written by one convention cannot be read by the other, so both are part
//! of the format.  Trailing pad bits are never interpreted: the decoder
//! stops after exactly the recorded number of bytes.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter,ErrorKind};
use crate::Error;
use crate::tools::bits::{BitPacker,BitSource};
use crate::tools::freq::FreqTable;
use crate::tools::tree::{Tree,FlatTree,Node};

const CHUNK_SIZE: usize = 65536;

/// write the tree size, shape bytes, leaf values, and original length
fn write_header<W: Write>(writer: &mut W,flat: &FlatTree,original_length: u64) -> Result<(),Error> {
    writer.write_all(&flat.node_count.to_be_bytes())?;
    writer.write_all(&flat.shape)?;
    writer.write_all(&flat.leaves)?;
    writer.write_all(&original_length.to_be_bytes())?;
    Ok(())
}

/// read exactly `buf.len()` header bytes, classifying a short read as a
/// truncated archive
fn read_field<R: Read>(reader: &mut R,buf: &mut [u8]) -> Result<(),Error> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind()==ErrorKind::UnexpectedEof => Err(Error::TruncatedStream),
        Err(e) => Err(Error::IoFailure(e))
    }
}

/// number of leaves is the number of 0 bits among the first `count` shape bits
fn count_zero_bits(shape: &[u8],count: usize) -> usize {
    let mut ans = 0;
    for i in 0..count {
        if shape[i/8] & (1 << (i%8)) == 0 {
            ans += 1;
        }
    }
    ans
}

/// read the header fields and restore the code tree
fn read_header<R: Read>(reader: &mut R) -> Result<(Tree,u64),Error> {
    let mut word: [u8;2] = [0;2];
    read_field(reader,&mut word)?;
    let node_count = u16::from_be_bytes(word);
    let mut shape = vec![0;(node_count as usize + 7)/8];
    read_field(reader,&mut shape)?;
    let mut leaves = vec![0;count_zero_bits(&shape,node_count as usize)];
    read_field(reader,&mut leaves)?;
    let mut long: [u8;8] = [0;8];
    read_field(reader,&mut long)?;
    let original_length = u64::from_be_bytes(long);
    let tree = Tree::restore(&FlatTree { node_count, shape, leaves })?;
    Ok((tree,original_length))
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W) -> Result<(u64,u64),Error>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);

    log::debug!("counting pass");
    reader.seek(SeekFrom::Start(0))?;
    let freq = FreqTable::from_reader(&mut reader)?;
    let tree = Tree::build(&freq)?;
    let flat = tree.flatten();
    log::debug!("code tree has {} nodes and {} leaves",flat.node_count,flat.leaves.len());

    write_header(&mut writer,&flat,freq.total())?;

    log::debug!("encoding pass");
    reader.seek(SeekFrom::Start(0))?;
    let mut packer = BitPacker::new();
    let mut buf = vec![0;CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for i in 0..n {
            // the counting pass saw every byte, so the lookup cannot fail
            packer.put_code(tree.code(buf[i]).unwrap(),&mut writer)?;
        }
        log::trace!("encoded chunk of {} bytes",n);
    }
    packer.finish(&mut writer)?;
    log::debug!("payload holds {} code bits",packer.bit_count());
    writer.flush()?;
    Ok((freq.total(),writer.stream_position()?))
}

/// Main expansion function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(u64,u64),Error>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);

    let compressed_size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    let (tree,original_length) = read_header(&mut reader)?;
    log::debug!("expecting {} bytes of output",original_length);

    let mut source = BitSource::new();
    let mut produced: u64 = 0;
    while produced < original_length {
        let mut node = tree.root();
        loop {
            match node {
                Node::Leaf { value, .. } => {
                    writer.write_all(&[*value])?;
                    produced += 1;
                    break;
                },
                Node::Internal { left, right, .. } => {
                    let bit = match source.get_bit(&mut reader) {
                        Ok(bit) => bit,
                        Err(e) if e.kind()==ErrorKind::UnexpectedEof => return Err(Error::TruncatedStream),
                        Err(e) => return Err(Error::IoFailure(e))
                    };
                    node = match bit {
                        0 => left.as_ref(),
                        _ => right.as_ref()
                    };
                }
            }
        }
    }
    log::debug!("end of data, closing stream");
    writer.flush()?;
    Ok((compressed_size,writer.stream_position()?))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8]) -> Result<Vec<u8>,Error> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,Error> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[test]
fn compression_works() {
    // codes here are space 00, ! 010, c 011, a 10, b 11
    let test_data = "ab ab cab!".as_bytes();
    let par_str = "00 09 4B 00 20 21 63 61 62 00 00 00 00 00 00 00 0A 4D E3 16";
    let compressed = compress_slice(test_data).expect("compression failed");
    assert_eq!(compressed,hex::decode(par_str.replace(" ","")).unwrap());
}

#[test]
fn two_symbol_file() {
    let test_data = "xy".as_bytes();
    let par_str = "00 03 01 78 79 00 00 00 00 00 00 00 02 02";
    let compressed = compress_slice(test_data).expect("compression failed");
    assert_eq!(compressed,hex::decode(par_str.replace(" ","")).unwrap());
}

#[test]
fn expansion_works() {
    let par_str = "00 09 4B 00 20 21 63 61 62 00 00 00 00 00 00 00 0A 4D E3 16";
    let expanded = expand_slice(&hex::decode(par_str.replace(" ","")).unwrap()).expect("expansion failed");
    assert_eq!(expanded,"ab ab cab!".as_bytes().to_vec());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn binary_invertibility() {
    // all byte values with uneven frequencies
    let mut test_data = Vec::new();
    for i in 0..=255u8 {
        for _j in 0..1 + i as usize % 7 {
            test_data.push(i);
        }
    }
    let compressed = compress_slice(&test_data).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn repeated_compression_is_identical() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let first = compress_slice(test_data).expect("compression failed");
    let second = compress_slice(test_data).expect("compression failed");
    assert_eq!(first,second);
}

#[test]
fn compression_rewinds_input() {
    // the reader may come in mid-stream, both passes must still start at 0
    let test_data = "zzzzabcd".as_bytes();
    let mut src = Cursor::new(test_data);
    src.seek(SeekFrom::Start(4)).expect("seek failed");
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let (in_size,_) = compress(&mut src,&mut ans).expect("compression failed");
    let compressed = ans.into_inner();
    assert_eq!(in_size,8);
    assert_eq!(compressed,compress_slice(test_data).expect("compression failed"));
    assert_eq!(expand_slice(&compressed).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn empty_input_fails() {
    match compress_slice(&[]) {
        Err(Error::InsufficientAlphabet) => {},
        _ => panic!("empty input should not compress")
    }
}

#[test]
fn uniform_input_fails() {
    match compress_slice(&[7;32]) {
        Err(Error::InsufficientAlphabet) => {},
        _ => panic!("uniform input should not compress")
    }
}

#[test]
fn truncated_payload_fails() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let mut compressed = compress_slice(test_data).expect("compression failed");
    compressed.truncate(compressed.len()-2);
    match expand_slice(&compressed) {
        Err(Error::TruncatedStream) => {},
        _ => panic!("short payload should not expand")
    }
}

#[test]
fn truncated_header_fails() {
    let compressed = compress_slice("xy".as_bytes()).expect("compression failed");
    match expand_slice(&compressed[0..4]) {
        Err(Error::TruncatedStream) => {},
        _ => panic!("short header should not expand")
    }
}

#[test]
fn rejects_corrupt_shape() {
    // shape bits 0,1,1 put a leaf first
    let par_str = "00 03 06 41 00 00 00 00 00 00 00 01 00";
    match expand_slice(&hex::decode(par_str.replace(" ","")).unwrap()) {
        Err(Error::MalformedTree) => {},
        _ => panic!("corrupt shape should not expand")
    }
}

#[test]
fn zero_length_archive() {
    // valid tree, recorded length 0, no payload to read
    let par_str = "00 03 01 78 79 00 00 00 00 00 00 00 00";
    let expanded = expand_slice(&hex::decode(par_str.replace(" ","")).unwrap()).expect("expansion failed");
    assert_eq!(expanded.len(),0);
}
