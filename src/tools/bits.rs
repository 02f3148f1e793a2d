//! Bit-level packing shared by the tree codec and the payload coder.
//!
//! Everything here is LSB-first: the first bit of a sequence occupies the
//! least significant bit of the first byte.  Integer fields of the file
//! header do not pass through this module.

use bit_vec::BitVec;
use std::io::{Read,Write,BufReader,BufWriter};

/// bit_vec crate only handles MSB, this assumes starting alignment
pub fn bits_to_bytes_lsb0(bits: &BitVec) -> Vec<u8> {
    let mut ans = Vec::new();
    let byte_count = bits.len() / 8;
    let rem = bits.len() % 8;
    for i in 0..byte_count {
        let mut val = 0;
        for b in 0..8 {
            val |= (bits.get(i*8 + b).unwrap() as u8) << b;
        }
        ans.push(val);
    }
    if rem > 0 {
        let mut val = 0;
        for b in 0..rem {
            val |= (bits.get(byte_count*8 + b).unwrap() as u8) << b;
        }
        ans.push(val);
    }
    ans
}

/// bit_vec crate only handles MSB, this assumes starting alignment
pub fn bytes_to_bits_lsb0(bytes: &[u8]) -> BitVec {
    let mut ans = BitVec::new();
    for i in 0..bytes.len() {
        let val = bytes[i];
        for b in 0..8 {
            ans.push((val & (1 << b)) != 0);
        }
    }
    ans
}

/// Accumulates code bits and writes whole bytes as they complete.
/// The payload never backtracks, so unlike an adaptive coder this
/// drains strictly forward and needs no `Seek` on the sink.
pub struct BitPacker {
    bits: BitVec,
    ptr: usize,
    count: u64
}

/// Pulls bits off a byte stream one refill byte at a time.
pub struct BitSource {
    bits: BitVec,
    ptr: usize
}

impl BitPacker {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0,
            count: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        self.ptr = 0;
    }
    /// append one code and write out any bytes that completed
    pub fn put_code<W: Write>(&mut self,code: &BitVec,writer: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        for bit in code.iter() {
            self.bits.push(bit);
        }
        self.count += code.len() as u64;
        while self.bits.len() - self.ptr >= 8 {
            let mut val = 0;
            for b in 0..8 {
                val |= (self.bits.get(self.ptr + b).unwrap() as u8) << b;
            }
            writer.write_all(&[val])?;
            self.ptr += 8;
        }
        if self.ptr > 512 {
            self.drop_leading_bits();
        }
        Ok(())
    }
    /// zero-pad the trailing partial byte, if any, and write it out
    pub fn finish<W: Write>(&mut self,writer: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        if self.bits.len() > self.ptr {
            let mut val = 0;
            for b in 0..self.bits.len() - self.ptr {
                val |= (self.bits.get(self.ptr + b).unwrap() as u8) << b;
            }
            writer.write_all(&[val])?;
            self.ptr = self.bits.len();
        }
        Ok(())
    }
    /// bits appended so far, padding not included
    pub fn bit_count(&self) -> u64 {
        self.count
    }
}

impl BitSource {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        self.ptr = 0;
    }
    /// Get the next bit reading from the stream as needed.
    /// End of input surfaces as `ErrorKind::UnexpectedEof`.
    /// `reader` should not be advanced outside this function until decoding is done.
    pub fn get_bit<R: Read>(&mut self,reader: &mut BufReader<R>) -> Result<u8,std::io::Error> {
        match self.bits.get(self.ptr) {
            Some(bit) => {
                self.ptr += 1;
                Ok(bit as u8)
            },
            None => {
                let mut by: [u8;1] = [0];
                match reader.read_exact(&mut by) {
                    Ok(()) => {
                        if self.bits.len() > 512 {
                            self.drop_leading_bits();
                        }
                        self.bits.append(&mut bytes_to_bits_lsb0(&by));
                        self.get_bit(reader)
                    },
                    Err(e) => Err(e)
                }
            }
        }
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn bits_from(pattern: &[u8]) -> BitVec {
    let mut ans = BitVec::new();
    for b in pattern {
        ans.push(*b != 0);
    }
    ans
}

#[test]
fn helpers_invert() {
    let bits = bits_from(&[1,0,1,1,0,0,1,0, 1,1,0,0,0,1,1,1]);
    let bytes = bits_to_bytes_lsb0(&bits);
    assert_eq!(bytes,vec![0x4d,0xe3]);
    assert_eq!(bytes_to_bits_lsb0(&bytes),bits);
}

#[test]
fn helper_pads_with_zeroes() {
    let bits = bits_from(&[0,1,1,0,1]);
    assert_eq!(bits_to_bytes_lsb0(&bits),vec![0x16]);
}

#[test]
fn packer_drains_and_pads() {
    let mut cursor: std::io::Cursor<Vec<u8>> = std::io::Cursor::new(Vec::new());
    let mut writer = BufWriter::new(&mut cursor);
    let mut packer = BitPacker::new();
    packer.put_code(&bits_from(&[1,0,1,1,0,0,1,0]),&mut writer).expect("put failed");
    packer.put_code(&bits_from(&[1,1,0]),&mut writer).expect("put failed");
    packer.finish(&mut writer).expect("finish failed");
    writer.into_inner().expect("flush failed");
    assert_eq!(cursor.into_inner(),vec![0x4d,0x03]);
    assert_eq!(packer.bit_count(),11);
}

#[test]
fn source_reads_back() {
    let bytes: Vec<u8> = vec![0x4d];
    let mut reader = BufReader::new(std::io::Cursor::new(bytes));
    let mut source = BitSource::new();
    let mut bits = Vec::new();
    for _i in 0..8 {
        bits.push(source.get_bit(&mut reader).expect("get failed"));
    }
    assert_eq!(bits,vec![1,0,1,1,0,0,1,0]);
    match source.get_bit(&mut reader) {
        Err(e) if e.kind()==std::io::ErrorKind::UnexpectedEof => {},
        _ => panic!("expected end of input")
    }
}
