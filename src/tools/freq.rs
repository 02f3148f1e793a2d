//! Byte frequency accounting for the counting pass.

use std::io::Read;

const CHUNK_SIZE: usize = 65536;

/// Occurrence counts for every possible byte value.
/// The total count doubles as the original file length, so the
/// header length field and the payload always agree.
pub struct FreqTable {
    counts: [u64;256],
    total: u64
}

impl FreqTable {
    pub fn new() -> Self {
        Self {
            counts: [0;256],
            total: 0
        }
    }
    /// count every byte of `reader` until end of input, chunk by chunk
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self,std::io::Error> {
        let mut ans = Self::new();
        let mut buf = vec![0;CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            ans.accumulate(&buf[0..n]);
        }
        Ok(ans)
    }
    /// fold one chunk of input into the counts
    pub fn accumulate(&mut self,chunk: &[u8]) {
        for val in chunk {
            self.counts[*val as usize] += 1;
        }
        self.total += chunk.len() as u64;
    }
    #[cfg(test)]
    pub fn count(&self,value: u8) -> u64 {
        self.counts[value as usize]
    }
    /// number of byte values with a nonzero count
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|c| **c > 0).count()
    }
    /// number of bytes counted so far
    pub fn total(&self) -> u64 {
        self.total
    }
    /// (value,count) pairs in ascending byte order, zero counts skipped
    pub fn iter_present(&self) -> impl Iterator<Item = (u8,u64)> + '_ {
        self.counts.iter().enumerate().filter(|(_v,c)| **c > 0).map(|(v,c)| (v as u8,*c))
    }
}

#[test]
fn counting() {
    let mut freq = FreqTable::new();
    freq.accumulate("ab ab ".as_bytes());
    freq.accumulate("cab!".as_bytes());
    assert_eq!(freq.count(b'a'),3);
    assert_eq!(freq.count(b'b'),3);
    assert_eq!(freq.count(b' '),2);
    assert_eq!(freq.count(b'c'),1);
    assert_eq!(freq.count(b'!'),1);
    assert_eq!(freq.count(b'z'),0);
    assert_eq!(freq.distinct(),5);
    assert_eq!(freq.total(),10);
}

#[test]
fn iteration_is_ordered() {
    let mut freq = FreqTable::new();
    freq.accumulate("ab ab cab!".as_bytes());
    let present: Vec<(u8,u64)> = freq.iter_present().collect();
    assert_eq!(present,vec![(b' ',2),(b'!',1),(b'a',3),(b'b',3),(b'c',1)]);
}

#[test]
fn reader_matches_slices() {
    let data = "I am Sam. Sam I am.".as_bytes();
    let mut cursor = std::io::Cursor::new(data);
    let from_reader = FreqTable::from_reader(&mut cursor).expect("count failed");
    let mut from_slice = FreqTable::new();
    from_slice.accumulate(data);
    for value in 0..=255 {
        assert_eq!(from_reader.count(value),from_slice.count(value));
    }
    assert_eq!(from_reader.total(),from_slice.total());
}
