//! Huffman Compression
//!
//! Static Huffman coding: symbol frequencies are counted once, a tree is built
//! by repeatedly joining the two least frequent nodes, and each symbol is replaced
//! by its path from the root (left is 0, right is 1).
//!
//! * Ties in the queue are broken by creation order, leaves first in symbol order,
//!   so identical input always gives an identical tree
//! * Input with a single distinct symbol gives a tree that is just a leaf, in which case
//!   every symbol is coded as one 0 bit
//! * The serialized form stores the frequency table rather than the tree, the reader
//!   rebuilds the same tree from it

use bit_vec::BitVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use crate::{Coder,EncodedMessage,Error,DYNERR};

const NUM_SYMBOLS: usize = 256;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// return error if file is larger
    pub max_file_size: u64
}

pub const STD_OPTIONS: Options = Options {
    max_file_size: u32::MAX as u64
};

/// Node of the code tree.  Internal nodes own both children, and their frequency
/// is the sum of the children's frequencies.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Node {
    Leaf { symbol: u8, frequency: u64 },
    Internal { left: Box<Node>, right: Box<Node>, frequency: u64 }
}

impl Node {
    fn join(left: Node,right: Node) -> Self {
        Self::Internal {
            frequency: left.frequency() + right.frequency(),
            left: Box::new(left),
            right: Box::new(right)
        }
    }
    pub fn frequency(&self) -> u64 {
        match self {
            Self::Leaf { frequency, .. } => *frequency,
            Self::Internal { frequency, .. } => *frequency
        }
    }
    pub fn is_leaf(&self) -> bool {
        matches!(self,Self::Leaf { .. })
    }
    /// total number of nodes in the tree rooted here
    pub fn count(&self) -> usize {
        let mut ans = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            ans += 1;
            if let Self::Internal { left, right, .. } = node {
                stack.push(left.as_ref());
                stack.push(right.as_ref());
            }
        }
        ans
    }
    /// frequency of each symbol as recorded in the leaves, indexed by symbol
    pub fn frequencies(&self) -> [u64;NUM_SYMBOLS] {
        let mut ans = [0;NUM_SYMBOLS];
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf { symbol, frequency } => ans[*symbol as usize] = *frequency,
                Self::Internal { left, right, .. } => {
                    stack.push(left.as_ref());
                    stack.push(right.as_ref());
                }
            }
        }
        ans
    }
    /// Codeword for each symbol, indexed by symbol, `None` if the symbol is not in the tree.
    /// Depth first, with one path buffer that is cut back to the parent's depth before each step.
    pub fn codewords(&self) -> Vec<Option<BitVec>> {
        let mut ans: Vec<Option<BitVec>> = vec![None;NUM_SYMBOLS];
        if let Self::Leaf { symbol, .. } = self {
            ans[*symbol as usize] = Some(BitVec::from_elem(1,false));
            return ans;
        }
        let mut path = BitVec::new();
        let mut stack: Vec<(&Node,usize,Option<bool>)> = vec![(self,0,None)];
        while let Some((node,depth,step)) = stack.pop() {
            path.truncate(depth);
            if let Some(bit) = step {
                path.push(bit);
            }
            match node {
                Self::Leaf { symbol, .. } => ans[*symbol as usize] = Some(path.clone()),
                Self::Internal { left, right, .. } => {
                    stack.push((right.as_ref(),path.len(),Some(true)));
                    stack.push((left.as_ref(),path.len(),Some(false)));
                }
            }
        }
        ans
    }
}

/// Build the tree from a frequency table, `None` if every frequency is 0.
/// Queue entries are (frequency,creation order), the order indexes `slots` where
/// the waiting nodes are parked.
fn build_tree(freq: &[u64;NUM_SYMBOLS]) -> Option<Node> {
    let mut slots: Vec<Option<Node>> = Vec::new();
    let mut queue = BinaryHeap::new();
    for (symbol,&frequency) in freq.iter().enumerate() {
        if frequency > 0 {
            queue.push(Reverse((frequency,slots.len())));
            slots.push(Some(Node::Leaf { symbol: symbol as u8, frequency }));
        }
    }
    log::debug!("building tree from {} leaves",queue.len());
    loop {
        let Reverse((_,a)) = queue.pop()?;
        let left = slots[a].take()?;
        let b = match queue.pop() {
            Some(Reverse((_,b))) => b,
            None => return Some(left)
        };
        let right = slots[b].take()?;
        let parent = Node::join(left,right);
        queue.push(Reverse((parent.frequency(),slots.len())));
        slots.push(Some(parent));
    }
}

/// The code tree along with the concatenated codewords.
/// The tree is `None` only for empty input.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct HuffmanMessage {
    tree: Option<Node>,
    bits: BitVec
}

/// read `N` bytes at `ptr` and advance it
fn take<const N: usize>(buf: &[u8],ptr: &mut usize) -> Result<[u8;N],Error> {
    let chunk = buf.get(*ptr..*ptr+N).ok_or(Error::FileFormatMismatch)?;
    let mut ans = [0;N];
    ans.copy_from_slice(chunk);
    *ptr += N;
    Ok(ans)
}

impl HuffmanMessage {
    pub fn new(tree: Option<Node>,bits: BitVec) -> Self {
        Self {
            tree,
            bits
        }
    }
    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }
    pub fn bits(&self) -> &BitVec {
        &self.bits
    }
    /// Serialize: 2 byte BE symbol count, then 1 byte symbol and 4 byte BE frequency
    /// for each symbol in ascending order, then 8 byte BE bit count, then the packed bits.
    pub fn to_bytes(&self) -> Result<Vec<u8>,Error> {
        let freq = match &self.tree {
            Some(root) => root.frequencies(),
            None => [0;NUM_SYMBOLS]
        };
        let present: Vec<(usize,u64)> = freq.iter().enumerate().filter(|(_,f)| **f > 0).map(|(s,f)| (s,*f)).collect();
        let packed = self.bits.to_bytes();
        let mut ans = Vec::with_capacity(2 + 5*present.len() + 8 + packed.len());
        ans.extend_from_slice(&(present.len() as u16).to_be_bytes());
        for (symbol,frequency) in present {
            let frequency = u32::try_from(frequency).map_err(|_| Error::FileTooLarge)?;
            ans.push(symbol as u8);
            ans.extend_from_slice(&frequency.to_be_bytes());
        }
        ans.extend_from_slice(&(self.bits.len() as u64).to_be_bytes());
        ans.extend_from_slice(&packed);
        Ok(ans)
    }
    /// Parse the form written by `to_bytes`, rebuilding the tree from the frequency table.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        let mut ptr = 0;
        let n = u16::from_be_bytes(take::<2>(buf,&mut ptr)?) as usize;
        if n > NUM_SYMBOLS {
            log::error!("frequency table claims {} symbols",n);
            return Err(Error::FileFormatMismatch);
        }
        let mut freq = [0;NUM_SYMBOLS];
        for _i in 0..n {
            let [symbol] = take::<1>(buf,&mut ptr)?;
            let frequency = u32::from_be_bytes(take::<4>(buf,&mut ptr)?) as u64;
            if frequency == 0 || freq[symbol as usize] != 0 {
                log::error!("bad frequency table entry for symbol {}",symbol);
                return Err(Error::FileFormatMismatch);
            }
            freq[symbol as usize] = frequency;
        }
        let bit_count = usize::try_from(u64::from_be_bytes(take::<8>(buf,&mut ptr)?)).map_err(|_| Error::FileFormatMismatch)?;
        let byte_count = bit_count / 8 + (bit_count % 8 != 0) as usize;
        if buf.len() - ptr != byte_count {
            log::error!("expected {} bytes of codes, found {}",byte_count,buf.len() - ptr);
            return Err(Error::FileFormatMismatch);
        }
        let mut bits = BitVec::from_bytes(&buf[ptr..]);
        bits.truncate(bit_count);
        Ok(Self::new(build_tree(&freq),bits))
    }
}

impl EncodedMessage for HuffmanMessage {
    fn size(&self) -> usize {
        let nodes = self.tree.as_ref().map_or(0,Node::count);
        self.bits.len() / 8 + (self.bits.len() % 8 != 0) as usize + nodes
    }
}

/// The Huffman coder, it has no settings.
#[derive(Clone,Copy,Debug,Default)]
pub struct Huffman;

impl Coder for Huffman {
    type Message = HuffmanMessage;
    fn encode(&self,symbols: &[u8]) -> HuffmanMessage {
        let mut freq = [0;NUM_SYMBOLS];
        for s in symbols {
            freq[*s as usize] += 1;
        }
        let tree = match build_tree(&freq) {
            Some(root) => root,
            None => return HuffmanMessage::new(None,BitVec::new())
        };
        let book = tree.codewords();
        let mut bits = BitVec::new();
        for s in symbols {
            let code = book[*s as usize].as_ref().expect("every input symbol has a leaf");
            bits.extend(code.iter());
        }
        log::debug!("{} symbols coded in {} bits",symbols.len(),bits.len());
        HuffmanMessage::new(Some(tree),bits)
    }
    fn decode(&self,message: &HuffmanMessage) -> Result<Vec<u8>,Error> {
        let root = match &message.tree {
            Some(root) => root,
            None if message.bits.is_empty() => return Ok(Vec::new()),
            None => return Err(Error::InvalidCode)
        };
        let mut ans = Vec::new();
        if let Node::Leaf { symbol, .. } = root {
            for bit in message.bits.iter() {
                if bit {
                    return Err(Error::InvalidCode);
                }
                ans.push(*symbol);
            }
        } else {
            let mut node = root;
            for bit in message.bits.iter() {
                node = match node {
                    Node::Internal { left, right, .. } => match bit {
                        true => right.as_ref(),
                        false => left.as_ref()
                    },
                    Node::Leaf { .. } => return Err(Error::InvalidCode)
                };
                if let Node::Leaf { symbol, .. } = node {
                    ans.push(*symbol);
                    node = root;
                }
            }
            if !std::ptr::eq(node,root) {
                log::error!("bits ran out after {} symbols",ans.len());
                return Err(Error::TruncatedCode);
            }
        }
        if ans.len() as u64 != root.frequency() {
            return Err(Error::LengthMismatch { expected: root.frequency() as usize, actual: ans.len() });
        }
        Ok(ans)
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let expanded_length = expanded_in.seek(SeekFrom::End(0))?;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    expanded_in.seek(SeekFrom::Start(0))?;
    let mut ibuf = Vec::new();
    expanded_in.read_to_end(&mut ibuf)?;
    let obuf = Huffman.encode(&ibuf).to_bytes()?;
    compressed_out.write_all(&obuf)?;
    compressed_out.flush()?;
    Ok((expanded_length,obuf.len() as u64))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let compressed_size = compressed_in.seek(SeekFrom::End(0))?;
    compressed_in.seek(SeekFrom::Start(0))?;
    let mut ibuf = Vec::new();
    compressed_in.read_to_end(&mut ibuf)?;
    let message = HuffmanMessage::from_bytes(&ibuf)?;
    if message.tree().map_or(0,Node::frequency) > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    let obuf = Huffman.decode(&message)?;
    expanded_out.write_all(&obuf)?;
    expanded_out.flush()?;
    Ok((compressed_size,obuf.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}


// *************** TESTS *****************

#[cfg(test)]
fn bits_from_str(s: &str) -> BitVec {
    s.chars().map(|c| c=='1').collect()
}

#[test]
fn empty_input() {
    let message = Huffman.encode(&[]);
    assert!(message.tree().is_none());
    assert!(message.bits().is_empty());
    assert_eq!(message.size(),0);
    assert_eq!(Huffman.decode(&message).expect("decoding failed"),Vec::<u8>::new());
}

#[test]
fn single_symbol() {
    let message = Huffman.encode(b"zzzz");
    assert_eq!(message.tree(),Some(&Node::Leaf { symbol: b'z', frequency: 4 }));
    assert_eq!(*message.bits(),bits_from_str("0000"));
    assert_eq!(message.size(),2);
    assert_eq!(Huffman.decode(&message).expect("decoding failed"),b"zzzz".to_vec());
}

#[test]
fn compression_works() {
    // c and b are joined first, c popped first so it goes left
    let message = Huffman.encode(b"aaaabbc");
    let book = message.tree().expect("no tree").codewords();
    assert_eq!(book[b'a' as usize],Some(bits_from_str("1")));
    assert_eq!(book[b'b' as usize],Some(bits_from_str("01")));
    assert_eq!(book[b'c' as usize],Some(bits_from_str("00")));
    assert_eq!(book[b'd' as usize],None);
    assert_eq!(*message.bits(),bits_from_str("1111010100"));
    assert_eq!(message.size(),2 + 5);
    assert_eq!(Huffman.decode(&message).expect("decoding failed"),b"aaaabbc".to_vec());
}

#[test]
fn every_symbol_coded() {
    let test_data: Vec<u8> = (0..=255).chain(0..64).collect();
    let message = Huffman.encode(&test_data);
    let book = message.tree().expect("no tree").codewords();
    assert!(book.iter().all(|code| code.is_some()));
    let total: usize = test_data.iter().map(|s| book[*s as usize].as_ref().map_or(0,|c| c.len())).sum();
    assert_eq!(message.bits().len(),total);
}

#[test]
fn deterministic() {
    let test_data = "12345123456789123456789\n".as_bytes();
    assert_eq!(Huffman.encode(test_data),Huffman.encode(test_data));
}

#[test]
fn bad_messages_rejected() {
    let message = Huffman.encode(b"aaaabbc");
    let tree = message.tree().cloned();

    let mut bits = message.bits().clone();
    bits.truncate(bits.len() - 1);
    let truncated = HuffmanMessage::new(tree.clone(),bits);
    assert!(matches!(Huffman.decode(&truncated),Err(Error::TruncatedCode)));

    let mut bits = message.bits().clone();
    bits.push(true);
    let extra = HuffmanMessage::new(tree,bits);
    assert!(matches!(Huffman.decode(&extra),Err(Error::LengthMismatch { expected: 7, actual: 8 })));

    let leaf = HuffmanMessage::new(Some(Node::Leaf { symbol: b'z', frequency: 2 }),bits_from_str("01"));
    assert!(matches!(Huffman.decode(&leaf),Err(Error::InvalidCode)));

    let no_tree = HuffmanMessage::new(None,bits_from_str("0"));
    assert!(matches!(Huffman.decode(&no_tree),Err(Error::InvalidCode)));
}

#[test]
fn framing_works() {
    let message = Huffman.encode(b"aaaabbc");
    let frame = message.to_bytes().expect("framing failed");
    let expected = "0003 6100000004 6200000002 6300000001 000000000000000A F500";
    assert_eq!(frame,hex::decode(expected.replace(" ","")).unwrap());
    assert_eq!(HuffmanMessage::from_bytes(&frame).expect("parsing failed"),message);

    let message = Huffman.encode(&[]);
    let frame = message.to_bytes().expect("framing failed");
    assert_eq!(frame,hex::decode("0000 0000000000000000".replace(" ","")).unwrap());
    assert_eq!(HuffmanMessage::from_bytes(&frame).expect("parsing failed"),message);
}

#[test]
fn bad_frames_rejected() {
    assert!(matches!(HuffmanMessage::from_bytes(&[0]),Err(Error::FileFormatMismatch)));
    // missing a byte of codes
    let frame = hex::decode("0001 7A00000009 0000000000000009 00".replace(" ","")).unwrap();
    assert!(matches!(HuffmanMessage::from_bytes(&frame),Err(Error::FileFormatMismatch)));
    // symbol listed twice
    let frame = hex::decode("0002 7A00000001 7A00000001 0000000000000002 00".replace(" ","")).unwrap();
    assert!(matches!(HuffmanMessage::from_bytes(&frame),Err(Error::FileFormatMismatch)));
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data: Vec<u8> = (0..=255).collect();
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}
