//! LZ77 Compression
//!
//! Greedy longest-match coding over a bounded history window.  Each step emits a
//! triple giving how far back the match starts, how many bytes it covers, and the
//! symbol that follows it.  The search is brute force, worst case O(n*window*lookahead),
//! which is fine for offline work on buffered files but not for real time streams.
//!
//! * This transforms buffers, not files (we expect files that are easily buffered)
//! * A match may run into the position being coded, so runs collapse into a single triple
//! * Among matches of equal length the nearest one is kept
//! * The serialized form is big endian: a 4 byte expanded length, then 6 bytes per triple

use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use crate::{Coder,EncodedMessage,Error,DYNERR};

/// bytes occupied by one serialized triple
pub const TRIPLE_WIDTH: usize = 6;
/// Literal byte written for a triple that has none.
/// Readers never trust this value, presence is inferred from the expanded length.
pub const NO_LITERAL: u8 = 0xff;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// maximum distance searched backward for a match, at most `u32::MAX`
    pub window: usize,
    /// maximum length of a match, at most 255
    pub lookahead: usize,
    /// return error if file is larger
    pub max_file_size: u64
}

pub const STD_OPTIONS: Options = Options {
    window: 65535,
    lookahead: 255,
    max_file_size: u32::MAX as u64
};

/// One unit of LZ77 output.
/// `distance==0 && length==0` is a bare literal.
/// Only the last triple of a message can lack a literal, that happens when
/// the match runs to the end of the input.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Triple {
    pub distance: usize,
    pub length: usize,
    pub literal: Option<u8>
}

impl Triple {
    pub fn literal(symbol: u8) -> Self {
        Self {
            distance: 0,
            length: 0,
            literal: Some(symbol)
        }
    }
    /// number of expanded bytes this triple accounts for
    pub fn span(&self) -> usize {
        self.length.saturating_add(self.literal.is_some() as usize)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.literal {
            Some(c) => write!(f,"({},{},{})",self.distance,self.length,c),
            None => write!(f,"({},{},-)",self.distance,self.length)
        }
    }
}

/// Triples in coding order, along with the length of the data they expand to.
/// The length has to be kept, because the last triple may or may not carry a literal.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Lz77Message {
    triples: Vec<Triple>,
    decoded_len: usize
}

impl Lz77Message {
    pub fn new(triples: Vec<Triple>,decoded_len: usize) -> Self {
        Self {
            triples,
            decoded_len
        }
    }
    pub fn num_triples(&self) -> usize {
        self.triples.len()
    }
    pub fn triple(&self,i: usize) -> Option<&Triple> {
        self.triples.get(i)
    }
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }
    /// Serialize: 4 byte BE expanded length, then per triple 4 byte BE distance,
    /// 1 byte length, 1 byte literal (`NO_LITERAL` if there is none).
    pub fn to_bytes(&self) -> Result<Vec<u8>,Error> {
        let decoded_len = u32::try_from(self.decoded_len).map_err(|_| Error::FileTooLarge)?;
        let mut ans = Vec::with_capacity(4 + self.size());
        ans.extend_from_slice(&decoded_len.to_be_bytes());
        for t in &self.triples {
            let distance = u32::try_from(t.distance).map_err(|_| Error::WindowTooLarge(t.distance))?;
            let length = u8::try_from(t.length).map_err(|_| Error::LookaheadTooLarge(t.length))?;
            ans.extend_from_slice(&distance.to_be_bytes());
            ans.push(length);
            ans.push(t.literal.unwrap_or(NO_LITERAL));
        }
        Ok(ans)
    }
    /// Parse the form written by `to_bytes`.  Every triple is taken to have a literal,
    /// except the last one when the lengths would otherwise overshoot by exactly one.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        if buf.len() < 4 || (buf.len() - 4) % TRIPLE_WIDTH != 0 {
            log::error!("LZ77 frame has {} bytes, not a header plus whole triples",buf.len());
            return Err(Error::FileFormatMismatch);
        }
        let decoded_len = u32::from_be_bytes([buf[0],buf[1],buf[2],buf[3]]) as usize;
        let mut triples = Vec::with_capacity((buf.len() - 4) / TRIPLE_WIDTH);
        let mut covered: usize = 0;
        for rec in buf[4..].chunks_exact(TRIPLE_WIDTH) {
            let t = Triple {
                distance: u32::from_be_bytes([rec[0],rec[1],rec[2],rec[3]]) as usize,
                length: rec[4] as usize,
                literal: Some(rec[5])
            };
            covered += t.span();
            triples.push(t);
        }
        if covered == decoded_len + 1 {
            match triples.last_mut() {
                Some(last) if last.length > 0 => last.literal = None,
                _ => return Err(Error::FileFormatMismatch)
            }
        } else if covered != decoded_len {
            log::error!("triples cover {} bytes, header declares {}",covered,decoded_len);
            return Err(Error::FileFormatMismatch);
        }
        log::debug!("parsed {} triples expanding to {} bytes",triples.len(),decoded_len);
        Ok(Self::new(triples,decoded_len))
    }
}

impl EncodedMessage for Lz77Message {
    fn size(&self) -> usize {
        self.triples.len() * TRIPLE_WIDTH
    }
}

/// The LZ77 coder, holds only its search limits.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Lz77 {
    window: usize,
    lookahead: usize
}

impl Default for Lz77 {
    fn default() -> Self {
        Self {
            window: STD_OPTIONS.window,
            lookahead: STD_OPTIONS.lookahead
        }
    }
}

impl Lz77 {
    /// Limits must fit the serialized triple, 32 bits for distance and 8 bits for length.
    /// Zero is allowed for either, and gives a coder that only emits literals.
    pub fn new(window: usize,lookahead: usize) -> Result<Self,Error> {
        if window > u32::MAX as usize {
            return Err(Error::WindowTooLarge(window));
        }
        if lookahead > u8::MAX as usize {
            return Err(Error::LookaheadTooLarge(lookahead));
        }
        Ok(Self {
            window,
            lookahead
        })
    }
    pub fn create(opt: &Options) -> Result<Self,Error> {
        Self::new(opt.window,opt.lookahead)
    }
    pub fn window(&self) -> usize {
        self.window
    }
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }
    /// Find the longest match for the run starting at `pos`, returns (distance,length).
    /// Candidates are tried nearest first, and only a strictly longer match displaces
    /// the one we have, so ties go to the smallest distance.
    fn longest_match(&self,symbols: &[u8],pos: usize) -> (usize,usize) {
        let cap = self.lookahead.min(symbols.len() - pos);
        let mut best = (0,0);
        if cap == 0 {
            return best;
        }
        let run = &symbols[pos..pos+cap];
        for candidate in (pos.saturating_sub(self.window)..pos).rev() {
            let len = symbols[candidate..].iter().zip(run).take_while(|(a,b)| a==b).count();
            if len > best.1 {
                best = (pos - candidate,len);
                if len == cap {
                    // cannot do better than this
                    break;
                }
            }
        }
        best
    }
}

impl Coder for Lz77 {
    type Message = Lz77Message;
    fn encode(&self,symbols: &[u8]) -> Lz77Message {
        let mut triples = Vec::new();
        let mut pos = 0;
        while pos < symbols.len() {
            let (distance,length) = self.longest_match(symbols,pos);
            let next = pos + length;
            let literal = symbols.get(next).copied();
            let t = Triple { distance, length, literal };
            log::trace!("{} at {}",t,pos);
            triples.push(t);
            pos = next + literal.is_some() as usize;
        }
        log::debug!("{} symbols coded as {} triples",symbols.len(),triples.len());
        Lz77Message::new(triples,symbols.len())
    }
    fn decode(&self,message: &Lz77Message) -> Result<Vec<u8>,Error> {
        let expected = message.decoded_len;
        let covered = message.triples.iter().fold(0,|acc: usize,t| acc.saturating_add(t.span()));
        let mut ans: Vec<u8> = Vec::with_capacity(covered.min(expected));
        for t in &message.triples {
            if t.length > 0 {
                if t.distance == 0 || t.distance > ans.len() {
                    log::error!("triple {} points before the start of the data",t);
                    return Err(Error::BadReference { position: ans.len(), distance: t.distance });
                }
                // ans.len() never exceeds expected here
                if t.length > expected - ans.len() {
                    return Err(Error::Overrun(expected));
                }
                // byte at a time, the source can run into bytes written by this same copy
                let start = ans.len() - t.distance;
                for k in start..start+t.length {
                    let c = ans[k];
                    ans.push(c);
                }
            }
            if let Some(c) = t.literal {
                if ans.len() >= expected {
                    return Err(Error::Overrun(expected));
                }
                ans.push(c);
            }
        }
        if ans.len() != expected {
            return Err(Error::LengthMismatch { expected, actual: ans.len() });
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
    let coder = Lz77::create(opt)?;
    let expanded_length = expanded_in.seek(SeekFrom::End(0))?;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    expanded_in.seek(SeekFrom::Start(0))?;
    let mut ibuf = Vec::new();
    expanded_in.read_to_end(&mut ibuf)?;
    log::debug!("coding with window {} and lookahead {}",coder.window(),coder.lookahead());
    let obuf = coder.encode(&ibuf).to_bytes()?;
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
    let coder = Lz77::create(opt)?;
    let compressed_size = compressed_in.seek(SeekFrom::End(0))?;
    compressed_in.seek(SeekFrom::Start(0))?;
    let mut ibuf = Vec::new();
    compressed_in.read_to_end(&mut ibuf)?;
    let message = Lz77Message::from_bytes(&ibuf)?;
    if message.decoded_len() as u64 > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    let obuf = coder.decode(&message)?;
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

#[test]
fn empty_input() {
    let coder = Lz77::default();
    let message = coder.encode(&[]);
    assert_eq!(message.num_triples(),0);
    assert_eq!(message.size(),0);
    assert_eq!(coder.decode(&message).expect("decoding failed"),Vec::<u8>::new());
}

#[test]
fn run_overlaps_itself() {
    let coder = Lz77::new(6,5).expect("bad limits");
    let message = coder.encode(b"aaaaaa");
    assert_eq!(message.triples(),&[
        Triple::literal(b'a'),
        Triple { distance: 1, length: 5, literal: None }
    ]);
    assert_eq!(coder.decode(&message).expect("decoding failed"),b"aaaaaa".to_vec());
}

#[test]
fn nearest_match_wins_ties() {
    let coder = Lz77::default();
    let message = coder.encode(b"abcXabcYabc");
    assert_eq!(message.num_triples(),6);
    assert_eq!(message.triple(4),Some(&Triple { distance: 4, length: 3, literal: Some(b'Y') }));
    assert_eq!(message.triple(5),Some(&Triple { distance: 4, length: 3, literal: None }));
    assert_eq!(message.triple(6),None);
}

#[test]
fn zero_window_emits_literals() {
    let test_data = "I am Sam. Sam I am.".as_bytes();
    let coder = Lz77::new(0,255).expect("bad limits");
    let message = coder.encode(test_data);
    assert_eq!(message.num_triples(),test_data.len());
    for (t,c) in message.triples().iter().zip(test_data) {
        assert_eq!(*t,Triple::literal(*c));
    }
    assert_eq!(coder.decode(&message).expect("decoding failed"),test_data.to_vec());
}

#[test]
fn triples_cover_input() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    for (window,lookahead) in [(65535,255),(8,4),(1,1),(3,0)] {
        let coder = Lz77::new(window,lookahead).expect("bad limits");
        let message = coder.encode(test_data);
        let covered: usize = message.triples().iter().map(Triple::span).sum();
        assert_eq!(covered,test_data.len());
        assert_eq!(message.decoded_len(),test_data.len());
        assert!(message.triples().iter().all(|t| t.distance <= window && t.length <= lookahead));
        assert_eq!(coder.decode(&message).expect("decoding failed"),test_data.to_vec());
    }
}

#[test]
fn repetition_compresses() {
    let test_data = "ab".repeat(1000);
    let coder = Lz77::default();
    let message = coder.encode(test_data.as_bytes());
    assert!(message.size() < test_data.len());
    assert_eq!(coder.decode(&message).expect("decoding failed"),test_data.as_bytes().to_vec());
}

#[test]
fn deterministic() {
    let test_data = "12345123456789123456789\n".as_bytes();
    let coder = Lz77::new(16,8).expect("bad limits");
    assert_eq!(coder.encode(test_data),coder.encode(test_data));
}

#[test]
fn limits_checked() {
    assert!(matches!(Lz77::new(65535,256),Err(Error::LookaheadTooLarge(256))));
    if let Some(window) = (u32::MAX as usize).checked_add(1) {
        assert!(matches!(Lz77::new(window,255),Err(Error::WindowTooLarge(_))));
    }
    assert!(Lz77::new(0,0).is_ok());
}

#[test]
fn bad_messages_rejected() {
    let coder = Lz77::default();
    let msg = Lz77Message::new(vec![Triple { distance: 2, length: 1, literal: Some(b'x') }],2);
    assert!(matches!(coder.decode(&msg),Err(Error::BadReference { position: 0, distance: 2 })));
    let msg = Lz77Message::new(vec![Triple::literal(b'a'),Triple { distance: 0, length: 3, literal: None }],4);
    assert!(matches!(coder.decode(&msg),Err(Error::BadReference { position: 1, distance: 0 })));
    let msg = Lz77Message::new(vec![Triple::literal(b'a')],2);
    assert!(matches!(coder.decode(&msg),Err(Error::LengthMismatch { expected: 2, actual: 1 })));
    let msg = Lz77Message::new(vec![Triple::literal(b'a'),Triple::literal(b'b')],1);
    assert!(matches!(coder.decode(&msg),Err(Error::Overrun(1))));
    let msg = Lz77Message::new(vec![Triple::literal(b'a'),Triple { distance: 1, length: usize::MAX, literal: None }],4);
    assert_eq!(msg.triple(1).map(Triple::span),Some(usize::MAX));
    assert!(matches!(coder.decode(&msg),Err(Error::Overrun(4))));
}

#[test]
fn framing_works() {
    let message = Lz77::new(6,5).expect("bad limits").encode(b"aaaaaa");
    let frame = message.to_bytes().expect("framing failed");
    assert_eq!(frame,hex::decode("00000006 000000000061 0000000105FF".replace(" ","")).unwrap());
    assert_eq!(Lz77Message::from_bytes(&frame).expect("parsing failed"),message);

    // a literal on the last triple is kept even if it equals the filler
    let message = Lz77::default().encode(&[0x41,0xff]);
    let frame = message.to_bytes().expect("framing failed");
    assert_eq!(frame,hex::decode("00000002 000000000041 0000000000FF".replace(" ","")).unwrap());
    assert_eq!(Lz77Message::from_bytes(&frame).expect("parsing failed"),message);
}

#[test]
fn bad_frames_rejected() {
    assert!(matches!(Lz77Message::from_bytes(&[0,0,0]),Err(Error::FileFormatMismatch)));
    assert!(matches!(Lz77Message::from_bytes(&hex::decode("00000001 0000000000".replace(" ","")).unwrap()),Err(Error::FileFormatMismatch)));
    // triples cover 2 bytes, header says 5
    assert!(matches!(Lz77Message::from_bytes(&hex::decode("00000005 000000000061 000000000062".replace(" ","")).unwrap()),Err(Error::FileFormatMismatch)));
    assert_eq!(Lz77Message::from_bytes(&[0,0,0,0]).expect("parsing failed").num_triples(),0);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed[0..4],[0u8,0,0,49]);
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let mut opt = STD_OPTIONS;
    opt.window = 4;
    opt.lookahead = 2;
    let compressed = compress_slice(test_data,&opt).expect("compression failed");
    let expanded = expand_slice(&compressed,&opt).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn size_limit() {
    let mut opt = STD_OPTIONS;
    opt.max_file_size = 4;
    assert!(compress_slice(b"12345",&opt).is_err());
    assert!(compress_slice(b"1234",&opt).is_ok());
}
