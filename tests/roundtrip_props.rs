use bit_vec::BitVec;
use bytecoders::huffman::{self,Huffman};
use bytecoders::lz77::{self,Lz77,Triple};
use bytecoders::{Coder,EncodedMessage};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_lz77_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        window in 0usize..64,
        lookahead in 0usize..=255
    ) {
        let coder = Lz77::new(window,lookahead).unwrap();
        let message = coder.encode(&data);
        let covered: usize = message.triples().iter().map(Triple::span).sum();
        prop_assert_eq!(covered, data.len());
        prop_assert_eq!(coder.decode(&message).unwrap(), data);
    }

    #[test]
    fn prop_lz77_small_alphabet_roundtrip(
        data in proptest::collection::vec(0u8..3, 0..2048)
    ) {
        // few symbols means long, overlapping matches
        let coder = Lz77::default();
        let message = coder.encode(&data);
        prop_assert!(message.triples().iter().all(|t| t.distance <= 65535 && t.length <= 255));
        prop_assert_eq!(coder.decode(&message).unwrap(), data);
    }

    #[test]
    fn prop_lz77_frame_roundtrip(
        data in proptest::collection::vec(0u8..8, 0..1024)
    ) {
        let compressed = lz77::compress_slice(&data, &lz77::STD_OPTIONS).unwrap();
        prop_assert_eq!(compressed.len(), 4 + Lz77::default().encode(&data).size());
        prop_assert_eq!(lz77::expand_slice(&compressed, &lz77::STD_OPTIONS).unwrap(), data);
    }

    #[test]
    fn prop_huffman_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..2048)
    ) {
        let message = Huffman.encode(&data);
        prop_assert_eq!(Huffman.decode(&message).unwrap(), data);
    }

    #[test]
    fn prop_huffman_codes_prefix_free(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        skew in 0u8..8
    ) {
        // shifting some bytes down makes the frequencies lopsided
        let data: Vec<u8> = data.iter().map(|b| if *b % 8 < skew { b % 4 } else { *b }).collect();
        let message = Huffman.encode(&data);
        let tree = message.tree().unwrap();
        let codes: Vec<BitVec> = tree.codewords().into_iter().flatten().collect();
        prop_assert_eq!(tree.count(), 2*codes.len() - 1);
        for (i,a) in codes.iter().enumerate() {
            for (j,b) in codes.iter().enumerate() {
                if i != j && a.len() <= b.len() {
                    prop_assert!(!b.iter().take(a.len()).eq(a.iter()), "{:?} is a prefix of {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn prop_huffman_frame_roundtrip(
        data in proptest::collection::vec(0u8..16, 0..2048)
    ) {
        let compressed = huffman::compress_slice(&data, &huffman::STD_OPTIONS).unwrap();
        prop_assert_eq!(huffman::expand_slice(&compressed, &huffman::STD_OPTIONS).unwrap(), data);
    }

    #[test]
    fn prop_encoding_is_deterministic(
        data in proptest::collection::vec(any::<u8>(), 0..512)
    ) {
        prop_assert_eq!(Lz77::default().encode(&data), Lz77::default().encode(&data));
        prop_assert_eq!(Huffman.encode(&data), Huffman.encode(&data));
    }
}
