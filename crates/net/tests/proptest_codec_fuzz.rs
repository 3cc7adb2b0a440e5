//! Property-based fuzzing of the wire codec.

use picocraft_net::{
    pack_position, unpack_position, varint_len, zigzag_decode, zigzag_encode, CodecError, Reader,
    Writer,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn varint_round_trips(value in any::<i32>()) {
        let mut w = Writer::new();
        w.varint(value);
        prop_assert_eq!(w.len(), varint_len(value));
        let mut r = Reader::new(w.as_slice());
        prop_assert_eq!(r.varint().unwrap(), value);
        prop_assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn varint_length_matches_bit_width(value in any::<u32>()) {
        // ceil(bitlen / 7), minimum one byte.
        let bits = 32 - value.leading_zeros();
        let expected = ((bits + 6) / 7).max(1) as usize;
        prop_assert_eq!(varint_len(value as i32), expected);
    }

    #[test]
    fn varlong_round_trips(value in any::<i64>()) {
        let mut w = Writer::new();
        w.varlong(value);
        let mut r = Reader::new(w.as_slice());
        prop_assert_eq!(r.varlong().unwrap(), value);
    }

    #[test]
    fn zigzag_round_trips(value in any::<i32>()) {
        prop_assert_eq!(zigzag_decode(zigzag_encode(value)), value);
    }

    #[test]
    fn signed_varint_round_trips(value in any::<i32>()) {
        let mut w = Writer::new();
        w.varint_signed(value);
        let mut r = Reader::new(w.as_slice());
        prop_assert_eq!(r.varint_signed().unwrap(), value);
    }

    #[test]
    fn position_round_trips(
        x in -33_554_432i32..=33_554_431,
        y in -2048i32..=2047,
        z in -33_554_432i32..=33_554_431,
    ) {
        prop_assert_eq!(unpack_position(pack_position(x, y, z)), (x, y, z));
    }

    #[test]
    fn strings_round_trip(s in "\\PC{0,64}") {
        let mut w = Writer::new();
        w.string(&s);
        let mut r = Reader::new(w.as_slice());
        prop_assert_eq!(r.string(1024).unwrap(), s);
    }

    #[test]
    fn string_truncation_keeps_stream_alignment(s in "[a-z]{0,64}", marker in any::<u8>()) {
        let mut w = Writer::new();
        w.string(&s);
        w.u8(marker);
        let buf = w.into_inner();
        let mut r = Reader::new(&buf);
        let truncated = r.string(8).unwrap();
        prop_assert_eq!(truncated.as_str(), &s[..s.len().min(8)]);
        prop_assert_eq!(r.u8().unwrap(), marker);
    }

    #[test]
    fn decoder_never_panics_on_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut r = Reader::new(&bytes);
        // Whatever the input, decoding returns a value or a clean error.
        let _ = r.varint();
        let mut r = Reader::new(&bytes);
        let _ = r.string(32);
        let mut r = Reader::new(&bytes);
        let _ = r.f64();
    }

    #[test]
    fn scalar_round_trips(a in any::<u16>(), b in any::<i64>(), c in any::<f64>()) {
        let mut w = Writer::new();
        w.u16(a).i64(b).f64(c);
        let buf = w.into_inner();
        let mut r = Reader::new(&buf);
        prop_assert_eq!(r.u16().unwrap(), a);
        prop_assert_eq!(r.i64().unwrap(), b);
        let back = r.f64().unwrap();
        prop_assert!(back == c || (back.is_nan() && c.is_nan()));
    }
}

#[test]
fn overlong_varint_is_malformed_not_a_panic() {
    let mut r = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
    assert_eq!(r.varint(), Err(CodecError::MalformedVarint));
}
