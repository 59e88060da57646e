//! Decoder fuzz target: arbitrary bytes go through the record deserializer and the bounded
//! fixed-point decoder. Both must return a value or an error without panicking, and a decoded
//! record must serialize back to the bytes it consumed.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
struct Frame {
  seq: uint16;
  gain: half? [-8..8];
  name: string(0..6);
  when: datetime?;
  span: timespan;
  points: list<Point>(0..3);
  extra: optional Point;
}
struct Point { x: int8 [-100..100]; y: float [-1..1]; }
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = fieldpack::parse_schema(SCHEMA) else { return };
    if let Ok(value) = fieldpack::deserialize(&schema, data) {
        let bytes = fieldpack::serialize(&schema, &value).expect("decoded value must serialize");
        assert_eq!(bytes, data);
    }
    let mut cursor = 0;
    while fieldpack::bits::Bits12::decode_bounded(data, &mut cursor, 0.5, 1.0, -100.0, 100.0).is_ok() {}
    assert!(cursor <= data.len() * 8);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
