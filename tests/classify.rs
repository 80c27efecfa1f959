//! End-to-end classification tests over crafted buffers.

use codescan::{
    classify, load_signature_database, Arch, Bitness, ByteRange, Endianness, ScanRegion,
    SignatureDatabase, StatusCode,
};
use std::sync::Arc;

fn db() -> Arc<SignatureDatabase> {
    load_signature_database(env!("CARGO_MANIFEST_DIR")).unwrap()
}

/// One 16-byte x86-64 routine: prologue, nops, a call back to its own
/// start, epilogue, ret. Dense in indicative opcodes and free of zero bytes.
const INTEL64_UNIT: [u8; 16] = [
    0x55, 0x48, 0x89, 0xE5, 0x90, 0x90, 0x90, 0xE8, 0xF4, 0xFF, 0xFF, 0xFF, 0x90, 0x90, 0x5D,
    0xC3,
];

fn intel64_stream(bytes: usize) -> Vec<u8> {
    assert_eq!(bytes % 16, 0);
    INTEL64_UNIT.repeat(bytes / 16)
}

fn ascii_filler(bytes: usize) -> Vec<u8> {
    b"Names, prices, and a short description of every item on the list; "
        .iter()
        .copied()
        .cycle()
        .take(bytes)
        .collect()
}

/// Non-printable, high-entropy filler (all bytes >= 0x80, no repeats within
/// a cell).
fn entropy_filler(bytes: usize) -> Vec<u8> {
    (0..bytes).map(|i| 0x80 + ((i * 7) % 0x80) as u8).collect()
}

fn intel64() -> codescan::CodeInfo {
    codescan::CodeInfo {
        arch: Arch::Intel,
        bitness: Bitness::Bits64,
        endianness: Endianness::Little,
    }
}

#[test]
fn test_mixed_layout_exact_partition() {
    let mut src = ascii_filler(256);
    src.extend(vec![0u8; 256]);
    src.extend(entropy_filler(256));
    src.extend(vec![0u8; 64]);
    src.extend(intel64_stream(256));
    assert_eq!(src.len(), 1088);

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();

    assert_eq!(result.ascii, vec![ByteRange::new(0, 256)]);
    assert_eq!(
        result.zeroblock,
        vec![ByteRange::new(256, 512), ByteRange::new(768, 832)]
    );
    assert_eq!(result.high_entropy, vec![ByteRange::new(512, 768)]);
    assert!(result.generic_data.is_empty());
    assert_eq!(result.coderegions, vec![ByteRange::code(832, 1088, intel64())]);
    assert_eq!(result.partition_violation(0, 1088), None);
}

#[test]
fn test_boundary_refined_to_the_byte() {
    // 200 bytes of text, then high-entropy data: the transition sits inside
    // a cell, and the reported boundary must be exact anyway.
    let mut src = ascii_filler(200);
    src.extend(entropy_filler(200));

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(result.ascii, vec![ByteRange::new(0, 200)]);
    assert_eq!(result.high_entropy, vec![ByteRange::new(200, 400)]);
}

#[test]
fn test_short_tail_of_random_data() {
    // 200 bytes of text followed by 50 bytes of noise; the split lands
    // mid-cell and both ranges come back byte-exact.
    let mut src = ascii_filler(200);
    src.extend(entropy_filler(50));

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(result.ascii, vec![ByteRange::new(0, 200)]);
    assert_eq!(result.high_entropy, vec![ByteRange::new(200, 250)]);
    assert_eq!(result.partition_violation(0, 250), None);
}

#[test]
fn test_code_island_between_zero_blocks() {
    let mut src = vec![0u8; 64];
    src.extend(intel64_stream(128));
    src.extend(vec![0u8; 64]);

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(
        result.zeroblock,
        vec![ByteRange::new(0, 64), ByteRange::new(192, 256)]
    );
    assert_eq!(result.coderegions, vec![ByteRange::code(64, 192, intel64())]);
}

#[test]
fn test_short_zero_gap_bridged_into_code() {
    // Padding of 64 zero bytes between two runs of the same architecture
    // belongs to the surrounding code region.
    let mut src = intel64_stream(128);
    src.extend(vec![0u8; 64]);
    src.extend(intel64_stream(128));

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(result.coderegions, vec![ByteRange::code(0, 320, intel64())]);
    assert!(result.zeroblock.is_empty());
}

#[test]
fn test_long_zero_gap_splits_code() {
    let mut src = intel64_stream(128);
    src.extend(vec![0u8; 192]);
    src.extend(intel64_stream(128));

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(
        result.coderegions,
        vec![
            ByteRange::code(0, 128, intel64()),
            ByteRange::code(320, 448, intel64())
        ]
    );
    assert_eq!(result.zeroblock, vec![ByteRange::new(128, 320)]);
}

#[test]
fn test_code_region_cap() {
    // 25 code islands separated by gaps too long to bridge; only the first
    // 20 keep their architecture tag, the rest degrade to generic data.
    let mut src = Vec::new();
    for _ in 0..25 {
        src.extend(vec![0u8; 192]);
        src.extend(intel64_stream(128));
    }
    assert_eq!(src.len(), 8000);

    let result = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(result.coderegions.len(), 20);
    assert_eq!(result.generic_data.len(), 5);
    assert_eq!(result.coderegions[0], ByteRange::code(192, 320, intel64()));
    assert_eq!(result.generic_data[4], ByteRange::new(24 * 320 + 192, 8000));
    assert_eq!(result.partition_violation(0, 8000), None);
}

#[test]
fn test_aggressive_mode_finds_weaker_code() {
    // A stream with one indicative 64-bit opcode byte in four: confident
    // enough for aggressive mode, not for normal mode.
    let src: Vec<u8> = [0x01u8, 0x02, 0x03, 0x4C].repeat(64);

    let normal = classify(&src, ScanRegion::WHOLE, false, &db()).unwrap();
    assert_eq!(normal.generic_data, vec![ByteRange::new(0, 256)]);
    assert!(normal.coderegions.is_empty());

    let aggressive = classify(&src, ScanRegion::WHOLE, true, &db()).unwrap();
    assert_eq!(aggressive.coderegions, vec![ByteRange::code(0, 256, intel64())]);
    assert!(aggressive.generic_data.is_empty());
}

#[test]
fn test_region_conventions() {
    let src = ascii_filler(500);
    let db = db();

    // {0, 0} means the whole source.
    let whole = classify(&src, ScanRegion::WHOLE, false, &db).unwrap();
    let explicit = classify(&src, ScanRegion::new(0, 500), false, &db).unwrap();
    assert_eq!(whole, explicit);

    let err = classify(&src, ScanRegion::new(200, 200), false, &db).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BadUserInput);
    let err = classify(&src, ScanRegion::new(0, 501), false, &db).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BadUserInput);
}

#[test]
fn test_subregion_scan_is_bounded() {
    let mut src = vec![0u8; 64];
    src.extend(intel64_stream(128));
    src.extend(vec![0u8; 64]);

    let result = classify(&src, ScanRegion::new(32, 224), false, &db()).unwrap();
    assert_eq!(result.partition_violation(32, 224), None);
    for r in result.all_ranges() {
        assert!(r.from >= 32 && r.to <= 224);
    }
}

/// Small deterministic PRNG (xorshift64*), so the property run is
/// reproducible without extra dependencies.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

#[test]
fn test_partition_property_over_random_buffers() {
    let db = db();
    let mut rng = Rng(0x00C0_DE5C_A11E_D001);

    for _ in 0..50 {
        let len = (rng.next() % 5000 + 1) as usize;
        let mut src = vec![0u8; len];
        for b in src.iter_mut() {
            // Mix of zero stretches and arbitrary bytes.
            let v = rng.next();
            *b = if v % 5 == 0 { 0 } else { (v >> 8) as u8 };
        }

        for aggressive in [false, true] {
            let result = classify(&src, ScanRegion::WHOLE, aggressive, &db).unwrap();
            assert_eq!(result.partition_violation(0, len as u64), None);
        }
    }
}

#[test]
fn test_results_are_deterministic() {
    let mut src = ascii_filler(300);
    src.extend(entropy_filler(300));
    src.extend(intel64_stream(160));
    let db = db();

    let first = classify(&src, ScanRegion::WHOLE, true, &db).unwrap();
    for _ in 0..5 {
        assert_eq!(classify(&src, ScanRegion::WHOLE, true, &db).unwrap(), first);
    }
}
