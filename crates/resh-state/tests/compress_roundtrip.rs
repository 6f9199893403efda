use resh_state::compress::{CompressionAlgorithm, Compressor};
use resh_state::{Complete, SyncState};
use resh_test_utils::fixtures::data;

#[test]
fn compressor_roundtrip_zstd_and_lz4() {
    let payload_small = b"some small data that compresses a bit";
    let payload_large = vec![42u8; 4096];

    for (alg, data) in [
        (CompressionAlgorithm::Zstd, payload_small.as_slice()),
        (CompressionAlgorithm::Zstd, payload_large.as_slice()),
        (CompressionAlgorithm::Lz4, payload_small.as_slice()),
        (CompressionAlgorithm::Lz4, payload_large.as_slice()),
    ] {
        let c = Compressor::new(alg);
        let compressed = c.compress(data).expect("compress");
        let decompressed = c.decompress(&compressed).expect("decompress");
        assert_eq!(decompressed.as_slice(), data);
    }
}

#[test]
fn screen_diffs_shrink() {
    let mut complete = Complete::new(80, 24);
    complete.act(data::generate_text_lines(23).as_bytes());
    let diff = complete.init_diff().expect("diff");

    for alg in [CompressionAlgorithm::Zstd, CompressionAlgorithm::Lz4] {
        let c = Compressor::new(alg);
        let compressed = c.compress(&diff).expect("compress");
        assert!(compressed.len() < diff.len());
        assert_eq!(c.decompress(&compressed).expect("decompress"), diff);
    }
}

#[test]
fn corrupted_input_does_not_panic() {
    for alg in [CompressionAlgorithm::Zstd, CompressionAlgorithm::Lz4] {
        let c = Compressor::new(alg);
        let _ = c.decompress(&[0xFF, 0xFE, 0xFD, 0xFC, 0xFB]);
    }
}
