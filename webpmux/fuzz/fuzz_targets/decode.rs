#![no_main]

use libfuzzer_sys::fuzz_target;
use webpmux::{ChunkRecord, ContainerWriter, Error, MemorySink};

fuzz_target!(|data: &[u8]| {
    let records = match webpmux::decode_container(data) {
        Ok(records) => records,
        Err(error) => {
            assert!(!error.is_retryable(), "in-memory input returned an IO error: {error}");
            #[cfg(fuzzing_repro)]
            eprintln!("webpmux returned an error: {error}\n{error:?}");
            return;
        }
    };

    // Chunks are decoded without layout checks, so the writer may reject them.
    match reencode(&records) {
        Ok(reencoded) => assert_eq!(webpmux::decode_container(&reencoded[..]).unwrap(), records),
        Err(error) => {
            assert!(!error.is_retryable());
            #[cfg(fuzzing_repro)]
            eprintln!("decoded chunks could not be re-encoded: {error}\n{error:?}");
        }
    }
});

fn reencode(records: &[ChunkRecord]) -> Result<Vec<u8>, Error> {
    let mut writer = ContainerWriter::new(MemorySink::new());
    writer.write_header()?;
    for record in records {
        writer.write_chunk(record)?;
    }
    writer.close()?;
    Ok(writer.into_inner().into_bytes().to_vec())
}
