#![no_main]

use std::io::Cursor;

use cfgsync::ConfigSnapshot;
use cfgsync::snapshot::{TextSnapshotReader, TextSnapshotWriter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // === Reading arbitrary bytes must fail cleanly, never panic ===
    let mut reader = TextSnapshotReader::new(Cursor::new(data));
    let Ok(snapshot) = ConfigSnapshot::deserialize(&mut reader) else {
        return;
    };

    // === Anything accepted must be internally consistent ===
    for (_, value) in &snapshot {
        assert!(value.verify());
    }

    // === And must survive being written back ===
    let mut writer = TextSnapshotWriter::new(Vec::new());
    snapshot.serialize(&mut writer).unwrap();
    let mut reader = TextSnapshotReader::new(Cursor::new(writer.into_inner()));
    let restored = ConfigSnapshot::deserialize(&mut reader).unwrap();
    assert_eq!(restored, snapshot);
});
