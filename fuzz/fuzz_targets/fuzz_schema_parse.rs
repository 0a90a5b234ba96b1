#![no_main]

use bqlite_core::schema::parse_schema;
use bqlite_core::TableSchema;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(definition) = std::str::from_utf8(data) {
        if definition.len() > 10_000 {
            return;
        }

        // Accepted definitions must render back to DDL that parses again
        if let Ok(fields) = parse_schema(definition) {
            let ddl = TableSchema::new(fields).to_ddl();
            assert!(parse_schema(&ddl).is_ok(), "rendered DDL {:?} does not parse", ddl);
        }
    }
});
