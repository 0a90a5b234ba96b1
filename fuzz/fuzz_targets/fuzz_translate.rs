#![no_main]

use bqlite_sql::translate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string (ignore invalid UTF-8)
    if let Ok(sql) = std::str::from_utf8(data) {
        // Limit query length to prevent timeout
        if sql.len() > 10_000 {
            return;
        }

        if let Ok(translation) = translate(sql) {
            let _ = translation.sql();
            let _ = translation.table_ref();
        }
    }
});
