#![no_main]

use bqlite_sql::preprocess;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        if sql.len() > 10_000 {
            return;
        }

        // Rewrites must never panic and must be stable once applied
        let once = preprocess(sql);
        let twice = preprocess(&once);
        assert_eq!(once, twice);
    }
});
