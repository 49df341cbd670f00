//! Daily report files.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

/// `<prefix>_Z<z>_<date>_<YYYYmmdd_HHMMSS>.txt`
pub fn report_file_name(prefix: &str, z_number: u32, report_date: NaiveDate, now: NaiveDateTime) -> String {
    format!(
        "{prefix}_Z{z_number}_{report_date}_{}.txt",
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Write `body` under `output_dir`, creating it if needed. An existing file
/// is never overwritten; a numeric suffix is added instead. The name is
/// claimed with `create_new`, so concurrent writers never share a file.
pub fn write_report(output_dir: &Path, file_name: &str, body: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, "txt"));
    let mut path = output_dir.join(file_name);
    let mut n = 2;
    let mut file = loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                path = output_dir.join(format!("{stem}_{n}.{ext}"));
                n += 1;
            }
            Err(e) => return Err(e),
        }
    };

    file.write_all(body.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_layout() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(21, 5, 9)
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            report_file_name("analize", 950, day, now),
            "analize_Z950_2024-01-15_20240115_210509.txt"
        );
    }

    #[test]
    fn existing_report_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let first = write_report(&out, "r.txt", "one").unwrap();
        let second = write_report(&out, "r.txt", "two").unwrap();
        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "r_2.txt");
        assert_eq!(std::fs::read_to_string(first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "two");
    }

    #[test]
    fn concurrent_writers_never_share_a_file() {
        use std::collections::BTreeSet;
        use std::sync::{Arc, Barrier};

        const WRITERS: usize = 8;
        for round in 0..50 {
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("reports");
            let barrier = Arc::new(Barrier::new(WRITERS));

            let paths: Vec<PathBuf> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..WRITERS)
                    .map(|i| {
                        let barrier = Arc::clone(&barrier);
                        let out = &out;
                        s.spawn(move || {
                            barrier.wait();
                            write_report(out, "r.txt", &format!("writer {i}")).unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let distinct: BTreeSet<_> = paths.iter().collect();
            assert_eq!(distinct.len(), WRITERS, "round {round}: {paths:?}");

            let bodies: BTreeSet<String> = paths
                .iter()
                .map(|p| std::fs::read_to_string(p).unwrap())
                .collect();
            let expected: BTreeSet<String> = (0..WRITERS).map(|i| format!("writer {i}")).collect();
            assert_eq!(bodies, expected, "round {round}");
            assert_eq!(std::fs::read_dir(&out).unwrap().count(), WRITERS);
        }
    }
}
