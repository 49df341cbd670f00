//! Reading register and export files into clean text.

use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;

use crate::exit_codes::EXIT_USAGE;
use crate::CliError;

/// Read a file as UTF-8, falling back to `fallback` for legacy exports.
/// Control characters other than tab, CR and LF become spaces.
pub fn read_text(path: &Path, fallback: &'static Encoding) -> Result<String, CliError> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(|e| CliError {
            code: EXIT_USAGE,
            message: format!("cannot read {}: {e}", path.display()),
            hint: None,
        })?;
    Ok(scrub_controls(&decode(bytes, fallback)))
}

fn decode(bytes: Vec<u8>, fallback: &'static Encoding) -> String {
    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => match s.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => s,
        },
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = fallback.decode(&bytes);
            if had_errors {
                log::warn!("input is neither UTF-8 nor clean {}", fallback.name());
            }
            decoded.into_owned()
        }
    }
}

fn scrub_controls(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => ch,
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode("Mokėti 3,70".as_bytes().to_vec(), encoding_rs::WINDOWS_1257), "Mokėti 3,70");
    }

    #[test]
    fn bom_is_dropped() {
        assert_eq!(decode(b"\xef\xbb\xbfZ numeris".to_vec(), encoding_rs::WINDOWS_1257), "Z numeris");
    }

    #[test]
    fn baltic_codepage_fallback() {
        // "Mokėti" in windows-1257: ė = 0xEB
        let bytes = b"Mok\xebti".to_vec();
        assert_eq!(decode(bytes, encoding_rs::WINDOWS_1257), "Mokėti");
    }

    #[test]
    fn control_characters_become_spaces() {
        assert_eq!(scrub_controls("a\u{1b}b\tc\r\n\u{0}"), "a b\tc\r\n ");
    }

    #[test]
    fn missing_file_is_a_usage_error() {
        let err = read_text(Path::new("/nonexistent/kasa/input.txt"), encoding_rs::UTF_8).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }
}
