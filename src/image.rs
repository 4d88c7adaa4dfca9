//! $readmemh-compatible hex images
//!
//! One instruction per line, exactly 8 lowercase hex digits, trailing
//! newline; the word on line i sits at byte address 4*i. This is the
//! interchange format between the generator/assembler on one side and
//! the reference hart and RTL simulator on the other.

use std::fs::File;
use std::io::{self, BufRead, BufReader, LineWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("hex image I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: malformed hex word '{text}'")]
    MalformedWord { line: usize, text: String },
}

/// Format a program as $readmemh text
pub fn to_hex(words: &[u32]) -> String {
    words.iter().map(|word| format!("{word:08x}\n")).collect()
}

/// Parse $readmemh text back into words
pub fn parse_hex(text: &str) -> Result<Vec<u32>, ImageError> {
    text.lines()
        .enumerate()
        .map(|(index, line)| {
            if line.len() != 8 {
                return Err(ImageError::MalformedWord {
                    line: index + 1,
                    text: line.to_string(),
                });
            }
            u32::from_str_radix(line, 16).map_err(|_| ImageError::MalformedWord {
                line: index + 1,
                text: line.to_string(),
            })
        })
        .collect()
}

/// Write a program image to a file
pub fn write_hex_file(path: &Path, words: &[u32]) -> io::Result<()> {
    let mut writer = LineWriter::new(File::create(path)?);
    for word in words {
        writeln!(writer, "{word:08x}")?;
    }
    writer.flush()
}

/// Read a program image from a file
pub fn read_hex_file(path: &Path) -> Result<Vec<u32>, ImageError> {
    let reader = BufReader::new(File::open(path)?);
    let mut words = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.len() != 8 {
            return Err(ImageError::MalformedWord {
                line: index + 1,
                text: line,
            });
        }
        match u32::from_str_radix(&line, 16) {
            Ok(word) => words.push(word),
            Err(_) => {
                return Err(ImageError::MalformedWord {
                    line: index + 1,
                    text: line,
                })
            }
        }
    }
    Ok(words)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_hex_format() {
        let hex = to_hex(&[0x0000_0013, 0xdead_beef]);
        assert_eq!(hex, "00000013\ndeadbeef\n");
    }

    #[test]
    fn check_empty_program() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(parse_hex("").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn check_roundtrip() {
        let words = vec![0, 1, 0xffff_ffff, 0x0040_0293];
        assert_eq!(parse_hex(&to_hex(&words)).unwrap(), words);
    }

    #[test]
    fn check_malformed_line() {
        assert!(matches!(
            parse_hex("0013\n"),
            Err(ImageError::MalformedWord { line: 1, .. })
        ));
        assert!(matches!(
            parse_hex("00000013\nxyzzy123\n"),
            Err(ImageError::MalformedWord { line: 2, .. })
        ));
    }

    #[test]
    fn check_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.hex");
        let words = vec![0x0000_0013, 0x02a0_0293];
        write_hex_file(&path, &words).unwrap();
        assert_eq!(read_hex_file(&path).unwrap(), words);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "00000013\n02a00293\n");
    }
}
