// PairVM Program Loader
// Text programs (numbers and mnemonics) and the compact binary format

use std::path::Path;

use super::chunk::Chunk;
use super::opcode::OpCode;
use crate::error::LoadError;

const MAGIC: &[u8; 4] = b"PVM\0";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

/// Load a program file, picking the format from its contents
pub fn load_file(path: &Path) -> Result<Chunk, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_bytes(&data)
}

pub fn load_bytes(data: &[u8]) -> Result<Chunk, LoadError> {
    if data.starts_with(MAGIC) {
        return deserialize(data);
    }
    let text = String::from_utf8_lossy(data);
    parse_text(&text)
}

/// Parse the text format. Tokens are separated by whitespace or commas;
/// `#` and `;` start comments.
pub fn parse_text(source: &str) -> Result<Chunk, LoadError> {
    let mut code = Vec::new();

    for (line_index, line) in source.lines().enumerate() {
        let line = match line.find(|c: char| c == '#' || c == ';') {
            Some(pos) => &line[..pos],
            None => line,
        };

        for token in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            let word = parse_token(token).ok_or_else(|| LoadError::InvalidToken {
                line: line_index + 1,
                token: token.to_string(),
            })?;
            code.push(word);
        }
    }

    Ok(Chunk::from_code(code))
}

fn parse_token(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    match hex {
        Some(hex) => {
            // Widen so that -0x8000000000000000 still fits
            let magnitude = i128::from(u64::from_str_radix(hex, 16).ok()?);
            i64::try_from(if negative { -magnitude } else { magnitude }).ok()
        }
        None if digits.starts_with(|c: char| c.is_ascii_digit()) => token.parse::<i64>().ok(),
        None if !negative => OpCode::from_name(digits).map(i64::from),
        None => None,
    }
}

pub fn serialize(chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + chunk.code.len() * 8);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(chunk.code.len() as u32).to_le_bytes());
    for word in &chunk.code {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

pub fn deserialize(data: &[u8]) -> Result<Chunk, LoadError> {
    if data.len() < HEADER_LEN {
        if !data.starts_with(MAGIC) {
            return Err(LoadError::BadMagic);
        }
        return Err(LoadError::Truncated {
            expected: HEADER_LEN,
            found: data.len(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(LoadError::BadMagic);
    }

    let version = data[4];
    if version != VERSION {
        return Err(LoadError::UnsupportedVersion(version));
    }

    let count = u32::from_le_bytes([data[5], data[6], data[7], data[8]]) as usize;
    let expected = HEADER_LEN + count * 8;
    if data.len() < expected {
        return Err(LoadError::Truncated {
            expected,
            found: data.len(),
        });
    }

    let code = data[HEADER_LEN..expected]
        .chunks_exact(8)
        .map(|bytes| {
            let mut word = [0u8; 8];
            word.copy_from_slice(bytes);
            i64::from_le_bytes(word)
        })
        .collect();

    Ok(Chunk::from_code(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers_and_mnemonics() {
        let source = "\
            # build a pair and keep it\n\
            PUSH 10, push 0x14\n\
            0x50        ; NEW_PAIR\n\
            STORE 0\n\
            PUSH -3 HALT\n";
        let chunk = parse_text(source).expect("program should parse");
        assert_eq!(chunk.code, vec![0x01, 10, 0x01, 20, 0x50, 0x30, 0, 0x01, -3, 0xff]);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse_text("PUSH 1\nPUSH twelve\n").unwrap_err();
        match err {
            LoadError::InvalidToken { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "twelve");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(parse_text("-PUSH").is_err());
    }

    #[test]
    fn test_parse_integer_extremes() {
        let source = "PUSH -9223372036854775808 PUSH 9223372036854775807 PUSH -0x8000000000000000";
        let chunk = parse_text(source).expect("extremes should parse");
        assert_eq!(chunk.code, vec![0x01, i64::MIN, 0x01, i64::MAX, 0x01, i64::MIN]);

        assert!(parse_text("PUSH 9223372036854775808").is_err());
        assert!(parse_text("PUSH 0x8000000000000000").is_err());
        assert!(parse_text("PUSH --5").is_err());
    }

    #[test]
    fn test_binary_format() {
        let chunk = Chunk::from_code(vec![0x01, i64::MIN, 0x01, -1, 0x50, 0xff]);
        let bytes = serialize(&chunk);
        assert_eq!(&bytes[0..4], b"PVM\0");
        assert_eq!(load_bytes(&bytes).expect("binary should load"), chunk);
    }

    #[test]
    fn test_binary_errors() {
        let chunk = Chunk::from_code(vec![0x01, 5]);
        let mut bytes = serialize(&chunk);
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(deserialize(&bytes), Err(LoadError::Truncated { .. })));

        let mut bytes = serialize(&chunk);
        bytes[4] = 9;
        assert!(matches!(deserialize(&bytes), Err(LoadError::UnsupportedVersion(9))));

        assert!(matches!(deserialize(b"NOPE00000"), Err(LoadError::BadMagic)));
    }
}
