use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, BIG5, GBK, SHIFT_JIS, WINDOWS_1252};
use thiserror::Error;

/// 讀寫頁面筆記時可能發生的錯誤。 / Errors raised while reading or writing page notes.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("note encoding is not supported or data is invalid")]
    InvalidEncoding,
}

/// 偵測到的筆記編碼。 / Encoding detected while decoding a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Legacy(&'static str),
}

/// 解碼後的筆記內容。 / Decoded note contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteText {
    pub text: String,
    pub encoding: NoteEncoding,
}

/// 讀取筆記檔並自動偵測編碼。 / Reads a note file, detecting its encoding.
pub fn read_note(path: impl AsRef<Path>) -> Result<NoteText, NoteError> {
    let bytes = fs::read(path.as_ref())?;
    decode_note(&bytes)
}

/// 以 UTF-8 寫入筆記（先寫臨時檔再更名）。 / Writes a note as UTF-8 through a temporary sibling.
pub fn write_note(path: impl AsRef<Path>, text: &str) -> Result<(), NoteError> {
    let path = path.as_ref();
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    fs::write(tmp_path, text.as_bytes())?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// 將原始位元組解碼為文字。 / Decodes raw note bytes into text.
pub fn decode_note(bytes: &[u8]) -> Result<NoteText, NoteError> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        let text = std::str::from_utf8(rest).map_err(|_| NoteError::InvalidEncoding)?;
        return Ok(NoteText {
            text: text.to_owned(),
            encoding: NoteEncoding::Utf8,
        });
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return Ok(NoteText {
            text: decode_utf16(rest, false)?,
            encoding: NoteEncoding::Utf16Le,
        });
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return Ok(NoteText {
            text: decode_utf16(rest, true)?,
            encoding: NoteEncoding::Utf16Be,
        });
    }
    if looks_like_utf16(bytes, false) {
        return Ok(NoteText {
            text: decode_utf16(bytes, false)?,
            encoding: NoteEncoding::Utf16Le,
        });
    }
    if looks_like_utf16(bytes, true) {
        return Ok(NoteText {
            text: decode_utf16(bytes, true)?,
            encoding: NoteEncoding::Utf16Be,
        });
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(NoteText {
            text: text.to_owned(),
            encoding: NoteEncoding::Utf8,
        });
    }
    if let Some(legacy) = detect_legacy_encoding(bytes) {
        let (cow, had_errors) = legacy.decode_without_bom_handling(bytes);
        if had_errors {
            return Err(NoteError::InvalidEncoding);
        }
        let text = match cow {
            Cow::Borrowed(slice) => slice.to_owned(),
            Cow::Owned(string) => string,
        };
        return Ok(NoteText {
            text,
            encoding: NoteEncoding::Legacy(legacy.name()),
        });
    }
    Err(NoteError::InvalidEncoding)
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String, NoteError> {
    if bytes.len() % 2 != 0 {
        return Err(NoteError::InvalidEncoding);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| NoteError::InvalidEncoding)
}

fn detect_legacy_encoding(bytes: &[u8]) -> Option<&'static RsEncoding> {
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    [WINDOWS_1252, SHIFT_JIS, GBK, BIG5]
        .into_iter()
        .find(|candidate| *candidate == guess)
}

fn looks_like_utf16(bytes: &[u8], big_endian: bool) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }

    let sample_len = bytes.len().min(64);
    let mut zero_count = 0;
    let mut total = 0;
    for chunk in bytes[..sample_len].chunks_exact(2) {
        let zero_byte = if big_endian { chunk[0] } else { chunk[1] };
        if zero_byte == 0 {
            zero_count += 1;
        }
        total += 1;
    }

    total > 0 && zero_count * 2 >= total
}
