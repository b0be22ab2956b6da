// Byte decoding for documents and CSV tables

use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1251};

use crate::error::IoError;

/// Read a file and decode it to UTF-8 text.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::read(path, e))?;
    Ok(decode_bytes(&bytes))
}

/// Decode document bytes.
///
/// A byte-order mark (UTF-8, UTF-16LE or UTF-16BE) wins. Otherwise an `encoding="..."` in the XML declaration is
/// honoured, then plain UTF-8 is tried, and anything else is read as
/// Windows-1251, the usual encoding of Russian estimate exports.
pub fn decode_bytes(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }

    if let Some(encoding) = declared_encoding(bytes) {
        if encoding != UTF_8 {
            let (decoded, _, _) = encoding.decode(bytes);
            return decoded.into_owned();
        }
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1251.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Encoding named by the XML declaration, if there is one and it is known.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = bytes.get(..bytes.len().min(200))?;
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(&head[..end]);

    let at = decl.find("encoding")?;
    let rest = decl[at + "encoding".len()..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;
    Encoding::for_label(label.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        assert_eq!(decode_bytes("Смета".as_bytes()), "Смета");
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice("<a>б</a>".as_bytes());
        assert_eq!(decode_bytes(&bytes), "<a>б</a>");
    }

    #[test]
    fn utf16_bom_is_decoded() {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a>Смета</a>";
        let mut le = vec![0xFF, 0xFE];
        le.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        assert_eq!(decode_bytes(&le), text);

        let mut be = vec![0xFE, 0xFF];
        be.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        assert_eq!(decode_bytes(&be), text);
    }

    #[test]
    fn cp1251_fallback() {
        let (encoded, _, _) = WINDOWS_1251.encode("<Name>Школа</Name>");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_bytes(&encoded), "<Name>Школа</Name>");
    }

    #[test]
    fn declared_encoding_is_honoured() {
        let text = "<?xml version=\"1.0\" encoding=\"windows-1251\"?><a>Кровля</a>";
        let (encoded, _, _) = WINDOWS_1251.encode(text);
        assert_eq!(decode_bytes(&encoded), text);
    }

    #[test]
    fn declared_utf8_stays_utf8() {
        let text = "<?xml version='1.0' encoding='UTF-8'?><a>Кровля</a>";
        assert_eq!(decode_bytes(text.as_bytes()), text);
    }

    #[test]
    fn unknown_label_falls_through() {
        assert_eq!(
            declared_encoding(b"<?xml version=\"1.0\" encoding=\"klingon\"?>"),
            None
        );
        assert_eq!(declared_encoding(b"<a/>"), None);
    }
}
