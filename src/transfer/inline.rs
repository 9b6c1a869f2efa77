//! Inline `data:` addresses, resolved without a network round-trip

use base64::Engine;
use bytes::Bytes;

use super::TransferError;

const DATA_PREFIX: &str = "data:";
const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

/// Decoded contents of a `data:` URI
#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub media_type: String,
    pub body: Bytes,
}

pub fn is_data_uri(url: &str) -> bool {
    url.starts_with(DATA_PREFIX)
}

/// Parse `data:[<media type>][;base64],<data>`
pub fn decode_data_uri(uri: &str) -> Result<InlineData, TransferError> {
    let rest = uri
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| TransferError::InlineData("missing data: scheme".to_string()))?;

    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| TransferError::InlineData("missing ',' separator".to_string()))?;

    let (media_type, base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };

    let media_type = if media_type.is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else {
        media_type.to_string()
    };

    let body = if base64 {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| TransferError::InlineData(e.to_string()))?
    } else {
        percent_decode(data)?
    };

    Ok(InlineData {
        media_type,
        body: Bytes::from(body),
    })
}

fn percent_decode(input: &str) -> Result<Vec<u8>, TransferError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| TransferError::InlineData(format!("truncated escape at {}", i)))?;
            let value = Some(hex)
                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| TransferError::InlineData(format!("invalid escape '%{}'", hex)))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64() {
        let data = decode_data_uri("data:application/json;base64,eyJhIjoxfQ==").unwrap();
        assert_eq!(data.media_type, "application/json");
        assert_eq!(&data.body[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_decode_percent_encoded() {
        let data = decode_data_uri("data:,hello%20world").unwrap();
        assert_eq!(data.media_type, DEFAULT_MEDIA_TYPE);
        assert_eq!(&data.body[..], b"hello world");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            decode_data_uri("data:text/plain"),
            Err(TransferError::InlineData(_))
        ));
        assert!(matches!(
            decode_data_uri("data:;base64,***"),
            Err(TransferError::InlineData(_))
        ));
        assert!(matches!(
            decode_data_uri("data:,bad%2"),
            Err(TransferError::InlineData(_))
        ));
        assert!(matches!(
            decode_data_uri("data:,%+f"),
            Err(TransferError::InlineData(_))
        ));
        assert!(matches!(
            decode_data_uri("data:,%-1"),
            Err(TransferError::InlineData(_))
        ));
        assert!(!is_data_uri("https://example.com/a.png"));
    }
}
