use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use thiserror::Error;

/// Response bytes decoded into the textual body the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding_label: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode body with {encoding}")]
    DecodeFailure { encoding: String },
}

/// Decodes raw response bytes into UTF-8 text.
///
/// Encoding is chosen in order: byte-order mark, `Content-Type`
/// charset parameter, chardetng detection over the full body.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedBody, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(encoding) = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Some(value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<DecodedBody, DecodeError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: encoding.name().to_string(),
        });
    }
    Ok(DecodedBody {
        text: text.into_owned(),
        encoding_label: encoding.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::decode_body;
    use pretty_assertions::assert_eq;

    #[test]
    fn charset_header_wins_without_bom() {
        let decoded = decode_body(b"caf\xe9", Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(decoded.text, "café");
    }

    #[test]
    fn bom_wins_over_header() {
        let decoded = decode_body(b"\xEF\xBB\xBFhello", Some("text/html; charset=ISO-8859-1"))
            .unwrap();
        assert_eq!(decoded.text, "hello");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn detection_handles_plain_utf8() {
        let decoded = decode_body("héllo".as_bytes(), None).unwrap();
        assert_eq!(decoded.text, "héllo");
    }
}
