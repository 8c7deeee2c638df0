use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Splits rsync output into logical lines.
///
/// `\n` ends a line. A bare `\r` also ends a line, so the in-place progress
/// updates rsync draws over a single terminal row are observed one at a
/// time instead of collapsing into the final row; a `\r\n` pair counts as
/// one terminator. At end of input any unterminated tail is yielded as a
/// final line. Invalid UTF-8 is replaced, never an error.
#[derive(Debug, Default)]
pub struct ProgressLineDecoder;

impl Decoder for ProgressLineDecoder {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        let Some(pos) = src.iter().position(|&b| b == b'\r' || b == b'\n') else {
            // No delimiter yet; ask for more bytes.
            return Ok(None);
        };

        let line = String::from_utf8_lossy(&src[..pos]).into_owned();
        let mut advance = pos + 1;
        if src[pos] == b'\r' && src.get(pos + 1) == Some(&b'\n') {
            advance += 1;
        }
        src.advance(advance);
        Ok(Some(line))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&src[..]).into_owned();
        src.clear();
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(input: &[u8]) -> Vec<String> {
        let mut decoder = ProgressLineDecoder;
        let mut buf = BytesMut::from(input);
        let mut lines = Vec::new();
        while let Some(line) = decoder.decode(&mut buf).unwrap() {
            lines.push(line);
        }
        while let Some(line) = decoder.decode_eof(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_on_newline() {
        assert_eq!(drain_all(b"one\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn carriage_return_yields_each_overwritten_update() {
        assert_eq!(
            drain_all(b"  10% 1.00kB/s\r  55% 2.00kB/s\r 100% 3.00kB/s\n"),
            vec!["  10% 1.00kB/s", "  55% 2.00kB/s", " 100% 3.00kB/s"],
        );
    }

    #[test]
    fn crlf_is_a_single_terminator() {
        assert_eq!(drain_all(b"one\r\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn final_unterminated_line_is_yielded_at_eof() {
        assert_eq!(drain_all(b"one\nlast"), vec!["one", "last"]);
    }

    #[test]
    fn requests_more_data_without_delimiter() {
        let mut decoder = ProgressLineDecoder;
        let mut buf = BytesMut::from(&b"partial line"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 12);

        buf.extend_from_slice(b" done\n");
        assert_eq!(
            decoder.decode(&mut buf).unwrap().as_deref(),
            Some("partial line done")
        );
    }

    #[test]
    fn bare_cr_at_buffer_end_is_consumed_immediately() {
        let mut decoder = ProgressLineDecoder;
        let mut buf = BytesMut::from(&b"update\r"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().as_deref(), Some("update"));

        // A newline arriving in the next chunk then reads as an empty line.
        buf.extend_from_slice(b"\nnext\n");
        assert_eq!(decoder.decode(&mut buf).unwrap().as_deref(), Some(""));
        assert_eq!(decoder.decode(&mut buf).unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn consecutive_delimiters_yield_empty_lines() {
        assert_eq!(drain_all(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(drain_all(b"").is_empty());
    }
}
