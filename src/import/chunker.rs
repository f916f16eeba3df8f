//! Record chunker
//!
//! Splits the decompressed stream into one raw record per line. Chunk
//! boundaries from the bridge fall anywhere, so a partial trailing line is
//! kept until the rest of it arrives.

use crate::entity::RawRecord;
use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct RecordChunker {
    pending: BytesMut,
    /// Bytes of `pending` already searched for a newline
    scanned: usize,
    lines: u64,
}

impl RecordChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decompressed bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete record, skipping array delimiters and blank lines
    pub fn next_record(&mut self) -> Option<RawRecord> {
        loop {
            let newline = self.pending[self.scanned..]
                .iter()
                .position(|&b| b == b'\n');
            let Some(offset) = newline else {
                self.scanned = self.pending.len();
                return None;
            };

            let line = self.pending.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            self.lines += 1;
            if let Some(record) = RawRecord::from_line(&line) {
                return Some(record);
            }
        }
    }

    /// The unterminated last line, once the stream has ended
    pub fn finish(&mut self) -> Option<RawRecord> {
        let rest = self.pending.split();
        self.scanned = 0;
        if rest.is_empty() {
            return None;
        }
        self.lines += 1;
        RawRecord::from_line(&rest)
    }

    /// Bytes held back waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lines split off so far, including skipped ones
    pub fn lines(&self) -> u64 {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(chunker: &mut RecordChunker) -> Vec<String> {
        std::iter::from_fn(|| chunker.next_record())
            .map(|r| String::from_utf8(r.as_bytes().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_dump_layout() {
        let mut chunker = RecordChunker::new();
        chunker.push(b"[\n{\"id\":\"Q1\"},\n{\"id\":\"Q2\"},\n{\"id\":\"Q3\"}\n]\n");

        assert_eq!(
            drain(&mut chunker),
            vec![r#"{"id":"Q1"}"#, r#"{"id":"Q2"}"#, r#"{"id":"Q3"}"#]
        );
        assert!(chunker.finish().is_none());
        assert_eq!(chunker.lines(), 5);
    }

    #[test]
    fn test_records_split_across_chunks() {
        let text = b"[\n{\"id\":\"Q1\",\"labels\":{}},\n{\"id\":\"Q2\"}\n]\n";
        let mut chunker = RecordChunker::new();
        let mut records = Vec::new();
        for chunk in text.chunks(3) {
            chunker.push(chunk);
            records.extend(drain(&mut chunker));
        }
        assert_eq!(records, vec![r#"{"id":"Q1","labels":{}}"#, r#"{"id":"Q2"}"#]);
        assert_eq!(chunker.pending_len(), 0);
    }

    #[test]
    fn test_unterminated_last_line() {
        let mut chunker = RecordChunker::new();
        chunker.push(b"{\"id\":\"Q1\"},\n{\"id\":\"Q2\"}");

        assert_eq!(drain(&mut chunker), vec![r#"{"id":"Q1"}"#]);
        let last = chunker.finish().unwrap();
        assert_eq!(last.as_bytes(), br#"{"id":"Q2"}"#);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut chunker = RecordChunker::new();
        chunker.push(b"[\r\n\r\n{\"id\":\"Q1\"},\r\n]\r\n");
        assert_eq!(drain(&mut chunker), vec![r#"{"id":"Q1"}"#]);
    }
}
