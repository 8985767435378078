//! Splits the raw event stream into records
//!
//! The server terminates each record with a carriage return (`\r`) rather
//! than a newline, and the transport hands us arbitrary chunk boundaries.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

/// Record terminator used by the event stream
pub const RECORD_TERMINATOR: u8 = b'\r';

/// Longest record accepted before the stream is treated as broken
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// A record grew past the framer's limit without a terminator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("record exceeds {limit} bytes without a terminator")]
pub struct RecordTooLong {
    pub limit: usize,
}

/// Incremental record splitter for one connection
///
/// Bytes are buffered until a terminator arrives. Records that are blank
/// after trimming (such as the `\n` of a `\r\n` pair) are skipped. A record
/// longer than the limit is reported once as [`RecordTooLong`] and its bytes
/// are discarded up to the next terminator.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_max_len(MAX_RECORD_LEN)
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Framer with a custom record length limit (minimum 1)
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len: max_len.max(1),
            discarding: false,
        }
    }

    /// Feed a chunk and return every record it completes, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, RecordTooLong>> {
        let mut records = Vec::new();
        for &byte in chunk {
            if byte == RECORD_TERMINATOR {
                let raw = std::mem::take(&mut self.buf);
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                if let Some(record) = Self::decode(&raw) {
                    records.push(Ok(record));
                }
            } else if self.discarding {
                continue;
            } else if self.buf.len() >= self.max_len {
                warn!(limit = self.max_len, "LineFramer::push: record too long, discarding");
                self.buf = Vec::new();
                self.discarding = true;
                records.push(Err(RecordTooLong { limit: self.max_len }));
            } else {
                self.buf.push(byte);
            }
        }
        records
    }

    /// Flush the unterminated fragment left at end of stream, if any
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buf);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        Self::decode(&raw)
    }

    /// Bytes buffered while waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    fn decode(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

struct RecordState<S, E> {
    chunks: S,
    framer: LineFramer,
    pending: VecDeque<Result<String, E>>,
    done: bool,
}

/// Adapt a stream of byte chunks into a stream of records
///
/// The trailing fragment is yielded once when the chunk stream ends cleanly.
/// A chunk error is passed through and ends the record stream; the partial
/// fragment from the broken connection is discarded. A record longer than
/// [`MAX_RECORD_LEN`] ends the stream with an error after the records that
/// preceded it.
pub fn records<S, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: From<RecordTooLong>,
{
    let state = RecordState {
        chunks,
        framer: LineFramer::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(chunk)) => {
                    for item in st.framer.push(&chunk) {
                        let failed = item.is_err();
                        st.pending.push_back(item.map_err(E::from));
                        if failed {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    debug!(pending = st.framer.pending_len(), "records: chunk error, ending stream");
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    debug!("records: end of stream");
                    st.done = true;
                    if let Some(tail) = st.framer.finish() {
                        st.pending.push_back(Ok(tail));
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Reset,
        TooLong(RecordTooLong),
    }

    impl From<RecordTooLong> for TestError {
        fn from(e: RecordTooLong) -> Self {
            TestError::TooLong(e)
        }
    }

    fn ok_records(framer: &mut LineFramer, chunk: &[u8]) -> Vec<String> {
        framer.push(chunk).into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_push_splits_on_carriage_return() {
        let mut framer = LineFramer::new();
        let records = ok_records(&mut framer, b"one\rtwo\rthree");
        assert_eq!(records, vec!["one", "two"]);
        assert_eq!(framer.finish(), Some("three".to_string()));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_newline_is_not_a_terminator() {
        let mut framer = LineFramer::new();
        let records = ok_records(&mut framer, b"a\nb\r");
        assert_eq!(records, vec!["a\nb"]);
    }

    #[test]
    fn test_crlf_pairs_do_not_produce_blank_records() {
        let mut framer = LineFramer::new();
        let records = ok_records(&mut framer, b"first\r\nsecond\r\n");
        assert_eq!(records, vec!["first", "second"]);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut framer = LineFramer::new();
        let mut out = Vec::new();
        for b in b"20190113141131 1 CAM0 MOTION\r" {
            out.extend(ok_records(&mut framer, &[*b]));
        }
        assert_eq!(out, vec!["20190113141131 1 CAM0 MOTION"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_unterminated_input_is_bounded() {
        let mut framer = LineFramer::new();
        let chunk = vec![b'x'; 1024 * 1024];
        let mut errors = 0;
        for _ in 0..8 {
            for item in framer.push(&chunk) {
                assert_eq!(item, Err(RecordTooLong { limit: MAX_RECORD_LEN }));
                errors += 1;
            }
            assert!(framer.pending_len() <= MAX_RECORD_LEN);
        }
        assert_eq!(errors, 1);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_oversized_record_is_skipped_until_next_terminator() {
        let mut framer = LineFramer::with_max_len(4);
        let out = framer.push(b"ok\rtoolong\rfine\r");
        assert_eq!(
            out,
            vec![
                Ok("ok".to_string()),
                Err(RecordTooLong { limit: 4 }),
                Ok("fine".to_string()),
            ]
        );
    }

    #[test]
    fn test_record_at_limit_is_accepted() {
        let mut framer = LineFramer::with_max_len(4);
        assert_eq!(ok_records(&mut framer, b"abcd\r"), vec!["abcd"]);
    }

    #[tokio::test]
    async fn test_records_yields_trailing_fragment_once() {
        let chunks = stream::iter(vec![
            Ok::<_, TestError>(b"ab".to_vec()),
            Ok(b"c\rde".to_vec()),
            Ok(b"f".to_vec()),
        ]);
        let out: Vec<_> = records(chunks).collect().await;
        assert_eq!(out, vec![Ok("abc".to_string()), Ok("def".to_string())]);
    }

    #[tokio::test]
    async fn test_records_passes_error_and_stops() {
        let chunks = stream::iter(vec![
            Ok(b"one\rpartial".to_vec()),
            Err(TestError::Reset),
            Ok(b"never\r".to_vec()),
        ]);
        let out: Vec<_> = records(chunks).collect().await;
        assert_eq!(out, vec![Ok("one".to_string()), Err(TestError::Reset)]);
    }

    #[tokio::test]
    async fn test_records_ends_on_oversized_record() {
        let mut body = b"first\r".to_vec();
        body.extend(vec![b'x'; MAX_RECORD_LEN + 1]);
        body.extend_from_slice(b"\rnever\r");
        let chunks = stream::iter(vec![Ok::<_, TestError>(body)]);

        let out: Vec<_> = records(chunks).collect().await;
        assert_eq!(
            out,
            vec![
                Ok("first".to_string()),
                Err(TestError::TooLong(RecordTooLong { limit: MAX_RECORD_LEN })),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_records(
            lines in proptest::collection::vec("[a-zA-Z0-9 ]{1,20}", 1..10),
            split in 1usize..7,
        ) {
            let joined: String = lines.iter().map(|l| format!("{}\r", l)).collect();
            let mut whole = LineFramer::new();
            let expected = whole.push(joined.as_bytes());

            let mut chunked = LineFramer::new();
            let mut got = Vec::new();
            for chunk in joined.as_bytes().chunks(split) {
                got.extend(chunked.push(chunk));
            }
            prop_assert_eq!(got, expected);
        }
    }
}
