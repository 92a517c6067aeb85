//! Deterministic engine that replays canned exchanges.
//!
//! Each `perform` pops the next scripted reply: its header lines go to the
//! sink verbatim and in order, then its body chunks (skipped when the
//! options ask for no body). A scripted failure is returned as-is. Every
//! call's options are recorded for inspection.

use std::collections::VecDeque;

use super::{deliver_chunk, deliver_header, EngineError, EngineErrorKind, EngineOptions, TransferEngine, TransferSink};

#[derive(Debug, Clone)]
enum Reply {
    Exchange { headers: Vec<String>, chunks: Vec<Vec<u8>> },
    Fail(EngineError),
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    replies: VecDeque<Reply>,
    calls: Vec<EngineOptions>,
    resets: usize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exchange.
    pub fn reply<H, S, C, B>(mut self, headers: H, chunks: C) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        self.replies.push_back(Reply::Exchange {
            headers: headers.into_iter().map(Into::into).collect(),
            chunks: chunks.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Queue a failure.
    pub fn fail(mut self, kind: EngineErrorKind, message: &str) -> Self {
        self.replies.push_back(Reply::Fail(EngineError::new(kind, message)));
        self
    }

    /// Options of every `perform` call, oldest first.
    pub fn calls(&self) -> &[EngineOptions] {
        &self.calls
    }

    pub fn last_options(&self) -> Option<&EngineOptions> {
        self.calls.last()
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl TransferEngine for ScriptedEngine {
    fn reset(&mut self) {
        self.resets += 1;
    }

    fn perform(&mut self, options: &EngineOptions, sink: &mut dyn TransferSink) -> Result<(), EngineError> {
        self.calls.push(options.clone());
        match self.replies.pop_front() {
            Some(Reply::Exchange { headers, chunks }) => {
                for line in &headers {
                    deliver_header(sink, line)?;
                }
                if options.no_body.unwrap_or(false) {
                    return Ok(());
                }
                for chunk in &chunks {
                    deliver_chunk(sink, chunk)?;
                }
                Ok(())
            }
            Some(Reply::Fail(err)) => Err(err),
            None => Err(EngineError::new(EngineErrorKind::Other, "no scripted reply left")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        headers: Vec<String>,
        body: Vec<u8>,
        short_body: bool,
    }

    impl TransferSink for Recorder {
        fn header(&mut self, line: &[u8]) -> usize {
            self.headers.push(String::from_utf8_lossy(line).into_owned());
            line.len()
        }

        fn write(&mut self, chunk: &[u8]) -> usize {
            self.body.extend_from_slice(chunk);
            if self.short_body { 0 } else { chunk.len() }
        }
    }

    #[test]
    fn replays_in_order() {
        let mut engine = ScriptedEngine::new()
            .reply(["HTTP/1.1 200 OK", "X-A: 1"], ["ab", "cd"])
            .fail(EngineErrorKind::Timeout, "timed out");
        let mut sink = Recorder::default();

        engine.perform(&EngineOptions::default(), &mut sink).unwrap();
        assert_eq!(sink.headers, ["HTTP/1.1 200 OK", "X-A: 1"]);
        assert_eq!(sink.body, b"abcd");

        let err = engine.perform(&EngineOptions::default(), &mut sink).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Timeout);

        let err = engine.perform(&EngineOptions::default(), &mut sink).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Other);
        assert_eq!(engine.calls().len(), 3);
    }

    #[test]
    fn no_body_skips_chunks() {
        let mut engine = ScriptedEngine::new().reply(["HTTP/1.1 200 OK"], ["ignored"]);
        let mut sink = Recorder::default();
        let options = EngineOptions {
            no_body: Some(true),
            ..EngineOptions::default()
        };
        engine.perform(&options, &mut sink).unwrap();
        assert!(sink.body.is_empty());
    }

    #[test]
    fn short_write_aborts() {
        let mut engine = ScriptedEngine::new().reply(["HTTP/1.1 200 OK"], ["data"]);
        let mut sink = Recorder {
            short_body: true,
            ..Recorder::default()
        };
        let err = engine.perform(&EngineOptions::default(), &mut sink).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::WriteAborted);
    }
}
