// crates/vidcast-core/src/outcome.rs
//
// Terminal results of one push-session attempt.
//
// Every failure point of the remux worker maps to its own variant with a
// stable numeric code (kept compatible with the codes the operator-facing
// tooling already knows). Operator cancellation is not an error: it ends as
// `PushOutcome::Stopped`, which carries the frames sent before the stop.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("source file does not exist")]
    SourceMissing,
    #[error("source has no usable video stream")]
    NoVideoStream,
    #[error("could not open source: {0}")]
    OpenInput(String),
    #[error("could not read source stream info: {0}")]
    StreamInfo(String),
    #[error("could not create output context: {0}")]
    OutputContext(String),
    #[error("sink format has no usable video codec")]
    EncoderLookup,
    #[error("could not create output stream: {0}")]
    StreamCreation(String),
    #[error("could not copy codec parameters: {0}")]
    ParameterCopy(String),
    #[error("could not write sink header: {0}")]
    HeaderWrite(String),
    #[error("could not reopen source for the next loop: {0}")]
    Reopen(String),
    #[error("packet write failed: {0}")]
    WritePacket(String),
    #[error("push worker panicked")]
    WorkerPanicked,
}

impl PushError {
    pub fn code(&self) -> i32 {
        match self {
            PushError::SourceMissing     => 10,
            PushError::NoVideoStream     => 20,
            PushError::OpenInput(_)      => 30,
            PushError::StreamInfo(_)     => 40,
            PushError::OutputContext(_)  => 50,
            PushError::EncoderLookup     => 60,
            PushError::StreamCreation(_) => 70,
            PushError::ParameterCopy(_)  => 80,
            PushError::HeaderWrite(_)    => 90,
            PushError::Reopen(_)         => 100,
            PushError::WritePacket(_)    => 110,
            PushError::WorkerPanicked    => 120,
        }
    }
}

/// How a push worker ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Every requested loop was sent.
    Completed { frames: u64 },
    /// The operator asked the session to stop.
    Stopped { frames: u64 },
    Failed(PushError),
}

impl PushOutcome {
    pub const COMPLETED_CODE: i32 = 0;
    pub const STOPPED_CODE:   i32 = 1;

    pub fn code(&self) -> i32 {
        match self {
            PushOutcome::Completed { .. } => Self::COMPLETED_CODE,
            PushOutcome::Stopped { .. }   => Self::STOPPED_CODE,
            PushOutcome::Failed(e)        => e.code(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PushOutcome::Failed(_))
    }

    pub fn frames(&self) -> u64 {
        match self {
            PushOutcome::Completed { frames } | PushOutcome::Stopped { frames } => *frames,
            PushOutcome::Failed(_) => 0,
        }
    }
}

impl From<PushError> for PushOutcome {
    fn from(e: PushError) -> Self {
        PushOutcome::Failed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_are_distinct() {
        let all = [
            PushError::SourceMissing,
            PushError::NoVideoStream,
            PushError::OpenInput(String::new()),
            PushError::StreamInfo(String::new()),
            PushError::OutputContext(String::new()),
            PushError::EncoderLookup,
            PushError::StreamCreation(String::new()),
            PushError::ParameterCopy(String::new()),
            PushError::HeaderWrite(String::new()),
            PushError::Reopen(String::new()),
            PushError::WritePacket(String::new()),
            PushError::WorkerPanicked,
        ];
        let mut codes: Vec<i32> = all.iter().map(PushError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(!codes.contains(&PushOutcome::COMPLETED_CODE));
        assert!(!codes.contains(&PushOutcome::STOPPED_CODE));
    }

    #[test]
    fn stop_is_not_a_failure() {
        let o = PushOutcome::Stopped { frames: 12 };
        assert!(!o.is_failure());
        assert_eq!(o.frames(), 12);
        assert_eq!(o.code(), 1);
    }

    #[test]
    fn reopen_has_its_own_code() {
        assert_ne!(PushError::Reopen("x".into()).code(), PushError::NoVideoStream.code());
    }
}
