use thiserror::Error;

/// Errors produced while encoding or decoding relay frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("unknown message type {0}")]
    UnknownMessageType(u32),

    #[error("declared total size {declared} does not match {actual} bytes consumed")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("total size {0} is smaller than the minimum frame length")]
    InvalidTotalSize(u32),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("field length does not fit in a 32-bit length prefix")]
    LengthOverflow,
}

impl FrameError {
    /// Whether the byte stream can no longer be trusted after this error.
    ///
    /// Envelope errors mean the next frame boundary is unknown, so the
    /// connection that produced them has to be dropped. Payload errors are
    /// confined to a frame whose boundary was already established.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTotalSize(_) | Self::FrameTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_errors_are_fatal() {
        assert!(FrameError::InvalidTotalSize(3).is_fatal());
        assert!(FrameError::FrameTooLarge { size: 10, max: 5 }.is_fatal());
    }

    #[test]
    fn payload_errors_are_not_fatal() {
        assert!(!FrameError::Truncated {
            needed: 4,
            available: 1
        }
        .is_fatal());
        assert!(!FrameError::UnknownMessageType(9).is_fatal());
        assert!(!FrameError::InvalidUtf8 { field: "body" }.is_fatal());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = FrameError::FrameTooLarge {
            size: 70_000,
            max: 65_536,
        };
        assert_eq!(
            err.to_string(),
            "frame of 70000 bytes exceeds the 65536 byte limit"
        );
    }
}
