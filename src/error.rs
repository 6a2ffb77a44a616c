use crate::rle::DecodeErr;
use std::io::Error as IoError;

#[derive(Debug)]
pub enum StitchErr {
    /// A namespace, contig or chunk is absent from the store
    NotFound(String),
    /// Malformed run-length data in one chunk
    Decode { chunk: String, source: DecodeErr },
    InvalidFormat(String),
    /// Alignment or run parameters that cannot be used
    InvalidConfig(String),
    Io(IoError),
}

impl std::fmt::Display for StitchErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StitchErr::NotFound(what) => write!(f, "Not found: {}", what),
            StitchErr::Decode { chunk, source } => {
                write!(f, "Failed to decode chunk {}: {}", chunk, source)
            }
            StitchErr::InvalidFormat(msg) => write!(f, "Invalid prediction store: {}", msg),
            StitchErr::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            StitchErr::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StitchErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StitchErr::Decode { source, .. } => Some(source),
            StitchErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for StitchErr {
    fn from(e: IoError) -> Self {
        StitchErr::Io(e)
    }
}

impl From<StitchErr> for IoError {
    fn from(e: StitchErr) -> Self {
        match e {
            StitchErr::Io(e) => e,
            StitchErr::NotFound(_) => IoError::new(std::io::ErrorKind::NotFound, e.to_string()),
            StitchErr::Decode { .. } | StitchErr::InvalidFormat(_) => {
                IoError::new(std::io::ErrorKind::InvalidData, e.to_string())
            }
            StitchErr::InvalidConfig(_) => {
                IoError::new(std::io::ErrorKind::InvalidInput, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_not_found_maps_to_io_not_found() {
        let err: IoError = StitchErr::NotFound("predictions".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("predictions"));
    }

    #[test]
    fn test_decode_error_message_names_chunk() {
        let err = StitchErr::Decode {
            chunk: "0001_0".to_string(),
            source: DecodeErr::UnknownLabel {
                position: 3,
                label: 9,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("0001_0"), "{msg}");
        assert!(msg.contains("label 9"), "{msg}");
        let io_err: IoError = err.into();
        assert_eq!(io_err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_invalid_config_maps_to_invalid_input() {
        let err: IoError = StitchErr::InvalidConfig("gap extend 5".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("gap extend 5"));
    }
}
