//! The wire error taxonomy.
//!
//! Every error that crosses the channel carries one of these codes plus a
//! human-readable message. Codes serialize as `SCREAMING_SNAKE_CASE`
//! strings; codes this build does not know about deserialize to
//! [`ErrorCode::Unknown`] instead of failing the frame.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Machine-readable error code carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Path or command rejected by a sandbox.
    SecurityError,
    /// Target file does not exist.
    FileNotFound,
    /// Target path does not exist.
    PathNotFound,
    /// Target path is not a directory.
    NotADirectory,
    /// File contains non-UTF-8 content.
    EncodingError,
    /// Operating-system permission failure.
    PermissionDenied,
    /// Requested line range is out of bounds or malformed.
    InvalidLineRange,
    /// `line_number` outside `[1, N+1]`.
    InvalidLineNumber,
    /// Written content did not match the declared line count.
    LineCountMismatch,
    /// Literal search text had zero occurrences.
    SearchTextNotFound,
    /// Regex failed to compile.
    InvalidRegex,
    /// Command exceeded its wall-clock timeout.
    CommandTimeout,
    /// Command failed to spawn or run.
    CommandError,
    /// Working directory for a command does not exist.
    DirectoryNotFound,
    /// Directory is not a git repository.
    NotAGitRepo,
    /// Tool name not present in the registry.
    ToolNotFound,
    /// Tool implementation failed unexpectedly.
    ToolExecutionError,
    /// Provider stream failed mid-turn.
    AiProcessingError,
    /// Frame `type` not recognised.
    UnknownMessageType,
    /// Frame was not valid JSON.
    InvalidJson,
    /// Approval response with no matching pending request.
    ToolRequestNotFound,
    /// Frame handler failed.
    MessageProcessingError,
    /// Catch-all for codes emitted by a newer peer.
    Unknown,
}

impl ErrorCode {
    /// The wire representation of this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityError => "SECURITY_ERROR",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::NotADirectory => "NOT_A_DIRECTORY",
            Self::EncodingError => "ENCODING_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidLineRange => "INVALID_LINE_RANGE",
            Self::InvalidLineNumber => "INVALID_LINE_NUMBER",
            Self::LineCountMismatch => "LINE_COUNT_MISMATCH",
            Self::SearchTextNotFound => "SEARCH_TEXT_NOT_FOUND",
            Self::InvalidRegex => "INVALID_REGEX",
            Self::CommandTimeout => "COMMAND_TIMEOUT",
            Self::CommandError => "COMMAND_ERROR",
            Self::DirectoryNotFound => "DIRECTORY_NOT_FOUND",
            Self::NotAGitRepo => "NOT_A_GIT_REPO",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::ToolExecutionError => "TOOL_EXECUTION_ERROR",
            Self::AiProcessingError => "AI_PROCESSING_ERROR",
            Self::UnknownMessageType => "UNKNOWN_MESSAGE_TYPE",
            Self::InvalidJson => "INVALID_JSON",
            Self::ToolRequestNotFound => "TOOL_REQUEST_NOT_FOUND",
            Self::MessageProcessingError => "MESSAGE_PROCESSING_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire code, degrading unrecognised codes to
    /// [`ErrorCode::Unknown`].
    #[must_use]
    pub fn from_wire(code: &str) -> Self {
        match code {
            "SECURITY_ERROR" => Self::SecurityError,
            "FILE_NOT_FOUND" => Self::FileNotFound,
            "PATH_NOT_FOUND" => Self::PathNotFound,
            "NOT_A_DIRECTORY" => Self::NotADirectory,
            "ENCODING_ERROR" => Self::EncodingError,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "INVALID_LINE_RANGE" => Self::InvalidLineRange,
            "INVALID_LINE_NUMBER" => Self::InvalidLineNumber,
            "LINE_COUNT_MISMATCH" => Self::LineCountMismatch,
            "SEARCH_TEXT_NOT_FOUND" => Self::SearchTextNotFound,
            "INVALID_REGEX" => Self::InvalidRegex,
            "COMMAND_TIMEOUT" => Self::CommandTimeout,
            "COMMAND_ERROR" => Self::CommandError,
            "DIRECTORY_NOT_FOUND" => Self::DirectoryNotFound,
            "NOT_A_GIT_REPO" => Self::NotAGitRepo,
            "TOOL_NOT_FOUND" => Self::ToolNotFound,
            "TOOL_EXECUTION_ERROR" => Self::ToolExecutionError,
            "AI_PROCESSING_ERROR" => Self::AiProcessingError,
            "UNKNOWN_MESSAGE_TYPE" => Self::UnknownMessageType,
            "INVALID_JSON" => Self::InvalidJson,
            "TOOL_REQUEST_NOT_FOUND" => Self::ToolRequestNotFound,
            "MESSAGE_PROCESSING_ERROR" => Self::MessageProcessingError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::SecurityError).unwrap();
        assert_eq!(json, "\"SECURITY_ERROR\"");
        let json = serde_json::to_string(&ErrorCode::LineCountMismatch).unwrap();
        assert_eq!(json, "\"LINE_COUNT_MISMATCH\"");
    }

    #[test]
    fn test_deserialize_known() {
        let code: ErrorCode = serde_json::from_str("\"COMMAND_TIMEOUT\"").unwrap();
        assert_eq!(code, ErrorCode::CommandTimeout);
    }

    #[test]
    fn test_deserialize_unknown_degrades() {
        let code: ErrorCode = serde_json::from_str("\"FUTURE_CODE\"").unwrap();
        assert_eq!(code, ErrorCode::Unknown);
    }

    #[test]
    fn test_wire_roundtrip_every_code() {
        for code in [
            ErrorCode::SecurityError,
            ErrorCode::FileNotFound,
            ErrorCode::PathNotFound,
            ErrorCode::NotADirectory,
            ErrorCode::EncodingError,
            ErrorCode::PermissionDenied,
            ErrorCode::InvalidLineRange,
            ErrorCode::InvalidLineNumber,
            ErrorCode::LineCountMismatch,
            ErrorCode::SearchTextNotFound,
            ErrorCode::InvalidRegex,
            ErrorCode::CommandTimeout,
            ErrorCode::CommandError,
            ErrorCode::DirectoryNotFound,
            ErrorCode::NotAGitRepo,
            ErrorCode::ToolNotFound,
            ErrorCode::ToolExecutionError,
            ErrorCode::AiProcessingError,
            ErrorCode::UnknownMessageType,
            ErrorCode::InvalidJson,
            ErrorCode::ToolRequestNotFound,
            ErrorCode::MessageProcessingError,
        ] {
            assert_eq!(ErrorCode::from_wire(code.as_str()), code);
        }
    }

    #[test]
    fn test_display_matches_wire() {
        assert_eq!(ErrorCode::NotAGitRepo.to_string(), "NOT_A_GIT_REPO");
    }
}
