use thiserror::Error;

use crate::types::GuestCategory;

/// Write stage of a submission, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    Guests(GuestCategory),
    Revenue(GuestCategory),
    Payments(GuestCategory),
    Commit,
}

impl std::fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitStage::Guests(c) => write!(f, "Lỗi khi lưu danh sách {}", c),
            SubmitStage::Revenue(c) => write!(f, "Lỗi khi lưu doanh thu {}", c),
            SubmitStage::Payments(c) => write!(f, "Lỗi khi lưu thanh toán {}", c),
            SubmitStage::Commit => f.write_str("Lỗi khi hoàn tất import"),
        }
    }
}

/// Fatal import failures. Duplicate phones and unknown roles are reported, not raised.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File không có dữ liệu hoặc thiếu header.")]
    MalformedFile,

    #[error("Headers của file không khớp với mẫu.")]
    HeaderMismatch,

    #[error("{stage}: {message}")]
    Persistence { stage: SubmitStage, message: String },

    #[error("Không thể đọc dữ liệu khách hiện có: {0}")]
    Store(String),

    #[error("Không thể tạo thêm ID với tiền tố {0}.")]
    IdSequenceExhausted(String),
}

impl ImportError {
    /// Wire code used in error responses
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::MalformedFile => "MALFORMED_FILE",
            ImportError::HeaderMismatch => "HEADER_MISMATCH",
            ImportError::Persistence { .. } => "PERSISTENCE_ERROR",
            ImportError::Store(_) => "STORE_ERROR",
            ImportError::IdSequenceExhausted(_) => "ID_SEQUENCE_EXHAUSTED",
        }
    }
}
