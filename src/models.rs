use serde::Serialize;

/// immutable progress record for one in-flight upload.
///
/// a brand new snapshot is constructed on every state change and the store
/// entry is replaced wholesale, so concurrent readers never see a
/// half-updated value.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total_bytes: u64,
    pub bytes_read: u64,
    pub file_name: String,
}

impl ProgressSnapshot {
    /// snapshot published before the first body byte is read
    pub fn started(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            bytes_read: 0,
            file_name: String::new(),
        }
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.total_bytes - self.bytes_read
    }

    /// a terminal snapshot signals completion to pollers
    pub fn is_complete(&self) -> bool {
        self.bytes_read == self.total_bytes
    }
}

// response for the progress poll endpoint
#[derive(Serialize, Debug)]
pub struct ProgressResponse {
    pub total_bytes: u64,
    pub bytes_read: u64,
    pub bytes_remaining: u64,
    pub file_name: String,
    pub complete: bool,
}

impl From<ProgressSnapshot> for ProgressResponse {
    fn from(s: ProgressSnapshot) -> Self {
        let bytes_remaining = s.bytes_remaining();
        let complete = s.is_complete();
        Self {
            total_bytes: s.total_bytes,
            bytes_read: s.bytes_read,
            bytes_remaining,
            file_name: s.file_name,
            complete,
        }
    }
}

// response for file upload endpoint
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub size: u64,
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
