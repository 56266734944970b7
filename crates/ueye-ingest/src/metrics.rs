//! Upload metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const UPLOADS_TOTAL: &str = "ueye_uploads_total";
    pub const UPLOAD_BYTES: &str = "ueye_upload_bytes";
}

pub fn record_upload_accepted(bytes: usize) {
    counter!(names::UPLOADS_TOTAL, "outcome" => "accepted").increment(1);
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

pub fn record_upload_rejected(kind: &'static str) {
    counter!(names::UPLOADS_TOTAL, "outcome" => "rejected", "reason" => kind).increment(1);
}
