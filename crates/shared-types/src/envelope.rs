//! Response envelope shared by every booking-service endpoint.
//!
//! Each response carries a `responseResult` block next to its payload
//! fields. The envelope keeps the two apart so callers can check the
//! application-level success flag before touching the payload.

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Application-level outcome embedded in every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseResult {
    /// `"1"` on success, anything else on failure
    #[serde(default)]
    pub is_success: String,

    #[serde(default)]
    pub message: String,
}

impl ResponseResult {
    pub fn succeeded(&self) -> bool {
        self.is_success == "1"
    }
}

/// A payload together with the `responseResult` block it arrived with.
///
/// # Example
///
/// ```
/// use shared_types::{DeptSchedule, Envelope};
///
/// let body = r#"{"responseResult":{"isSuccess":"1","message":""},"deptResourceDocNoSourceList":[]}"#;
/// let envelope: Envelope<DeptSchedule> = serde_json::from_str(body).unwrap();
/// assert!(envelope.response_result.succeeded());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub response_result: ResponseResult,

    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Split into the payload, or the upstream message when the
    /// success flag is not set.
    pub fn into_result(self) -> Result<T, String> {
        if self.response_result.succeeded() {
            Ok(self.payload)
        } else {
            Err(self.response_result.message)
        }
    }

    pub fn into_inner(self) -> T {
        self.payload
    }
}

impl<T> Deref for Envelope<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeptSchedule, DoctorSchedule};

    #[test]
    fn test_success_envelope_yields_payload() {
        let body = r#"{
            "responseResult": {"isSuccess": "1", "message": "ok"},
            "deptResourceDocNoSourceList": [
                {"docCode": "1001_1_1207_633", "day": "2025-04-01", "resourceMemo": "上午", "isAvailable": "1"}
            ]
        }"#;

        let envelope: Envelope<DeptSchedule> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.dept_resource_doc_no_source_list.len(), 1);

        let schedule = envelope.into_result().expect("should succeed");
        assert_eq!(schedule.dept_resource_doc_no_source_list[0].day, "2025-04-01");
    }

    #[test]
    fn test_failure_envelope_yields_message() {
        let body = r#"{"responseResult": {"isSuccess": "0", "message": "登录已过期"}}"#;

        let envelope: Envelope<DoctorSchedule> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.into_result().unwrap_err(), "登录已过期");
    }

    #[test]
    fn test_missing_result_block_is_failure() {
        let envelope: Envelope<DoctorSchedule> = serde_json::from_str("{}").unwrap();
        assert!(!envelope.response_result.succeeded());
        assert!(envelope.into_result().is_err());
    }
}
