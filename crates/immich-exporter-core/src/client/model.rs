//! Response records of the Immich server API.
//!
//! Only the fields the exporter reads are modelled; everything else in the
//! payloads is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

/// `GET /api/server/storage`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStorage {
    pub disk_available_raw: f64,
    pub disk_size_raw: f64,
    pub disk_use_raw: f64,
    pub disk_usage_percentage: f64,
}

/// `GET /api/server/statistics`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatistics {
    pub photos: f64,
    pub videos: f64,
    pub usage: f64,
    /// Absent list means no per-user samples.
    #[serde(default)]
    pub usage_by_user: Vec<UserUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub user_id: String,
    pub user_name: String,
    pub photos: f64,
    pub videos: f64,
    pub usage: f64,
    /// `null` for users without a quota.
    #[serde(default)]
    pub quota_size_in_bytes: Option<f64>,
}

/// `GET /api/jobs`: queue name, as sent by the server, to its state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ServerJobs {
    pub queues: BTreeMap<String, JobQueue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQueue {
    /// Job status (`active`, `waiting`, ...) to number of jobs.
    pub job_counts: BTreeMap<String, f64>,
    pub queue_status: QueueStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub is_active: bool,
    pub is_paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_ignores_formatted_fields() {
        let json = r#"{
            "diskAvailable": "1.2 TiB",
            "diskAvailableRaw": 1319413953331,
            "diskSize": "1.8 TiB",
            "diskSizeRaw": 1979120929996,
            "diskUse": "600 GiB",
            "diskUseRaw": 644245094400,
            "diskUsagePercentage": 32.55
        }"#;
        let storage: ServerStorage = serde_json::from_str(json).unwrap();
        assert_eq!(storage.disk_available_raw, 1319413953331.0);
        assert_eq!(storage.disk_usage_percentage, 32.55);
    }

    #[test]
    fn statistics_null_quota_and_missing_user_list() {
        let json = r#"{
            "photos": 10, "videos": 2, "usage": 1000,
            "usageByUser": [{
                "userId": "u1", "userName": "Alice",
                "photos": 10, "videos": 2, "usage": 1000,
                "quotaSizeInBytes": null
            }]
        }"#;
        let stats: ServerStatistics = serde_json::from_str(json).unwrap();
        assert_eq!(stats.usage_by_user[0].quota_size_in_bytes, None);

        let stats: ServerStatistics =
            serde_json::from_str(r#"{"photos": 0, "videos": 0, "usage": 0}"#).unwrap();
        assert!(stats.usage_by_user.is_empty());
    }

    #[test]
    fn jobs_keyed_by_queue_name() {
        let json = r#"{
            "thumbnailGeneration": {
                "jobCounts": {"active": 2, "completed": 10, "failed": 0, "delayed": 0, "waiting": 1, "paused": 0},
                "queueStatus": {"isActive": true, "isPaused": false}
            }
        }"#;
        let jobs: ServerJobs = serde_json::from_str(json).unwrap();
        let queue = &jobs.queues["thumbnailGeneration"];
        assert_eq!(queue.job_counts["active"], 2.0);
        assert!(queue.queue_status.is_active);
        assert!(!queue.queue_status.is_paused);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let result: Result<ServerStorage, _> = serde_json::from_str(r#"{"diskSizeRaw": "big"}"#);
        assert!(result.is_err());
    }
}
