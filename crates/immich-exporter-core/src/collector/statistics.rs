//! Asset counts and usage from `/api/server/statistics`.

use crate::client::ServerStatistics;
use crate::registry::{Batch, MetricSeries};

pub const PHOTO_COUNT: &str = "immich_statistics_photo_count";
pub const VIDEO_COUNT: &str = "immich_statistics_video_count";
pub const USAGE: &str = "immich_statistics_usage";
pub const USER_PHOTO_COUNT: &str = "immich_statistics_user_photo_count";
pub const USER_VIDEO_COUNT: &str = "immich_statistics_user_video_count";
pub const USER_USAGE: &str = "immich_statistics_user_usage";
pub const USER_QUOTA_BYTES: &str = "immich_statistics_user_quota_bytes";

const USER_LABELS: [&str; 2] = ["user_id", "user_name"];

pub fn series() -> Vec<MetricSeries> {
    vec![
        MetricSeries::gauge(PHOTO_COUNT, "Immich Photo Count (/api/server/statistics -> photos)"),
        MetricSeries::gauge(VIDEO_COUNT, "Immich Video Count (/api/server/statistics -> videos)"),
        MetricSeries::gauge(USAGE, "Immich Usage in Bytes (/api/server/statistics -> usage)"),
        MetricSeries::gauge(
            USER_PHOTO_COUNT,
            "Immich User Photo Count (/api/server/statistics -> usageByUser[].photos)",
        )
        .with_labels(&USER_LABELS),
        MetricSeries::gauge(
            USER_VIDEO_COUNT,
            "Immich User Video Count (/api/server/statistics -> usageByUser[].videos)",
        )
        .with_labels(&USER_LABELS),
        MetricSeries::gauge(
            USER_USAGE,
            "Immich User Usage in Bytes (/api/server/statistics -> usageByUser[].usage)",
        )
        .with_labels(&USER_LABELS),
        MetricSeries::gauge(
            USER_QUOTA_BYTES,
            "Immich User Quota in Bytes (/api/server/statistics -> usageByUser[].quotaSizeInBytes)",
        )
        .with_labels(&USER_LABELS),
    ]
}

/// Overwrites the global counts and every reported user in place.
///
/// Users missing from the record keep their previous values. A user
/// without a quota reports `0`.
pub fn collect(stats: &ServerStatistics) -> Batch {
    let mut batch = Batch::new();
    batch
        .set(PHOTO_COUNT, &[], stats.photos)
        .set(VIDEO_COUNT, &[], stats.videos)
        .set(USAGE, &[], stats.usage);

    for user in &stats.usage_by_user {
        let labels = [user.user_id.as_str(), user.user_name.as_str()];
        batch
            .set(USER_PHOTO_COUNT, &labels, user.photos)
            .set(USER_VIDEO_COUNT, &labels, user.videos)
            .set(USER_USAGE, &labels, user.usage)
            .set(USER_QUOTA_BYTES, &labels, user.quota_size_in_bytes.unwrap_or(0.0));
    }
    batch
}
