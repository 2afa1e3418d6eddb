//! Dated text report of the fetched catalog.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::MediaDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Line written after every entry.
    #[serde(default = "default_divider")]
    pub divider: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            divider: default_divider(),
        }
    }
}

fn default_divider() -> String {
    "-".repeat(120)
}

/// Report file name for the day of `at`.
pub fn report_file_name(at: &DateTime<Local>) -> String {
    format!("report-{}.txt", at.format("%Y-%m-%d"))
}

/// Renders one block per descriptor.
pub fn render_report(descriptors: &[MediaDescriptor], divider: &str, at: &DateTime<Local>) -> String {
    let generated = at.format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    for d in descriptors {
        let cover = d.cover_url.as_deref().unwrap_or("unknown");
        let s = &d.stats;
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "《{title}》 | {id}\n\
             \n\
             Duration  | {duration}\n\
             Published | {published}\n\
             Cover     | {cover}\n\
             \n\
             Plays: {play}\n\
             Replies: {reply} | Shares: {share} | Danmaku: {danmaku}\n\
             Likes: {like} | Coins: {coin} | Favorites: {collect}\n\
             \n\
             Generated | {generated}\n\
             \n\
             {divider}\n\n",
            title = d.title,
            id = d.id,
            duration = d.duration_display(),
            published = d.published_display(),
            play = s.play,
            reply = s.reply,
            share = s.share,
            danmaku = s.danmaku,
            like = s.thumb_up,
            coin = s.coin,
            collect = s.collect,
        );
    }
    out
}

/// Writes the report for `descriptors` into `data_dir`.
///
/// Returns the written path, or `None` when there was nothing to report.
/// A report from earlier the same day is replaced.
pub async fn write_report(
    descriptors: &[MediaDescriptor],
    data_dir: &Path,
    config: &ReportConfig,
) -> std::io::Result<Option<PathBuf>> {
    if descriptors.is_empty() {
        info!("Nothing to report");
        return Ok(None);
    }

    let now = Local::now();
    let path = data_dir.join(report_file_name(&now));
    tokio::fs::write(&path, render_report(descriptors, &config.divider, &now)).await?;

    info!(path = %path.display(), entries = descriptors.len(), "Report written");
    Ok(Some(path))
}
