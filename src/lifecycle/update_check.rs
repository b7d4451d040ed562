//! Release update check.
//!
//! Fetches the latest release tag once at startup and logs how the running
//! build compares. Any failure is only visible at debug level.

use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use serde::Deserialize;

use crate::config::UpdateCheckConfig;

/// Upper bound for the whole check.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// How the running build compares with the latest release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    /// Same major.minor, different tag.
    Outdated,
    /// Different major.minor.
    VeryOutdated,
    /// A `-dev` build of the current release line.
    Development,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Compare two `vMAJOR.MINOR.PATCH[-suffix]` tags.
pub fn compare_versions(current: &str, latest: &str) -> UpdateStatus {
    if release_line(current) != release_line(latest) {
        UpdateStatus::VeryOutdated
    } else if current.ends_with("-dev") {
        UpdateStatus::Development
    } else if current != latest {
        UpdateStatus::Outdated
    } else {
        UpdateStatus::UpToDate
    }
}

/// `(major, minor)` of a tag, ignoring a leading `v`.
fn release_line(tag: &str) -> (Option<&str>, Option<&str>) {
    let mut parts = tag.trim_start_matches('v').split(['.', '-']);
    (parts.next(), parts.next())
}

/// Fetch the latest release tag.
pub async fn fetch_latest(url: &str, tls: Arc<ClientConfig>) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder()
        .use_preconfigured_tls((*tls).clone())
        .timeout(CHECK_TIMEOUT)
        .user_agent(concat!("vhost-gateway/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let release: Release = client.get(url).send().await?.error_for_status()?.json().await?;
    Ok(release.tag_name)
}

/// Run the check and log the outcome.
pub async fn check(config: UpdateCheckConfig, tls: Arc<ClientConfig>) -> Option<UpdateStatus> {
    let latest = match fetch_latest(&config.url, tls).await {
        Ok(tag) => tag,
        Err(e) => {
            tracing::debug!(error = %e, "Update check failed");
            return None;
        }
    };

    let current = config.current_version.as_str();
    let status = compare_versions(current, &latest);
    match status {
        UpdateStatus::VeryOutdated => tracing::warn!(
            current,
            latest = %latest,
            "This build is very out of date, please update as soon as possible"
        ),
        UpdateStatus::Outdated => tracing::info!(
            current,
            latest = %latest,
            "A newer release is available"
        ),
        UpdateStatus::Development => {
            tracing::info!(current, "Running a development build is not recommended")
        }
        UpdateStatus::UpToDate => tracing::debug!(current, "Up to date"),
    }
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_release_lines_first() {
        assert_eq!(compare_versions("v1.9.0", "v1.10.0"), UpdateStatus::VeryOutdated);
        assert_eq!(compare_versions("v2.0.0-dev", "v1.10.0"), UpdateStatus::VeryOutdated);
        assert_eq!(compare_versions("v1.10-dev", "v1.10.2"), UpdateStatus::Development);
        assert_eq!(compare_versions("v1.10.1", "v1.10.2"), UpdateStatus::Outdated);
        assert_eq!(compare_versions("v1.10.2", "v1.10.2"), UpdateStatus::UpToDate);
    }

    #[test]
    fn reads_tag_from_release_payload() {
        let payload = r#"{"tag_name":"v1.10.2","name":"1.10.2","draft":false}"#;
        let release: Release = serde_json::from_str(payload).unwrap();
        assert_eq!(release.tag_name, "v1.10.2");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_silent() {
        let config = UpdateCheckConfig {
            enabled: true,
            url: "http://127.0.0.1:9/releases/latest".into(),
            current_version: "v0.1.0".into(),
        };
        let tls = crate::net::client_config().unwrap();
        assert!(check(config, tls).await.is_none());
    }
}
