//! Test helper utilities for E2E testing

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Response from POST /api/v1/packages
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: String,
    pub queue_length: usize,
}

/// Response from GET /api/v1/packages/{job_id}
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub status: String,
    pub retry_count: u32,
    pub uploaded_artifact_name: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Submit a packaging request for the given PWA
pub async fn enqueue_package(
    client: &reqwest::Client,
    base_url: &str,
    pwa_url: &str,
) -> Result<EnqueueResponse, Box<dyn std::error::Error>> {
    let options = pwa_packager::models::package::PackageOptions::for_url(pwa_url);
    let response = client
        .post(format!("{}/api/v1/packages", base_url))
        .json(&options)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Enqueue failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<EnqueueResponse>().await?)
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs; // Poll every second

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/packages/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let job = response.json::<JobStatusResponse>().await?;

        match job.status.as_str() {
            "Completed" | "Failed" => return Ok(job),
            "Queued" | "InProgress" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
                }
                sleep(Duration::from_secs(1)).await;
            }
            other => {
                return Err(format!("Unknown job status: {}", other).into());
            }
        }
    }

    Err(format!("Job did not finish within {} seconds", timeout_secs).into())
}
