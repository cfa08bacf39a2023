use crate::config;
use crate::error::CoreError;
use crate::randomness::IntegerRangeSource;

/// HTTP client for a randomnumberapi.com-style service.
///
/// `GET {base}/api/v1.0/random?min=..&max=..&count=1` answers with a JSON
/// array of integers. Any failure, including a well-formed answer outside
/// the requested range, is a [`CoreError::Source`]. No retries.
pub struct RandomNumberApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl RandomNumberApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, CoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CoreError::Source(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    /// The public service with the default timeout.
    pub fn default_public() -> Result<Self, CoreError> {
        Self::new(config::RANDOM_API_BASE_URL, config::RANDOM_API_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch(&self, min: i64, max: i64) -> Result<String, CoreError> {
        let url = format!("{}/api/v1.0/random", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("min", min), ("max", max), ("count", 1)])
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    CoreError::Source(format!("cannot reach {}", self.base_url))
                } else if e.is_timeout() {
                    CoreError::Source(format!("request timed out after {}s", self.timeout_secs))
                } else {
                    CoreError::Source(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Source(format!(
                "random-number service answered {}",
                status.as_u16()
            )));
        }

        response
            .text()
            .map_err(|e| CoreError::Source(format!("unreadable response body: {e}")))
    }
}

/// Extracts the single drawn value from a service response body.
pub fn parse_random_response(body: &str, min: i64, max: i64) -> Result<i64, CoreError> {
    let values: Vec<i64> = serde_json::from_str(body)
        .map_err(|e| CoreError::Source(format!("malformed response {body:?}: {e}")))?;

    let value = *values
        .first()
        .ok_or_else(|| CoreError::Source("empty response".into()))?;

    if !(min..=max).contains(&value) {
        return Err(CoreError::Source(format!(
            "value {value} outside requested range [{min}, {max}]"
        )));
    }
    Ok(value)
}

impl IntegerRangeSource for RandomNumberApiClient {
    fn draw_int(&mut self, min: i64, max: i64) -> Result<i64, CoreError> {
        if min > max {
            return Err(CoreError::Domain(format!("empty range [{min}, {max}]")));
        }
        let body = self.fetch(min, max)?;
        let value = parse_random_response(&body, min, max)?;
        tracing::info!(min, max, value, "Remote random draw");
        Ok(value)
    }
}
