use anyhow::Result;
use serde::Deserialize;

const PROJECT_ID_PATH: &str = "/computeMetadata/v1/project/numeric-project-id";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Client for the instance metadata service.
///
/// An unreachable metadata service means the program is not running in its
/// expected execution environment, so nothing here is retried.
pub struct MetadataClient {
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: &str) -> Self {
        MetadataClient {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Read the numeric project ID from the metadata service.
    pub async fn numeric_project_id(&self) -> Result<String> {
        let mut response = self.get(PROJECT_ID_PATH).await?;
        if response.status() != surf::StatusCode::Ok {
            return Err(anyhow::format_err!(
                "unable to get project ID from metadata service: status {}",
                response.status()
            ));
        }
        response
            .body_string()
            .await
            .map_err(|err| anyhow::format_err!("error reading metadata response: {}", err))
    }

    /// Fetch an access token for the instance's default service account.
    pub async fn access_token(&self) -> Result<String> {
        let mut response = self.get(TOKEN_PATH).await?;
        if response.status() != surf::StatusCode::Ok {
            return Err(anyhow::format_err!(
                "unable to get access token from metadata service: status {}",
                response.status()
            ));
        }
        let token: TokenResponse = response
            .body_json()
            .await
            .map_err(|err| anyhow::format_err!("error decoding token response: {}", err))?;
        Ok(token.access_token)
    }

    async fn get(&self, path: &str) -> Result<surf::Response> {
        surf::get(format!("{}{}", self.base_url, path))
            .header("Metadata-Flavor", "Google")
            .await
            .map_err(|err| anyhow::format_err!("error contacting metadata service: {}", err))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}
