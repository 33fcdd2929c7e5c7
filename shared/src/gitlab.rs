use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, instrument};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const PER_PAGE: u32 = 100;

/// A monitored project, as configured or as returned by the projects list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub id: u64,
    pub username: String,
    /// GitLab exposes the display name as `name`.
    #[serde(rename = "name")]
    pub display_name: String,
}

/// A contribution event. `created_at` is kept as the ISO-8601 string GitLab
/// returns; the format is fixed-width and zero-padded, so lexicographic
/// comparison is chronological.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Event {
    pub author_id: u64,
    pub action_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub username: String,
}

#[derive(Clone)]
pub struct GitlabClient {
    http: Client,
    api_url: String,
    token: String,
}

impl GitlabClient {
    pub fn new(base_url: &str, token: String) -> Self {
        Self {
            http: Client::new(),
            api_url: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token,
        }
    }

    /// All members of the project, including ones inherited from parent
    /// groups.
    #[instrument(skip(self))]
    pub async fn project_members(&self, project_id: u64) -> anyhow::Result<Vec<Member>> {
        let url = format!("{}/projects/{}/members/all", self.api_url, project_id);
        self.fetch_all_pages(&url, &[]).await
    }

    /// Project events created after the given date.
    #[instrument(skip(self))]
    pub async fn project_events_after(
        &self,
        project_id: u64,
        after: NaiveDate,
    ) -> anyhow::Result<Vec<Event>> {
        let url = format!("{}/projects/{}/events", self.api_url, project_id);
        self.fetch_all_pages(&url, &[("after", after.to_string())])
            .await
    }

    /// The account the token authenticates as.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> anyhow::Result<UserProfile> {
        let url = format!("{}/user", self.api_url);
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;
        self.decode(response, &url).await
    }

    /// Every project the token can see, optionally narrowed by a search
    /// term.
    #[instrument(skip(self))]
    pub async fn accessible_projects(&self, search: Option<&str>) -> anyhow::Result<Vec<Project>> {
        let url = format!("{}/projects", self.api_url);
        let query: Vec<(&str, String)> = search
            .map(|term| vec![("search", term.to_string())])
            .unwrap_or_default();
        self.fetch_all_pages(&url, &query).await
    }

    /// Follows pagination until an empty page is returned.
    async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Vec<T>> {
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let response = self
                .http
                .get(url)
                .header(TOKEN_HEADER, &self.token)
                .query(query)
                .query(&[("page", page.to_string()), ("per_page", PER_PAGE.to_string())])
                .send()
                .await?;
            let items: Vec<T> = self.decode(response, url).await?;
            if items.is_empty() {
                return Ok(results);
            }
            results.extend(items);
            page += 1;
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        url: &str,
    ) -> anyhow::Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, url, "GitLab API request failed");
            anyhow::bail!("GitLab API request to {url} failed with {status}");
        }
        Ok(response.json().await?)
    }
}
