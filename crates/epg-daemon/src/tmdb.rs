//! Movie-metadata enrichment: title lookup against TMDB.
//!
//! Strictly off the schedule path — every failure is a `None`, results
//! (including misses) are cached to disk keyed by title, and nothing here
//! is awaited while building the schedule payload.

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use epg_core::config::TmdbConfig;

const API_BASE: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: i64,
    poster_path: Option<String>,
    vote_average: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    genres: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: String,
    job: String,
}

type TitleCache = HashMap<String, Option<MovieInfo>>;

pub struct TmdbClient {
    client: Client,
    config: TmdbConfig,
    /// title → result; misses are cached as `None` too.
    /// Lazily seeded from the disk cache on first use.
    cache: Mutex<Option<TitleCache>>,
}

impl TmdbClient {
    pub fn new(client: Client, config: TmdbConfig) -> Self {
        Self {
            client,
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    pub fn poster_url(&self, info: &MovieInfo) -> Option<String> {
        info.poster_path
            .as_ref()
            .map(|path| format!("{}{}", self.config.image_base, path))
    }

    pub async fn lookup(&self, title: &str) -> Option<MovieInfo> {
        if !self.enabled() {
            return None;
        }

        {
            let mut cache = self.cache.lock().await;
            let map = cache.get_or_insert_with(|| load_cache_file(&self.config.cache_file));
            if let Some(cached) = map.get(title) {
                return cached.clone();
            }
        }

        let info = match self.fetch_info(title).await {
            Ok(info) => info,
            Err(e) => {
                debug!("tmdb lookup for '{}' failed: {}", title, e);
                None
            }
        };

        let mut cache = self.cache.lock().await;
        let map = cache.get_or_insert_with(|| load_cache_file(&self.config.cache_file));
        map.insert(title.to_string(), info.clone());
        store_cache_file(&self.config.cache_file, map);

        info
    }

    async fn fetch_info(&self, title: &str) -> anyhow::Result<Option<MovieInfo>> {
        let url = Url::parse_with_params(
            &format!("{}/search/movie", API_BASE),
            &[
                ("api_key", self.config.api_key.as_str()),
                ("query", title),
                ("language", self.config.language.as_str()),
                ("page", "1"),
            ],
        )?;
        let search: SearchResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(hit) = search.results.into_iter().next() else {
            return Ok(None);
        };

        let common = [
            ("api_key", self.config.api_key.as_str()),
            ("language", self.config.language.as_str()),
        ];
        let detail_url = Url::parse_with_params(&format!("{}/movie/{}", API_BASE, hit.id), &common)?;
        let credits_url =
            Url::parse_with_params(&format!("{}/movie/{}/credits", API_BASE, hit.id), &common)?;

        // both lookups are best-effort; a failed half degrades to defaults
        let (detail, credits) = tokio::join!(
            self.get_lenient::<DetailResponse>(detail_url),
            self.get_lenient::<CreditsResponse>(credits_url),
        );

        let director = credits
            .crew
            .into_iter()
            .find(|member| member.job == "Director")
            .map(|member| member.name);
        let cast = credits
            .cast
            .into_iter()
            .take(3)
            .map(|member| member.name)
            .collect();
        let genres = detail.genres.into_iter().take(3).map(|g| g.name).collect();

        Ok(Some(MovieInfo {
            poster_path: hit.poster_path,
            vote_average: hit.vote_average,
            director,
            cast,
            genres,
        }))
    }

    async fn get_lenient<T: DeserializeOwned + Default>(&self, url: Url) -> T {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                response.json().await.unwrap_or_default()
            }
            _ => T::default(),
        }
    }
}

fn load_cache_file(path: &Path) -> TitleCache {
    let Ok(content) = std::fs::read_to_string(path) else {
        return TitleCache::new();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

fn store_cache_file(path: &Path, map: &TitleCache) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string(map) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("tmdb cache write failed: {}", e);
            }
        }
        Err(e) => warn!("tmdb cache serialize failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_roundtrip_keeps_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmdb.json");

        let mut map = TitleCache::new();
        map.insert(
            "올드보이".to_string(),
            Some(MovieInfo {
                poster_path: Some("/old.jpg".to_string()),
                vote_average: Some(8.3),
                director: Some("박찬욱".to_string()),
                cast: vec!["최민식".to_string()],
                genres: vec!["스릴러".to_string()],
            }),
        );
        map.insert("없는 영화".to_string(), None);

        store_cache_file(&path, &map);
        let back = load_cache_file(&path);
        assert_eq!(back, map);
    }

    #[test]
    fn test_unreadable_cache_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmdb.json");
        std::fs::write(&path, "{broken").unwrap();
        assert!(load_cache_file(&path).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_disabled_without_key() {
        let client = TmdbClient::new(Client::new(), TmdbConfig::default());
        assert!(!client.enabled());
        assert_eq!(client.lookup("올드보이").await, None);
    }

    #[test]
    fn test_poster_url_composition() {
        let client = TmdbClient::new(Client::new(), TmdbConfig::default());
        let info = MovieInfo {
            poster_path: Some("/abc.jpg".to_string()),
            vote_average: None,
            director: None,
            cast: vec![],
            genres: vec![],
        };
        assert_eq!(
            client.poster_url(&info).as_deref(),
            Some("https://image.tmdb.org/t/p/w200/abc.jpg")
        );
    }
}
