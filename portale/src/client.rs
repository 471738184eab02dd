//! Client HTTP du portail
//!
//! Un seul essai par requête : pas de retry ni de backoff.

use std::time::Duration;

use async_trait::async_trait;
use geojson::FeatureCollection;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Certificate, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::PortaleError;
use crate::types::{AreaDetail, RawFeature};
use crate::AB_LAYER;

/// URL de base du portail public
pub const DEFAULT_BASE_URL: &str = "https://www.portaleacque.salute.gov.it/PortaleAcquePubblico";

/// User-Agent de navigateur : le portail refuse les clients « nus »
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.4844.74 Safari/537.36";

/// Source des données du portail
///
/// Le trait sert de couture pour les tests : le pipeline ne dépend que de lui.
#[async_trait]
pub trait PortaleSource: Send + Sync {
    /// Récupère les features de la couche AB pour une région (code ISTAT)
    async fn region_features(&self, region: &str) -> Result<Vec<RawFeature>, PortaleError>;

    /// Récupère le détail d'une zone
    async fn area_detail(&self, code: i64) -> Result<AreaDetail, PortaleError>;
}

/// Configuration du client HTTP
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL de base, sans slash final
    pub base_url: String,
    /// Timeout par requête
    pub timeout: Duration,
    /// Certificat racine supplémentaire (PEM)
    pub ca_cert_pem: Option<Vec<u8>>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(30),
            ca_cert_pem: None,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

/// Implémentation HTTP de [`PortaleSource`]
#[derive(Debug, Clone)]
pub struct HttpPortale {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPortale {
    /// Construit le client avec les en-têtes attendus par le portail
    pub fn new(config: ClientConfig) -> Result<Self, PortaleError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut builder = Client::builder()
            .default_headers(default_headers(&base_url))
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(30));

        if let Some(pem) = &config.ca_cert_pem {
            let cert = Certificate::from_pem(pem).map_err(PortaleError::Certificate)?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(PortaleError::Client)?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL de la couche AB pour une région
    pub fn region_url(&self, region: &str) -> String {
        format!("{}/{}/{}", self.base_url, AB_LAYER, region)
    }

    /// URL du détail d'une zone
    pub fn area_url(&self, code: i64) -> String {
        format!(
            "{}/datiArea.do?codiceArea={}&tipoArea=undefined&isFuoriNorma=undefined",
            self.base_url, code
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        area: Option<i64>,
    ) -> Result<T, PortaleError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| PortaleError::Transport {
                url: url.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortaleError::Request {
                url: url.to_owned(),
                status: status.as_u16(),
                area,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| PortaleError::Transport {
                url: url.to_owned(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| PortaleError::Decode {
            url: url.to_owned(),
            source,
        })
    }
}

#[async_trait]
impl PortaleSource for HttpPortale {
    async fn region_features(&self, region: &str) -> Result<Vec<RawFeature>, PortaleError> {
        let url = self.region_url(region);
        let collection: FeatureCollection = self.get_json(&url, None).await?;

        let total = collection.features.len();
        let features: Vec<RawFeature> = collection
            .features
            .into_iter()
            .filter_map(|f| RawFeature::from_geojson(f, region))
            .collect();

        if features.len() < total {
            warn!(
                region = region,
                skipped = total - features.len(),
                "Features without area code or geometry"
            );
        }
        debug!(region = region, features = features.len(), "Region layer fetched");

        Ok(features)
    }

    async fn area_detail(&self, code: i64) -> Result<AreaDetail, PortaleError> {
        let url = self.area_url(code);
        self.get_json(&url, Some(code)).await
    }
}

fn default_headers(base_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,it;q=0.8"),
    );
    headers.insert(header::COOKIE, HeaderValue::from_static("cookies_consent=true"));

    // Origin = schéma + hôte, Referer = base du portail
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", base_url)) {
        headers.insert(header::REFERER, referer);
    }
    let origin = base_url
        .find("://")
        .and_then(|scheme_end| {
            let host_start = scheme_end + 3;
            base_url[host_start..]
                .find('/')
                .map(|path_start| &base_url[..host_start + path_start])
        })
        .unwrap_or(base_url);
    if let Ok(origin) = HeaderValue::from_str(origin) {
        headers.insert(header::ORIGIN, origin);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portale() -> HttpPortale {
        HttpPortale::new(ClientConfig {
            base_url: "https://example.org/Portale/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let p = portale();
        assert_eq!(p.base_url(), "https://example.org/Portale");
        assert_eq!(p.region_url("048017"), "https://example.org/Portale/rest/layer/AB/048017");
        assert_eq!(
            p.area_url(12),
            "https://example.org/Portale/datiArea.do?codiceArea=12&tipoArea=undefined&isFuoriNorma=undefined"
        );
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers("https://example.org/Portale");
        assert_eq!(headers[header::ORIGIN], "https://example.org");
        assert_eq!(headers[header::REFERER], "https://example.org/Portale/");
        assert_eq!(headers[header::COOKIE], "cookies_consent=true");
    }
}
