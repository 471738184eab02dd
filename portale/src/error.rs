//! Types d'erreurs pour le crate portale

use thiserror::Error;

/// Erreurs pouvant survenir lors d'un appel au portail
#[derive(Debug, Error)]
pub enum PortaleError {
    /// Le client HTTP n'a pas pu être construit
    #[error("HTTP client configuration failed: {0}")]
    Client(#[source] reqwest::Error),

    /// Certificat racine supplémentaire illisible
    #[error("Invalid CA certificate: {0}")]
    Certificate(#[source] reqwest::Error),

    /// Réponse avec un statut HTTP non-succès
    #[error("Request to {url} failed with status {status}")]
    Request {
        url: String,
        status: u16,
        /// Code de zone concerné (absent pour la couche régionale)
        area: Option<i64>,
    },

    /// Échec de transport (connexion, timeout, lecture du corps)
    #[error("Transport error on {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Corps de réponse non décodable
    #[error("Invalid JSON payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PortaleError {
    /// URL de la requête en échec, si connue
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Request { url, .. } | Self::Transport { url, .. } | Self::Decode { url, .. } => {
                Some(url)
            }
            Self::Client(_) | Self::Certificate(_) => None,
        }
    }

    /// Statut HTTP pour les erreurs de requête
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Vrai si la réponse est arrivée mais n'était pas exploitable
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_context() {
        let err = PortaleError::Request {
            url: "https://example.org/datiArea.do?codiceArea=42".to_string(),
            status: 503,
            area: Some(42),
        };

        assert_eq!(err.status(), Some(503));
        assert_eq!(err.url(), Some("https://example.org/datiArea.do?codiceArea=42"));
        assert!(!err.is_decode());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_decode_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PortaleError::Decode {
            url: "u".to_string(),
            source,
        };
        assert!(err.is_decode());
        assert_eq!(err.status(), None);
    }
}
