//! The fixed set of endpoints probed for the status page.

use crate::health::{Locale, Translations};

use serde::Serialize;

/// How a probe response is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Landing page: any successful response counts.
    HomePage,
    /// Service health: body must report `"status": "healthy"`.
    ServiceHealth,
    /// Data freshness: body carries an `is_updated` flag.
    Freshness,
}

/// A monitored endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub url: String,
    pub kind: EndpointKind,
    pub translations: Translations,
}

impl Endpoint {
    pub fn name(&self, locale: Locale) -> &str {
        self.translations.get(locale)
    }
}

/// Endpoints monitored under the given API base URL.
#[derive(Debug, Clone)]
pub struct Catalog {
    endpoints: Vec<Endpoint>,
}

impl Catalog {
    pub fn new(api_url: &str) -> Self {
        let base = api_url.trim_end_matches('/');
        let endpoint = |id: &str, path: &str, kind: EndpointKind, en: &str, he: &str| Endpoint {
            id: id.to_string(),
            url: format!("{}{}", base, path),
            kind,
            translations: Translations::new(en, he),
        };

        Self {
            endpoints: vec![
                endpoint(
                    "long-term",
                    "/api/long_term_health",
                    EndpointKind::Freshness,
                    "Long Term Historical Data Storage",
                    "אחסון נתונים היסטורי",
                ),
                endpoint(
                    "short-term",
                    "/api/short_term_health",
                    EndpointKind::Freshness,
                    "Data Processing",
                    "עיבוד נתונים",
                ),
                endpoint(
                    "service",
                    "/api/service_health",
                    EndpointKind::ServiceHealth,
                    "API Functionality",
                    "פונקציונליות ה-API",
                ),
                endpoint("home", "", EndpointKind::HomePage, "Home Page", "דף הבית"),
            ],
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn find_by_url(&self, url: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.url == url)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;

    #[test]
    fn test_catalog_urls() {
        let catalog = Catalog::new(DEFAULT_API_URL);
        let urls: Vec<&str> = catalog.endpoints().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.openisraelisupermarkets.co.il/api/long_term_health",
                "https://www.openisraelisupermarkets.co.il/api/short_term_health",
                "https://www.openisraelisupermarkets.co.il/api/service_health",
                "https://www.openisraelisupermarkets.co.il",
            ]
        );
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let catalog = Catalog::new("http://localhost:3000/");
        let home = catalog.find_by_id("home").unwrap();
        assert_eq!(home.url, "http://localhost:3000");
        assert_eq!(home.kind, EndpointKind::HomePage);
    }

    #[test]
    fn test_lookup_and_names() {
        let catalog = Catalog::new(DEFAULT_API_URL);
        let service = catalog
            .find_by_url("https://www.openisraelisupermarkets.co.il/api/service_health")
            .unwrap();
        assert_eq!(service.id, "service");
        assert_eq!(service.name(Locale::En), "API Functionality");
        assert_eq!(service.name(Locale::He), "פונקציונליות ה-API");
        assert!(catalog.find_by_id("missing").is_none());
    }
}
