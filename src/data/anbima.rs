//! ANBIMA ETTJ feed integration.
//!
//! The feed publishes, per reference date, a list of vertices keyed by
//! business days to maturity (`vertice_du`) with the fixed-rate, IPCA-linked
//! and implied-inflation rates in percent. The first two become fitting
//! quotes; all three are also kept as the published vertex curve.

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::data::credentials::{self, CredentialProvider};
use crate::data::source::QuoteSource;
use crate::domain::{PublishedVertex, Quote, QuoteSet};
use crate::error::AppError;

pub const BASE_URL: &str =
    "https://api.anbima.com.br/feed/precos-indices/v1/titulos-publicos/curvas-juros";

/// Business days per year used to turn `vertice_du` into years.
pub const BUSINESS_DAYS_PER_YEAR: f64 = 252.0;

/// One published curve date.
#[derive(Debug, Clone, Deserialize)]
pub struct CurveDay {
    pub data_referencia: String,
    #[serde(default)]
    pub ettj: Vec<Vertex>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vertex {
    pub vertice_du: Option<f64>,
    #[serde(default)]
    pub taxa_prefixadas: Option<f64>,
    #[serde(default)]
    pub taxa_ipca: Option<f64>,
    /// Implied inflation; published only, never fitted.
    #[serde(default)]
    pub taxa_implicita: Option<f64>,
}

pub struct AnbimaClient {
    client: Client,
    base_url: String,
    credentials: Box<dyn CredentialProvider>,
}

impl AnbimaClient {
    pub fn new(credentials: Box<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
            credentials,
        }
    }

    /// Client with credentials taken from the process environment.
    pub fn from_env() -> Self {
        Self::new(credentials::from_env())
    }

    fn fetch_days(&self, date: NaiveDate) -> Result<Option<Vec<CurveDay>>, AppError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        info!(date = %date_str, "fetching ANBIMA ETTJ");

        let mut req = self
            .client
            .get(&self.base_url)
            .query(&[("data_referencia", date_str.as_str())]);
        for (name, value) in self.credentials.headers(&self.client)? {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .map_err(|e| AppError::new(4, format!("ANBIMA request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::new(
                4,
                format!("ANBIMA request failed with status {status}."),
            ));
        }

        let body: Vec<CurveDay> = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse ANBIMA response: {e}")))?;
        Ok(Some(body))
    }
}

impl QuoteSource for AnbimaClient {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        let Some(days) = self.fetch_days(date)? else {
            warn!(%date, "no ETTJ published");
            return Ok(None);
        };
        let set = adapt_curves(date, &days);
        if set.is_none() {
            warn!(%date, "no usable ETTJ vertices");
        }
        Ok(set)
    }
}

/// Map the feed payload to the quotes of `date`.
///
/// Entries for other reference dates are ignored (the feed may fall back to
/// the latest available date). Vertices without `vertice_du`, with a
/// non-positive one, or without a rate for a family are skipped for that
/// family. Every vertex with a positive `vertice_du` and at least one rate is
/// also kept in `QuoteSet::published`, keyed by its business days. Returns
/// `None` when nothing usable remains.
pub fn adapt_curves(date: NaiveDate, days: &[CurveDay]) -> Option<QuoteSet> {
    let mut set = QuoteSet::new(date);

    for day in days {
        match NaiveDate::parse_from_str(day.data_referencia.trim(), "%Y-%m-%d") {
            Ok(d) if d == date => {}
            Ok(d) => {
                debug!(requested = %date, published = %d, "skipping other reference date");
                continue;
            }
            Err(e) => {
                warn!(raw = %day.data_referencia, error = %e, "invalid data_referencia");
                continue;
            }
        }

        for v in &day.ettj {
            let Some(du) = v.vertice_du.filter(|du| du.is_finite() && *du > 0.0) else {
                continue;
            };
            let maturity = du / BUSINESS_DAYS_PER_YEAR;
            if let Some(y) = v.taxa_prefixadas.filter(|y| y.is_finite()) {
                set.nominal.push(Quote::new(maturity, y));
            }
            if let Some(y) = v.taxa_ipca.filter(|y| y.is_finite()) {
                set.real.push(Quote::new(maturity, y));
            }

            let vertex = PublishedVertex {
                du,
                nominal: v.taxa_prefixadas.filter(|y| y.is_finite()),
                real: v.taxa_ipca.filter(|y| y.is_finite()),
                breakeven: v.taxa_implicita.filter(|y| y.is_finite()),
            };
            if vertex.nominal.is_some() || vertex.real.is_some() || vertex.breakeven.is_some() {
                set.published.push(vertex);
            }
        }
    }

    if set.is_empty() {
        None
    } else {
        debug!(
            %date,
            nominal = set.nominal.len(),
            real = set.real.len(),
            published = set.published.len(),
            "ETTJ vertices adapted"
        );
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<CurveDay> {
        serde_json::from_str(
            r#"[{
                "data_referencia": "2024-11-14",
                "ettj": [
                    {"vertice_du": 252, "taxa_prefixadas": 12.5, "taxa_ipca": 6.4, "taxa_implicita": 5.7},
                    {"vertice_du": 504, "taxa_prefixadas": 12.9, "taxa_ipca": null, "taxa_implicita": null},
                    {"vertice_du": 1260, "taxa_ipca": 6.6},
                    {"vertice_du": null, "taxa_prefixadas": 11.0}
                ]
            }]"#,
        )
        .unwrap()
    }

    #[test]
    fn maps_business_days_to_years() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let set = adapt_curves(date, &payload()).unwrap();

        assert_eq!(set.nominal, vec![Quote::new(1.0, 12.5), Quote::new(2.0, 12.9)]);
        assert_eq!(set.real, vec![Quote::new(1.0, 6.4), Quote::new(5.0, 6.6)]);
    }

    #[test]
    fn keeps_published_vertices_by_business_days() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let set = adapt_curves(date, &payload()).unwrap();

        let du: Vec<f64> = set.published.iter().map(|v| v.du).collect();
        assert_eq!(du, vec![252.0, 504.0, 1260.0]);
        assert_eq!(
            set.published[0],
            PublishedVertex {
                du: 252.0,
                nominal: Some(12.5),
                real: Some(6.4),
                breakeven: Some(5.7),
            }
        );
        assert_eq!(set.published[1].breakeven, None);
        assert_eq!(set.published[2].nominal, None);
    }

    #[test]
    fn implied_inflation_alone_is_still_data() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let days: Vec<CurveDay> = serde_json::from_str(
            r#"[{"data_referencia": "2024-11-14", "ettj": [{"vertice_du": 126, "taxa_implicita": 4.9}]}]"#,
        )
        .unwrap();
        let set = adapt_curves(date, &days).unwrap();
        assert!(set.nominal.is_empty() && set.real.is_empty());
        assert_eq!(set.published.len(), 1);
    }

    #[test]
    fn other_reference_dates_are_ignored() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 15).unwrap();
        assert!(adapt_curves(date, &payload()).is_none());
    }

    #[test]
    fn empty_payload_is_no_data() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let days: Vec<CurveDay> = serde_json::from_str("[]").unwrap();
        assert!(adapt_curves(date, &days).is_none());
    }
}
