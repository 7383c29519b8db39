use crate::config::{normalize_region_code, EiaSettings};
use crate::error::AppError;
use crate::prices::FuelPriceLookup;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.eia.gov";
const DATA_PATH: &str = "/v2/petroleum/pri/gnd/data/";
const REGULAR_GASOLINE: &str = "EPMR";

/// Weekly retail gasoline prices from the U.S. Energy Information Administration.
pub struct EiaPriceSource {
    client: Client,
    base_url: String,
    api_key: String,
    series: HashMap<String, String>,
}

impl EiaPriceSource {
    pub fn new(client: Client, settings: &EiaSettings, api_key: String) -> Self {
        Self {
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            series: settings
                .series
                .iter()
                .map(|(region, id)| (normalize_region_code(region), id.clone()))
                .collect(),
        }
    }

    fn series_id(&self, region: &str) -> Result<&str, AppError> {
        self.series
            .get(&normalize_region_code(region))
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::PriceUnavailable(format!(
                    "gas price data not available for region '{region}'"
                ))
            })
    }

    /// Latest weekly figure on or before `date`.
    fn data_url(&self, series_id: &str, date: NaiveDate) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(DATA_PATH))
            .map_err(|e| {
                AppError::Config(format!("invalid EIA base url '{}': {e}", self.base_url))
            })?;
        url.query_pairs_mut()
            .append_pair("frequency", "weekly")
            .append_pair("data[0]", "value")
            .append_pair("facets[product][]", REGULAR_GASOLINE)
            .append_pair("facets[series][]", series_id)
            .append_pair("sort[0][column]", "period")
            .append_pair("sort[0][direction]", "desc")
            .append_pair("end", &date.format("%Y-%m-%d").to_string())
            .append_pair("offset", "0")
            .append_pair("length", "1")
            .append_pair("api_key", &self.api_key);
        Ok(url)
    }

    /// EIA sends `value` as a number or as a numeric string depending on the series.
    fn parse_price(body: &Value) -> Result<f64, AppError> {
        let item = body.pointer("/response/data/0").ok_or_else(|| {
            AppError::PriceUnavailable("no recent gas price data was found".into())
        })?;

        let price = match item.get("value") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match price {
            Some(p) if p.is_finite() && p > 0.0 => Ok(p),
            _ => Err(AppError::PriceUnavailable(
                "invalid gas price data format".into(),
            )),
        }
    }
}

#[async_trait]
impl FuelPriceLookup for EiaPriceSource {
    fn name(&self) -> &'static str {
        "eia"
    }

    async fn price_per_gallon(&self, region: &str, date: NaiveDate) -> Result<f64, AppError> {
        let series_id = self.series_id(region)?;
        let url = self.data_url(series_id, date)?;
        debug!(region, series_id, %date, "fetching EIA gas price");

        let fetch_failed = |e: reqwest::Error| {
            AppError::PriceUnavailable(format!("failed to fetch data from EIA API: {e}"))
        };
        let body: Value = self
            .client
            .get(url)
            .send()
            .await
            .map_err(fetch_failed)?
            .error_for_status()
            .map_err(fetch_failed)?
            .json()
            .await
            .map_err(fetch_failed)?;

        let price = Self::parse_price(&body).inspect_err(|e| {
            warn!(region, series_id, error = %e, "EIA response had no usable price");
        })?;
        debug!(region, price, "EIA price resolved");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NC_SERIES: &str = "EMM_EPMR_PTE_R10_DPG";

    fn source(base_url: &str) -> EiaPriceSource {
        let settings = EiaSettings {
            base_url: Some(base_url.to_string()),
            series: HashMap::from([("nc".to_string(), NC_SERIES.to_string())]),
        };
        EiaPriceSource::new(Client::new(), &settings, "test-key".into())
    }

    fn trip_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("date")
    }

    async fn mock_server(body: Value, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DATA_PATH))
            .and(query_param("facets[series][]", NC_SERIES))
            .and(query_param("end", "2024-03-05"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn fetches_numeric_price() {
        let server = mock_server(
            json!({ "response": { "data": [ { "period": "2024-03-04", "value": 3.199 } ] } }),
            200,
        )
        .await;
        let price = source(&server.uri())
            .price_per_gallon("NC", trip_date())
            .await
            .expect("price");
        assert_eq!(price, 3.199);
    }

    #[tokio::test]
    async fn accepts_price_sent_as_string() {
        let server = mock_server(
            json!({ "response": { "data": [ { "period": "2024-03-04", "value": "3.287" } ] } }),
            200,
        )
        .await;
        let price = source(&server.uri())
            .price_per_gallon("nc", trip_date())
            .await
            .expect("price");
        assert_eq!(price, 3.287);
    }

    #[tokio::test]
    async fn empty_data_is_unavailable() {
        let server = mock_server(json!({ "response": { "data": [] } }), 200).await;
        let err = source(&server.uri())
            .price_per_gallon("NC", trip_date())
            .await
            .expect_err("no data");
        assert!(matches!(err, AppError::PriceUnavailable(_)));
        assert!(err.to_string().contains("no recent gas price data"));
    }

    #[tokio::test]
    async fn http_errors_are_unavailable() {
        let server = mock_server(json!({ "error": "bad key" }), 403).await;
        let err = source(&server.uri())
            .price_per_gallon("NC", trip_date())
            .await
            .expect_err("forbidden");
        assert!(matches!(err, AppError::PriceUnavailable(_)));
    }

    #[tokio::test]
    async fn unmapped_region_fails_without_request() {
        let server = MockServer::start().await;
        let err = source(&server.uri())
            .price_per_gallon("TX", trip_date())
            .await
            .expect_err("unmapped");
        assert!(err.to_string().contains("region 'TX'"));
        let received = server.received_requests().await.unwrap_or_default();
        assert!(received.is_empty());
    }

    #[test]
    fn parse_price_rejects_non_positive_values() {
        let zero = json!({ "response": { "data": [ { "value": 0 } ] } });
        assert!(EiaPriceSource::parse_price(&zero).is_err());
        let junk = json!({ "response": { "data": [ { "value": "n/a" } ] } });
        assert!(EiaPriceSource::parse_price(&junk).is_err());
    }
}
