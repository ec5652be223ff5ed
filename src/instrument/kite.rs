//! Kite Connect instrument catalog
//!
//! Resolves the near-the-money option chain of one index for its nearest
//! expiry. The instrument dump is a CSV with one row per listed contract;
//! the spot comes from the LTP quote endpoint.

use super::{InstrumentCatalog, InstrumentToken, TrackedInstrument, Universe};
use crate::error::CatalogError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Kite REST base URL
pub const KITE_API_URL: &str = "https://api.kite.trade";

/// Configuration for the Kite catalog
#[derive(Debug, Clone)]
pub struct KiteCatalogConfig {
    pub api_url: String,
    pub api_key: String,
    pub access_token: String,
    /// Instrument dump segment, e.g. "NFO"
    pub exchange: String,
    /// Underlying name as it appears in the dump, e.g. "NIFTY"
    pub index: String,
    /// Quote symbol for the spot, e.g. "NSE:NIFTY 50"
    pub spot_symbol: String,
    pub strike_range: Decimal,
    pub max_contracts: usize,
    pub timeout: Duration,
}

/// One row of the instrument dump
#[derive(Debug, Clone, Deserialize)]
pub struct KiteInstrumentRow {
    pub instrument_token: u32,
    pub tradingsymbol: String,
    pub name: String,
    pub expiry: Option<NaiveDate>,
    pub strike: Decimal,
    pub instrument_type: String,
    pub segment: String,
}

#[derive(Debug, Deserialize)]
struct LtpResponse {
    data: HashMap<String, LtpQuote>,
}

#[derive(Debug, Deserialize)]
struct LtpQuote {
    last_price: Decimal,
}

/// Client for the Kite instrument and quote endpoints
pub struct KiteCatalog {
    config: KiteCatalogConfig,
    client: Client,
}

impl KiteCatalog {
    pub fn new(config: KiteCatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn auth_header(&self) -> String {
        format!("token {}:{}", self.config.api_key, self.config.access_token)
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("X-Kite-Version", "3")
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Fetch and parse the instrument dump for the configured exchange
    pub async fn fetch_instruments(&self) -> Result<Vec<KiteInstrumentRow>, CatalogError> {
        let url = format!("{}/instruments/{}", self.config.api_url, self.config.exchange);
        tracing::debug!(url = %url, "Fetching instrument dump");

        let body = self.get_text(&url, &[]).await?;
        parse_instrument_dump(&body)
    }

    /// Fetch the spot price of the underlying
    pub async fn fetch_spot(&self) -> Result<Decimal, CatalogError> {
        let url = format!("{}/quote/ltp", self.config.api_url);
        let body = self
            .get_text(&url, &[("i", self.config.spot_symbol.as_str())])
            .await?;

        let response: LtpResponse = serde_json::from_str(&body)
            .map_err(|_| CatalogError::SpotUnavailable(self.config.spot_symbol.clone()))?;

        response
            .data
            .get(&self.config.spot_symbol)
            .map(|q| q.last_price)
            .ok_or_else(|| CatalogError::SpotUnavailable(self.config.spot_symbol.clone()))
    }
}

#[async_trait]
impl InstrumentCatalog for KiteCatalog {
    async fn resolve(&self) -> Result<Universe, CatalogError> {
        let rows = self.fetch_instruments().await?;
        let spot = self.fetch_spot().await?;

        let instruments = select_universe(
            &rows,
            &self.config.index,
            spot,
            self.config.strike_range,
            self.config.max_contracts,
        );

        if instruments.is_empty() {
            return Err(CatalogError::Empty {
                index: self.config.index.clone(),
                strike_range: self.config.strike_range.to_string(),
            });
        }

        tracing::info!(
            index = %self.config.index,
            %spot,
            expiry = %instruments[0].expiry,
            contracts = instruments.len(),
            "Resolved tracked universe"
        );

        Ok(Universe::new(instruments))
    }
}

/// Parse the CSV instrument dump
pub fn parse_instrument_dump(body: &str) -> Result<Vec<KiteInstrumentRow>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Option contracts of `index` on the nearest expiry, strikes strictly
/// inside `(spot - range, spot + range)`, first `max` in dump order
pub fn select_universe(
    rows: &[KiteInstrumentRow],
    index: &str,
    spot: Decimal,
    strike_range: Decimal,
    max: usize,
) -> Vec<TrackedInstrument> {
    let options: Vec<&KiteInstrumentRow> = rows
        .iter()
        .filter(|r| r.name == index && r.segment.contains("OPT") && r.expiry.is_some())
        .collect();

    let Some(nearest) = options.iter().filter_map(|r| r.expiry).min() else {
        return Vec::new();
    };

    let low = spot - strike_range;
    let high = spot + strike_range;

    options
        .into_iter()
        .filter(|r| r.expiry == Some(nearest))
        .filter(|r| r.strike > low && r.strike < high)
        .filter_map(|r| {
            let instrument_type = match r.instrument_type.parse() {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(symbol = %r.tradingsymbol, error = %e, "Skipping row");
                    return None;
                }
            };
            Some(TrackedInstrument {
                token: InstrumentToken(r.instrument_token),
                tradingsymbol: r.tradingsymbol.clone(),
                strike: r.strike,
                instrument_type,
                expiry: nearest,
            })
        })
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::InstrumentType;
    use rust_decimal_macros::dec;

    const DUMP: &str = "\
instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange
12345,48,NIFTY24FEB21500CE,\"NIFTY\",0,2024-02-01,21500,0.05,50,CE,NFO-OPT,NFO
10001,39,NIFTY24JAN21500CE,\"NIFTY\",0,2024-01-25,21500,0.05,50,CE,NFO-OPT,NFO
10002,40,NIFTY24JAN21500PE,\"NIFTY\",0,2024-01-25,21500,0.05,50,PE,NFO-OPT,NFO
10003,41,NIFTY24JAN20000CE,\"NIFTY\",0,2024-01-25,20000,0.05,50,CE,NFO-OPT,NFO
10004,42,NIFTY24JAN22500PE,\"NIFTY\",0,2024-01-25,22500,0.05,50,PE,NFO-OPT,NFO
10005,43,BANKNIFTY24JAN47000CE,\"BANKNIFTY\",0,2024-01-24,47000,0.05,15,CE,NFO-OPT,NFO
10006,44,NIFTY24JANFUT,\"NIFTY\",0,2024-01-18,0,0.05,50,FUT,NFO-FUT,NFO
10007,45,NIFTY24JAN21800CE,\"NIFTY\",0,2024-01-25,21800,0.05,50,CE,NFO-OPT,NFO
";

    fn rows() -> Vec<KiteInstrumentRow> {
        parse_instrument_dump(DUMP).unwrap()
    }

    #[test]
    fn test_parse_instrument_dump() {
        let rows = rows();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[1].instrument_token, 10001);
        assert_eq!(rows[1].name, "NIFTY");
        assert_eq!(rows[1].strike, dec!(21500));
        assert_eq!(rows[1].expiry, NaiveDate::from_ymd_opt(2024, 1, 25));
    }

    #[test]
    fn test_select_nearest_expiry_within_range() {
        let selected = select_universe(&rows(), "NIFTY", dec!(21600), dec!(800), 80);
        let tokens: Vec<u32> = selected.iter().map(|i| i.token.0).collect();

        // 20000 and 22500 are outside the band, the future and the Feb
        // series are excluded, BANKNIFTY is another underlying.
        assert_eq!(tokens, vec![10001, 10002, 10007]);
        assert_eq!(selected[1].instrument_type, InstrumentType::Put);
        assert!(selected
            .iter()
            .all(|i| i.expiry == NaiveDate::from_ymd_opt(2024, 1, 25).unwrap()));
    }

    #[test]
    fn test_select_range_bounds_are_exclusive() {
        // 21500 sits exactly on the lower bound
        let selected = select_universe(&rows(), "NIFTY", dec!(22300), dec!(800), 80);
        let tokens: Vec<u32> = selected.iter().map(|i| i.token.0).collect();
        assert_eq!(tokens, vec![10007]);
    }

    #[test]
    fn test_select_respects_max_contracts() {
        let selected = select_universe(&rows(), "NIFTY", dec!(21600), dec!(800), 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].token, InstrumentToken(10001));
    }

    #[test]
    fn test_select_unknown_index_is_empty() {
        assert!(select_universe(&rows(), "FINNIFTY", dec!(21600), dec!(800), 80).is_empty());
    }

    #[test]
    fn test_parse_ltp_response() {
        let body = r#"{"status":"success","data":{"NSE:NIFTY 50":{"instrument_token":256265,"last_price":21731.45}}}"#;
        let response: LtpResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data["NSE:NIFTY 50"].last_price, dec!(21731.45));
    }

    #[test]
    fn test_catalog_creation() {
        let catalog = KiteCatalog::new(KiteCatalogConfig {
            api_url: KITE_API_URL.to_string(),
            api_key: "key".into(),
            access_token: "token".into(),
            exchange: "NFO".into(),
            index: "NIFTY".into(),
            spot_symbol: "NSE:NIFTY 50".into(),
            strike_range: dec!(800),
            max_contracts: 80,
            timeout: Duration::from_secs(10),
        })
        .unwrap();
        assert_eq!(catalog.auth_header(), "token key:token");
    }
}
