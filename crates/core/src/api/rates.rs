use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::rate::{RatesEnvelope, RawExchangeRate};
use super::client::RestClient;
use super::traits::RateSource;

const RATES_PATH: &str = "exchange-rates/";

/// Loads the exchange-rate table from the backend.
///
/// Accepts both `{"results": [...]}` and a bare array.
pub struct RestRateSource {
    client: RestClient,
}

impl RestRateSource {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl RateSource for RestRateSource {
    fn name(&self) -> &str {
        "REST exchange rates"
    }

    async fn fetch_rates(&self) -> Result<Vec<RawExchangeRate>, CoreError> {
        let envelope: RatesEnvelope = self.client.get_json(RATES_PATH, &[]).await?;
        Ok(envelope.into_records())
    }
}
