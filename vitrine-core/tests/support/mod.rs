//! Hand-rolled fakes for the provider and transport boundaries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use vitrine_core::{
    AssetResponse, AssetTransport, MetadataProvider, ProviderError,
    StoreContext, StoreItem, TitleInfo,
};
use vitrine_model::TitleId;

#[derive(Default)]
pub struct FakeProvider {
    pub subscribed: Vec<TitleId>,
    pub infos: HashMap<TitleId, TitleInfo>,
    pub items: Vec<StoreItem>,
    pub change_number: AtomicU64,
    pub store_queries: Mutex<Vec<Vec<TitleId>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, id: TitleId, info: TitleInfo) -> Self {
        self.subscribed.push(id);
        self.infos.insert(id, info);
        self
    }

    pub fn with_store_item(mut self, item: StoreItem) -> Self {
        self.items.push(item);
        self
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn subscribed_titles(&self) -> Result<Vec<TitleId>, ProviderError> {
        Ok(self.subscribed.clone())
    }

    async fn title_info_batch(
        &self,
        ids: &[TitleId],
    ) -> Result<HashMap<TitleId, TitleInfo>, ProviderError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.infos.get(id).map(|info| (*id, info.clone()))
            })
            .collect())
    }

    fn last_change_number(&self) -> u64 {
        self.change_number.load(Ordering::SeqCst)
    }

    async fn store_items(
        &self,
        ids: &[TitleId],
        _context: &StoreContext,
    ) -> Result<Vec<StoreItem>, ProviderError> {
        self.store_queries.lock().unwrap().push(ids.to_vec());
        Ok(self
            .items
            .iter()
            .filter(|item| ids.contains(&item.title_id))
            .cloned()
            .collect())
    }
}

pub struct FakeTransport {
    responses: HashMap<Url, AssetResponse>,
    pub requests: Mutex<Vec<Url>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay: Duration,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(mut self, url: &Url, response: AssetResponse) -> Self {
        self.responses.insert(url.clone(), response);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetTransport for FakeTransport {
    async fn get(&self, url: &Url) -> vitrine_core::Result<AssetResponse> {
        self.requests.lock().unwrap().push(url.clone());
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(not_found))
    }
}

pub fn ok_bytes(body: Vec<u8>) -> AssetResponse {
    AssetResponse {
        status: StatusCode::OK,
        last_modified: Some("Tue, 15 Nov 1994 08:12:31 GMT".to_string()),
        expires: Some("Wed, 15 Nov 1995 08:12:31 GMT".to_string()),
        body,
    }
}

pub fn not_found() -> AssetResponse {
    AssetResponse {
        status: StatusCode::NOT_FOUND,
        last_modified: None,
        expires: None,
        body: Vec::new(),
    }
}

/// A small but decodable JPEG for canned download bodies.
pub fn tiny_jpeg() -> Vec<u8> {
    let pixels = image::RgbImage::from_pixel(16, 16, image::Rgb([40, 90, 160]));
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new(&mut out);
    pixels
        .write_with_encoder(encoder)
        .expect("encoding a canned JPEG succeeds");
    out
}
