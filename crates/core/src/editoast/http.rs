use bytes::Bytes;
use futures_util::FutureExt;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use track_view_map::prelude::*;

use super::types::{PathPropertiesRequest, ProjectPathRequest};
use super::{
    ApiError, ApiFuture, EditoastApi, PathProperties, Result, TrainPath, TrainProjection,
    TrainSchedulePage, Validate,
};
use crate::settings::Settings;

/// Editoast over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEditoast {
    client: Client,
    base: Url,
    infra: InfraId,
    timetable: TimetableId,
}

impl HttpEditoast {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut base = settings.editoast_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;

        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|source| ApiError::Transport {
                url: base.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base,
            infra: settings.infra_id,
            timetable: settings.timetable_id,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    fn tile_url(&self, layer: &str, tile: TileIndex) -> Result<Url> {
        self.url(&format!(
            "api/layers/tile/{layer}/geo/{}/{}/{}/?infra={}",
            tile.zoom, tile.x, tile.y, self.infra
        ))
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        let transport = |source| ApiError::Transport {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response, url: &Url) -> Result<T> {
        let body = response.bytes().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|e| ApiError::Malformed(format!("{url}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self.send(self.client.get(url.clone()), &url).await?;
        self.read_json(response, &url).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        debug!(%url, "POST");
        let response = self.send(self.client.post(url.clone()).json(body), &url).await?;
        self.read_json(response, &url).await
    }
}

impl EditoastApi for HttpEditoast {
    fn track_tile<'a>(&'a self, layer: &'a str, tile: TileIndex) -> ApiFuture<'a, Bytes> {
        async move {
            let url = self.tile_url(layer, tile)?;
            debug!(%url, "GET");

            let response = match self.send(self.client.get(url.clone()), &url).await {
                Ok(response) => response,
                Err(ApiError::NotFound(_)) => return Ok(Bytes::new()),
                Err(e) => return Err(e),
            };

            response.bytes().await.map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })
        }
        .boxed()
    }

    fn train_schedules(&self, page: u32) -> ApiFuture<'_, TrainSchedulePage> {
        async move {
            let url = self.url(&format!(
                "api/timetable/{}/train_schedules/?page={page}",
                self.timetable
            ))?;
            self.get_json::<TrainSchedulePage>(url).await?.validate()
        }
        .boxed()
    }

    fn train_path(&self, train: TrainId) -> ApiFuture<'_, TrainPath> {
        async move {
            let url = self.url(&format!("api/train_schedule/{train}/path?infra_id={}", self.infra))?;
            self.get_json::<TrainPath>(url).await?.validate()
        }
        .boxed()
    }

    fn path_geometry<'a>(&'a self, track_section_ranges: &'a [Value]) -> ApiFuture<'a, PathProperties> {
        async move {
            let url = self.url(&format!(
                "api/infra/{}/path_properties?props[]=geometry",
                self.infra
            ))?;
            let body = PathPropertiesRequest { track_section_ranges };
            self.post_json::<_, PathProperties>(url, &body).await?.validate()
        }
        .boxed()
    }

    fn project_path<'a>(&'a self, train: TrainId, path: &'a TrainPath) -> ApiFuture<'a, TrainProjection> {
        async move {
            let url = self.url("api/train_schedule/project_path")?;
            let body = ProjectPathRequest::new(self.infra, train, path);

            let mut projections: HashMap<TrainId, TrainProjection> = self.post_json(url, &body).await?;
            projections
                .remove(&train)
                .ok_or_else(|| ApiError::Malformed(format!("projection lacks train {train}")))?
                .validate()
        }
        .boxed()
    }
}
