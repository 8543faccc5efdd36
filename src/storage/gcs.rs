// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Google Cloud Storage backend implementation

use super::backend::{object_attributes, object_path, put_if_absent, BlobStore, PutOutcome};
use crate::auth::TokenSource;
use crate::config::GcsConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// GCS client for uploading log objects
///
/// Only `storage.objects.create` is needed: nothing here reads, lists or
/// inspects the bucket.
pub struct GcsBackend {
    store: Arc<dyn ObjectStore>,
    bucket_name: String,
    tokens: TokenSource,
}

impl GcsBackend {
    pub fn new(
        config: &GcsConfig,
        bucket_name: String,
        tokens: &TokenSource,
    ) -> Result<Self, StorageError> {
        let client_options = ClientOptions::new()
            .with_timeout(config.timeout())
            .with_allow_http(config.emulator);

        let mut builder = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&bucket_name)
            .with_client_options(client_options)
            .with_retry(RetryConfig::default());

        let tokens = match tokens {
            TokenSource::Google(provider) if !config.emulator => {
                builder = builder.with_credentials(Arc::clone(provider));
                tokens.clone()
            }
            _ => {
                debug!("Using unauthenticated GCS endpoint {}", config.endpoint);
                builder = builder.with_service_account_key(emulator_account(&config.endpoint));
                TokenSource::Anonymous
            }
        };

        Ok(Self {
            store: Arc::new(builder.build()?),
            bucket_name,
            tokens,
        })
    }
}

/// Service account stanza pointing the client at an emulator without OAuth
fn emulator_account(endpoint: &str) -> String {
    serde_json::json!({
        "gcs_base_url": endpoint.trim_end_matches('/'),
        "disable_oauth": true,
        "client_email": "",
        "private_key": "",
        "private_key_id": ""
    })
    .to_string()
}

#[async_trait]
impl BlobStore for GcsBackend {
    async fn initialize(&self) -> Result<(), StorageError> {
        // Buckets are provisioned out of band, and a write-only identity may
        // not read bucket metadata, so there is nothing to check here
        info!("Writing to gs://{}", self.bucket_name);
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PutOutcome, StorageError> {
        let size = body.len();
        let location = object_path(key)?;
        let outcome = put_if_absent(
            self.store.as_ref(),
            &location,
            body,
            object_attributes(content_type, metadata),
        )
        .await?;

        if outcome == PutOutcome::Created {
            debug!("Uploaded {} bytes to gs://{}/{}", size, self.bucket_name, key);
        }
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<bool, StorageError> {
        // A usable token is what every write needs first
        match self.tokens.header().await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn backend_type(&self) -> &str {
        "gcs"
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulator_config() -> GcsConfig {
        GcsConfig {
            endpoint: "http://localhost:4443/".to_string(),
            timeout_seconds: 5,
            emulator: true,
        }
    }

    #[test]
    fn test_emulator_account_disables_oauth() {
        let account: serde_json::Value =
            serde_json::from_str(&emulator_account("http://localhost:4443/")).unwrap();
        assert_eq!(account["gcs_base_url"], "http://localhost:4443");
        assert_eq!(account["disable_oauth"], true);
    }

    #[tokio::test]
    async fn test_emulator_backend_is_healthy_without_credentials() {
        let backend =
            GcsBackend::new(&emulator_config(), "log-bucket".to_string(), &TokenSource::Anonymous)
                .unwrap();

        backend.initialize().await.unwrap();
        assert!(backend.health_check().await.unwrap());
        assert_eq!(backend.backend_type(), "gcs");
        assert_eq!(backend.bucket(), "log-bucket");
    }

    #[tokio::test]
    async fn test_emulator_flag_overrides_credentials() {
        let tokens = TokenSource::fixed("abc").unwrap();
        let backend = GcsBackend::new(&emulator_config(), "log-bucket".to_string(), &tokens).unwrap();
        assert!(backend.tokens.is_anonymous());
    }

    #[tokio::test]
    async fn test_static_token_backend() {
        let config = GcsConfig::default();
        let tokens = TokenSource::fixed("abc").unwrap();
        let backend = GcsBackend::new(&config, "log-bucket".to_string(), &tokens).unwrap();

        // No network: initialize touches nothing and the static token is at hand
        backend.initialize().await.unwrap();
        assert!(backend.health_check().await.unwrap());
    }
}
