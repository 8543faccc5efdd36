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

// Bearer tokens for Google APIs
//
// Credentials come from object_store's GCP chain: GOOGLE_SERVICE_ACCOUNT,
// GOOGLE_APPLICATION_CREDENTIALS, the gcloud ADC file, then the metadata
// server. The same provider signs Pub/Sub publishes and GCS writes.

use object_store::gcp::{GcpCredential, GcpCredentialProvider, GoogleCloudStorageBuilder};
use object_store::{CredentialProvider, StaticCredentialProvider};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use std::sync::Arc;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// The GCS builder insists on a bucket; the credential chain never uses it
const CREDENTIAL_BUCKET: &str = "log-relay-credentials";

#[derive(Clone)]
pub enum TokenSource {
    /// Emulators and local backends
    Anonymous,
    Google(GcpCredentialProvider),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Anonymous => write!(f, "TokenSource::Anonymous"),
            TokenSource::Google(_) => write!(f, "TokenSource::Google"),
        }
    }
}

impl TokenSource {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
            debug!("Using static access token");
            return Self::fixed(token);
        }

        if config.default_credentials {
            return Self::application_default();
        }

        Ok(TokenSource::Anonymous)
    }

    pub fn fixed(token: &str) -> Result<Self, AuthError> {
        // Reject anything that could not travel in a header
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| AuthError::InvalidToken)?;

        let provider = StaticCredentialProvider::new(GcpCredential {
            bearer: token.to_string(),
        });
        Ok(TokenSource::Google(Arc::new(provider)))
    }

    /// Application Default Credentials, resolved lazily on first use
    pub fn application_default() -> Result<Self, AuthError> {
        let gcs = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(CREDENTIAL_BUCKET)
            .build()?;
        Ok(TokenSource::Google(Arc::clone(gcs.credentials())))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, TokenSource::Anonymous)
    }

    /// The underlying provider, for clients that sign their own requests
    pub fn provider(&self) -> Option<&GcpCredentialProvider> {
        match self {
            TokenSource::Anonymous => None,
            TokenSource::Google(provider) => Some(provider),
        }
    }

    /// Current `Authorization` header value, if any
    pub async fn header(&self) -> Result<Option<HeaderValue>, AuthError> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Google(provider) => {
                let credential = provider.get_credential().await?;
                HeaderValue::from_str(&format!("Bearer {}", credential.bearer))
                    .map(Some)
                    .map_err(|_| AuthError::InvalidToken)
            }
        }
    }

    /// Attach the current token to a request
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        Ok(match self.header().await? {
            Some(header) => request.header(AUTHORIZATION, header),
            None => request,
        })
    }
}
