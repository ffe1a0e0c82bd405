//! S3 provider backed by `aws-sdk-s3`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{operation::get_object::GetObjectError, Client as S3Client};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{mirror_prefix, write_stream};
use crate::{
    config::S3Config,
    uri::locator_string,
    Protocol,
    Provider,
    StorageError,
    StorageResult,
};

/// How bucket names are placed in request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Addressing {
    /// `https://bucket.s3.amazonaws.com/key`
    VirtualHosted,
    /// `https://s3.amazonaws.com/bucket/key`
    PathStyle,
}

/// S3 provider. One client serves every bucket.
pub struct S3Provider {
    client: S3Client,
    addressing: S3Addressing,
}

impl S3Provider {
    /// Build the S3 client from resolved configuration.
    ///
    /// Fails only if the endpoint override is not a valid URL.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            url::Url::parse(endpoint).map_err(|e| StorageError::construction(Protocol::S3, e))?;
            loader = loader.endpoint_url(endpoint);
        }
        if config.anonymous {
            loader = loader.no_credentials();
        }
        let sdk_config = loader.load().await;

        let addressing = if config.use_virtual_bucket {
            S3Addressing::VirtualHosted
        } else {
            S3Addressing::PathStyle
        };
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(addressing == S3Addressing::PathStyle)
            .build();

        debug!(
            region = ?config.region,
            endpoint = ?config.endpoint,
            anonymous = config.anonymous,
            ?addressing,
            "Created S3 provider"
        );

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            addressing,
        })
    }

    pub fn addressing(&self) -> S3Addressing {
        self.addressing
    }

    /// All object keys under `prefix`, in listing order.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let locator = locator_string(Protocol::S3, bucket, prefix);
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_no_such_bucket())
                {
                    StorageError::not_found(&locator)
                } else {
                    StorageError::transport(&locator, e)
                }
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        Ok(keys)
    }

    async fn download(&self, bucket: &str, key: &str, target: &Path) -> StorageResult<u64> {
        let locator = locator_string(Protocol::S3, bucket, key);
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    StorageError::not_found(&locator)
                } else {
                    StorageError::transport(&locator, e)
                }
            })?;

        let stream = ReaderStream::new(response.body.into_async_read());
        write_stream(target, stream, &locator).await
    }
}

#[async_trait]
impl Provider for S3Provider {
    fn protocol(&self) -> Protocol {
        Protocol::S3
    }

    async fn fetch(
        &self,
        bucket: &str,
        path: &str,
        dest_dir: &Path,
    ) -> StorageResult<Vec<PathBuf>> {
        let keys = self.list_keys(bucket, path).await?;
        mirror_prefix(
            Protocol::S3,
            bucket,
            path,
            keys,
            dest_dir,
            move |key, target| async move { self.download(bucket, &key, &target).await },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashMap},
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use axum::{
        extract::State,
        http::{header::CONTENT_TYPE, StatusCode, Uri},
        response::{IntoResponse, Response},
        Router,
    };
    use tempfile::TempDir;

    use super::*;

    const PAGE_SIZE: usize = 2;

    /// Objects per bucket; a `None` body is listed but answers `NoSuchKey`.
    type Buckets = BTreeMap<&'static str, BTreeMap<&'static str, Option<&'static str>>>;

    /// Minimal path-style S3 endpoint: paginated `ListObjectsV2` and `GetObject`.
    #[derive(Clone)]
    struct LocalS3 {
        buckets: Arc<Buckets>,
        list_calls: Arc<AtomicUsize>,
    }

    async fn handle(State(s3): State<LocalS3>, uri: Uri) -> Response {
        let path = uri.path().trim_start_matches('/');
        let (bucket, key) = path.split_once('/').unwrap_or((path, ""));
        let Some(objects) = s3.buckets.get(bucket) else {
            return s3_error("NoSuchBucket");
        };

        if key.is_empty() {
            s3.list_calls.fetch_add(1, Ordering::SeqCst);
            let query: HashMap<String, String> =
                url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
                    .into_owned()
                    .collect();
            return list_objects(objects, &query);
        }

        match objects.get(key) {
            Some(Some(body)) => (StatusCode::OK, *body).into_response(),
            _ => s3_error("NoSuchKey"),
        }
    }

    fn list_objects(
        objects: &BTreeMap<&'static str, Option<&'static str>>,
        query: &HashMap<String, String>,
    ) -> Response {
        let prefix = query.get("prefix").map(String::as_str).unwrap_or_default();
        let start: usize = query
            .get("continuation-token")
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let matching: Vec<&str> = objects
            .keys()
            .copied()
            .filter(|key| key.starts_with(prefix))
            .collect();
        let page: Vec<&str> = matching.iter().copied().skip(start).take(PAGE_SIZE).collect();

        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
        );
        xml.push_str(&format!(
            "<Prefix>{prefix}</Prefix><KeyCount>{}</KeyCount><MaxKeys>{PAGE_SIZE}</MaxKeys>",
            page.len()
        ));
        for key in &page {
            xml.push_str(&format!("<Contents><Key>{key}</Key><Size>1</Size></Contents>"));
        }
        let next = start + PAGE_SIZE;
        if next < matching.len() {
            xml.push_str(&format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{next}</NextContinuationToken>"
            ));
        } else {
            xml.push_str("<IsTruncated>false</IsTruncated>");
        }
        xml.push_str("</ListBucketResult>");

        ([(CONTENT_TYPE, "application/xml")], xml).into_response()
    }

    fn s3_error(code: &str) -> Response {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{code}</Code><Message>{code}</Message><RequestId>req-1</RequestId></Error>"#
        );
        (
            StatusCode::NOT_FOUND,
            [(CONTENT_TYPE, "application/xml")],
            xml,
        )
            .into_response()
    }

    async fn serve(s3: LocalS3) -> SocketAddr {
        let router = Router::new().fallback(handle).with_state(s3);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn local_store() -> (S3Provider, LocalS3) {
        let buckets: Buckets = BTreeMap::from([
            (
                "models",
                BTreeMap::from([
                    ("v1/config.json", Some("{}")),
                    ("v1/sub/", Some("")),
                    ("v1/weights/0.bin", Some("w0")),
                    ("v1/weights/1.bin", Some("w1")),
                    ("v10/other.bin", Some("other")),
                ]),
            ),
            (
                "broken",
                BTreeMap::from([("a.bin", Some("a")), ("b.bin", None), ("c.bin", Some("c"))]),
            ),
        ]);
        let s3 = LocalS3 {
            buckets: Arc::new(buckets),
            list_calls: Arc::new(AtomicUsize::new(0)),
        };
        let addr = serve(s3.clone()).await;

        let provider = S3Provider::new(&S3Config {
            region: Some("us-east-1".to_string()),
            use_virtual_bucket: false,
            endpoint: Some(format!("http://{addr}")),
            anonymous: true,
        })
        .await
        .unwrap();
        (provider, s3)
    }

    #[tokio::test]
    async fn test_fetch_mirrors_paginated_prefix() {
        let (provider, s3) = local_store().await;
        let temp_dir = TempDir::new().unwrap();

        let written = provider
            .fetch("models", "v1", temp_dir.path())
            .await
            .unwrap();

        assert_eq!(
            written,
            vec![
                temp_dir.path().join("config.json"),
                temp_dir.path().join("weights/0.bin"),
                temp_dir.path().join("weights/1.bin"),
            ]
        );
        assert_eq!(s3.list_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            std::fs::read(temp_dir.path().join("weights/1.bin")).unwrap(),
            b"w1"
        );
        assert!(!temp_dir.path().join("other.bin").exists());
    }

    #[tokio::test]
    async fn test_fetch_empty_listing_is_not_found() {
        let (provider, _s3) = local_store().await;
        let temp_dir = TempDir::new().unwrap();

        let err = provider
            .fetch("models", "v2", temp_dir.path())
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_missing_bucket_is_not_found() {
        let (provider, _s3) = local_store().await;
        let temp_dir = TempDir::new().unwrap();

        let err = provider
            .fetch("absent", "v1", temp_dir.path())
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_missing_key_keeps_earlier_files() {
        let (provider, _s3) = local_store().await;
        let temp_dir = TempDir::new().unwrap();

        let err = provider
            .fetch("broken", "", temp_dir.path())
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{err}");
        assert_eq!(std::fs::read(temp_dir.path().join("a.bin")).unwrap(), b"a");
        assert!(!temp_dir.path().join("c.bin").exists());
    }

    fn offline_config(use_virtual_bucket: bool) -> S3Config {
        S3Config {
            region: Some("us-east-1".to_string()),
            use_virtual_bucket,
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            anonymous: true,
        }
    }

    #[tokio::test]
    async fn test_virtual_hosted_by_default() {
        let provider = S3Provider::new(&S3Config {
            anonymous: true,
            region: Some("us-east-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(provider.addressing(), S3Addressing::VirtualHosted);
        assert_eq!(provider.protocol(), Protocol::S3);
    }

    #[tokio::test]
    async fn test_path_style_when_virtual_bucket_disabled() {
        let provider = S3Provider::new(&offline_config(false)).await.unwrap();
        assert_eq!(provider.addressing(), S3Addressing::PathStyle);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_construction() {
        let config = S3Config {
            endpoint: Some("not a url".to_string()),
            ..offline_config(true)
        };
        let result = S3Provider::new(&config).await;
        assert!(matches!(
            result,
            Err(StorageError::CredentialConstruction {
                protocol: Protocol::S3,
                ..
            })
        ));
    }
}
