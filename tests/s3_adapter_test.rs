//! S3 Adapter Integration Tests
//!
//! Drives the SDK-backed adapter against a wiremock S3 endpoint.
//!
//! ## Test Coverage
//!
//! - CreateMultipartUpload with content type, metadata and key prefix
//! - ListParts paging through the part-number marker
//! - CompleteMultipartUpload forwarding parts
//! - AbortMultipartUpload
//! - Provider error codes surfaced to callers
//! - Presigned PUT URLs with `temporary_url` override

#[cfg(test)]
mod tests {
    use s3_upload_signer::config::StorageConfig;
    use s3_upload_signer::s3::{
        CompletedPart, CreateMultipartUpload, Metadata, PutObjectOptions, S3Adapter,
        StorageAdapter, StorageError,
    };
    use s3_upload_signer::upload::parts::list_all_parts;
    use std::time::Duration;
    use wiremock::matchers::{
        body_string_contains, header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage_config(mock_server: &MockServer) -> StorageConfig {
        StorageConfig {
            disk: "s3".into(),
            bucket: "test-bucket".into(),
            region: "us-east-1".into(),
            endpoint: Some(mock_server.uri()),
            access_key: Some("test-access".into()),
            secret_key: Some("test-secret".into()),
            force_path_style: true,
            root: None,
            temporary_url: None,
        }
    }

    async fn create_test_adapter(config: &StorageConfig) -> S3Adapter {
        S3Adapter::from_config(config).await.unwrap()
    }

    fn list_parts_page(parts: &[(i32, &str)], truncated: bool, next: Option<i32>) -> String {
        let parts: String = parts
            .iter()
            .map(|(n, etag)| {
                format!(
                    "<Part><PartNumber>{}</PartNumber><ETag>&quot;{}&quot;</ETag><Size>5242880</Size></Part>",
                    n, etag
                )
            })
            .collect();
        let next = next
            .map(|n| format!("<NextPartNumberMarker>{}</NextPartNumberMarker>", n))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <ListPartsResult>
                <Bucket>test-bucket</Bucket>
                <Key>abc-a.png</Key>
                <UploadId>up-1</UploadId>
                {}
                <MaxParts>2</MaxParts>
                <IsTruncated>{}</IsTruncated>
                {}
            </ListPartsResult>"#,
            next, truncated, parts
        )
    }

    // ========================================================================
    // TEST: Create Multipart Upload
    // ========================================================================

    #[tokio::test]
    async fn test_create_multipart_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploads", ""))
            .and(header("content-type", "image/png"))
            .and(header("x-amz-meta-name", "=?UTF-8?B?Y2Fmw6kucG5n?="))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <InitiateMultipartUploadResult>
                    <Bucket>test-bucket</Bucket>
                    <Key>abc-a.png</Key>
                    <UploadId>provider-upload-id</UploadId>
                </InitiateMultipartUploadResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = create_test_adapter(&storage_config(&mock_server)).await;
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), "=?UTF-8?B?Y2Fmw6kucG5n?=".into());

        let created = adapter
            .create_multipart_upload(&CreateMultipartUpload {
                key: "abc-a.png".into(),
                content_type: "image/png".into(),
                metadata,
                acl: None,
            })
            .await
            .unwrap();

        assert_eq!(created.key, "abc-a.png");
        assert_eq!(created.upload_id, "provider-upload-id");
    }

    #[tokio::test]
    async fn test_create_applies_root_prefix_and_acl() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/test-bucket/tenant/abc-a.png"))
            .and(query_param("uploads", ""))
            .and(header("x-amz-acl", "public-read"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<InitiateMultipartUploadResult><UploadId>u-2</UploadId></InitiateMultipartUploadResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = storage_config(&mock_server);
        config.root = Some("tenant".into());
        let adapter = create_test_adapter(&config).await;

        let created = adapter
            .create_multipart_upload(&CreateMultipartUpload {
                key: "abc-a.png".into(),
                content_type: "image/png".into(),
                metadata: Metadata::new(),
                acl: Some("public-read".into()),
            })
            .await
            .unwrap();

        // Client-facing key stays unprefixed
        assert_eq!(created.key, "abc-a.png");
        assert_eq!(created.upload_id, "u-2");
    }

    // ========================================================================
    // TEST: List Parts
    // ========================================================================

    #[tokio::test]
    async fn test_list_parts_follows_marker() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploadId", "up-1"))
            .and(query_param_is_missing("part-number-marker"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_parts_page(
                &[(1, "e1"), (2, "e2")],
                true,
                Some(2),
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploadId", "up-1"))
            .and(query_param("part-number-marker", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_parts_page(
                &[(3, "e3")],
                false,
                None,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = create_test_adapter(&storage_config(&mock_server)).await;
        let parts = list_all_parts(&adapter, "abc-a.png", "up-1").await.unwrap();

        let numbers: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        assert_eq!(parts[0].etag, "\"e1\"");
        assert_eq!(parts[2].size, 5242880);
    }

    #[tokio::test]
    async fn test_list_parts_no_such_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploadId", "gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <Error>
                    <Code>NoSuchUpload</Code>
                    <Message>The specified upload does not exist.</Message>
                    <RequestId>req-1</RequestId>
                </Error>"#,
            ))
            .mount(&mock_server)
            .await;

        let adapter = create_test_adapter(&storage_config(&mock_server)).await;
        let err = adapter
            .list_parts("abc-a.png", "gone", None)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Provider { operation: "ListParts", .. }));
        assert_eq!(err.code(), Some("NoSuchUpload"));
    }

    // ========================================================================
    // TEST: Complete / Abort
    // ========================================================================

    #[tokio::test]
    async fn test_complete_multipart_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploadId", "up-1"))
            .and(body_string_contains("<PartNumber>1</PartNumber>"))
            .and(body_string_contains("<PartNumber>2</PartNumber>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <CompleteMultipartUploadResult>
                    <Location>http://localhost/test-bucket/abc-a.png</Location>
                    <Bucket>test-bucket</Bucket>
                    <Key>abc-a.png</Key>
                    <ETag>"final-etag-2"</ETag>
                </CompleteMultipartUploadResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = create_test_adapter(&storage_config(&mock_server)).await;
        let parts = [
            CompletedPart { part_number: 1, etag: "\"e1\"".into() },
            CompletedPart { part_number: 2, etag: "\"e2\"".into() },
        ];
        let completed = adapter
            .complete_multipart_upload("abc-a.png", "up-1", &parts)
            .await
            .unwrap();

        assert_eq!(
            completed.location.as_deref(),
            Some("http://localhost/test-bucket/abc-a.png")
        );
    }

    #[tokio::test]
    async fn test_abort_multipart_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/test-bucket/abc-a.png"))
            .and(query_param("uploadId", "up-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = create_test_adapter(&storage_config(&mock_server)).await;
        assert!(adapter.abort_multipart_upload("abc-a.png", "up-1").await.is_ok());
    }

    // ========================================================================
    // TEST: Presigned PUT
    // ========================================================================

    #[tokio::test]
    async fn test_presigned_put_uses_temporary_url() {
        let mock_server = MockServer::start().await;
        let mut config = storage_config(&mock_server);
        config.temporary_url = Some("https://uploads.example.com".into());
        let adapter = create_test_adapter(&config).await;

        let options = PutObjectOptions {
            content_type: "image/png".into(),
            ..PutObjectOptions::default()
        };
        let presigned = adapter
            .temporary_upload_url("abc-a.png", Duration::from_secs(900), &options)
            .await
            .unwrap();

        assert_eq!(presigned.method, "PUT");
        assert!(presigned
            .url
            .starts_with("https://uploads.example.com/test-bucket/abc-a.png?"));
        assert!(presigned.url.contains("X-Amz-Expires=900"));
        assert!(presigned.url.contains("X-Amz-SignedHeaders="));

        // Signing is local; the provider is never contacted
        assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
    }
}
