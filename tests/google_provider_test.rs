//! Tests for the Google Drive provider with mocked HTTP responses.

use mockito::{Matcher, Mock, Server};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

use driven::models::{FilePage, FileRecord, ServiceAccountCredentials};
use driven::prelude::*;
use driven::{BackendKind, Config, Credential, Driven, ErrorKind, FileContent};

const TOKEN: &str = "test-token";

fn config_for(server: &Server) -> Config {
    Config {
        backend: BackendKind::Google,
        api_base: server.url(),
        upload_base: server.url(),
        page_size: 2,
        worker_threads: 2,
        credential_store: None,
        ..Default::default()
    }
}

fn mock_about(server: &mut Server) -> Mock {
    server
        .mock("GET", "/about")
        .match_query(Matcher::Any)
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "user": {
                    "permissionId": "perm-1",
                    "displayName": "Test User",
                    "emailAddress": "test@example.com"
                }
            })
            .to_string(),
        )
        .create()
}

fn signed_in(server: &mut Server) -> Driven {
    mock_about(server);
    let driven = Driven::from_config(&config_for(server)).unwrap();
    assert!(driven
        .authenticate_with(Credential::access_token(TOKEN), false)
        .is_success());
    driven
}

fn not_found_body() -> String {
    json!({"error": {"code": 404, "message": "File not found"}}).to_string()
}

mod models {
    use super::*;

    #[test]
    fn test_file_record_deserialization() {
        let json = json!({
            "id": "file123",
            "name": "document.pdf",
            "mimeType": "application/pdf",
            "webContentLink": "https://drive.google.com/uc?id=file123&export=download",
            "parents": ["folder1"],
            "size": "2048"
        });

        let record: FileRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.id, "file123");
        assert_eq!(record.title, "document.pdf");
        assert_eq!(record.mime_type, Some("application/pdf".to_string()));
        assert!(record.download_url.unwrap().contains("export=download"));
        assert_eq!(record.parents, vec!["folder1".to_string()]);
        assert_eq!(record.size, Some(2048));
        assert!(!record.trashed);
    }

    #[test]
    fn test_folder_record_without_size() {
        let json = json!({
            "id": "folder123",
            "name": "My Folder",
            "mimeType": "application/vnd.google-apps.folder"
        });

        let record: FileRecord = serde_json::from_value(json).unwrap();

        assert!(record.is_folder());
        assert_eq!(record.size, None);
    }

    #[test]
    fn test_file_page_deserialization() {
        let json = json!({
            "files": [
                {"id": "f1", "name": "file1.txt"},
                {"id": "f2", "name": "file2.txt"}
            ],
            "nextPageToken": "token123"
        });

        let page: FilePage = serde_json::from_value(json).unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_page_token, Some("token123".to_string()));
    }
}

mod credentials {
    use super::*;

    #[test]
    fn test_credentials_from_json() {
        let json = json!({
            "client_email": "test@project.iam.gserviceaccount.com",
            "private_key": "key",
            "token_uri": "https://oauth2.googleapis.com/token"
        });

        let creds: ServiceAccountCredentials = serde_json::from_value(json).unwrap();

        assert_eq!(creds.client_email, "test@project.iam.gserviceaccount.com");
        assert_eq!(creds.token_uri, Some("https://oauth2.googleapis.com/token".to_string()));
    }

    #[test]
    fn test_credential_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({
            "client_email": "test@project.iam.gserviceaccount.com",
            "private_key": "key"
        });
        temp_file.write_all(creds_json.to_string().as_bytes()).unwrap();

        let credential = Credential::from_file(temp_file.path()).unwrap();
        assert_eq!(
            credential.account(),
            Some("test@project.iam.gserviceaccount.com")
        );
    }

    #[test]
    fn test_credential_from_invalid_file() {
        assert!(Credential::from_file("/nonexistent/path/credentials.json").is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid json").unwrap();
        assert!(Credential::from_file(temp_file.path()).is_err());
    }
}

mod session {
    use super::*;

    #[test]
    fn test_authenticate_checks_the_token() {
        let mut server = Server::new();
        let about = mock_about(&mut server);

        let driven = Driven::from_config(&config_for(&server)).unwrap();
        assert_eq!(driven.provider().name(), "google");
        assert!(driven
            .authenticate_with(Credential::access_token(TOKEN), false)
            .is_success());

        about.assert();
        let user = driven.user().unwrap();
        assert_eq!(user.name.as_deref(), Some("perm-1"));
        assert_eq!(user.email_address.as_deref(), Some("test@example.com"));
    }

    #[test]
    fn test_rejected_token_fails_authentication() {
        let mut server = Server::new();
        server
            .mock("GET", "/about")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(json!({"error": {"code": 401, "message": "Invalid Credentials"}}).to_string())
            .create();

        let driven = Driven::from_config(&config_for(&server)).unwrap();
        let outcome = driven.authenticate_with(Credential::access_token("bad"), false);

        assert!(!outcome.is_success());
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::AuthenticationFailed);
        assert!(!driven.is_authenticated());
        assert_eq!(driven.get("abc").unwrap_err().kind(), ErrorKind::NotAuthenticated);
    }

    #[test]
    fn test_credential_without_secret_is_rejected() {
        let server = Server::new();
        let driven = Driven::from_config(&config_for(&server)).unwrap();

        let outcome = driven.authenticate_with(Credential::named("nobody"), false);
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn test_persisted_credential_is_cleared_on_deauthenticate() {
        let mut server = Server::new();
        mock_about(&mut server);
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("driven").join("credential.json");

        let config = Config {
            credential_store: Some(store_path.clone()),
            ..config_for(&server)
        };
        let driven = Driven::from_config(&config).unwrap();

        assert!(driven
            .authenticate_with(Credential::access_token(TOKEN), false)
            .is_success());
        assert!(!store_path.exists());

        assert!(driven.authenticate(Credential::access_token(TOKEN)).is_success());
        let saved = config.credential_store().unwrap().load().unwrap().unwrap();
        assert!(saved.source().is_some());

        assert!(driven.deauthenticate().is_success());
        assert!(!store_path.exists());
    }
}

mod operations {
    use super::*;

    #[test]
    fn test_get_and_display() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::Regex("fields=".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "id": "abc123",
                    "name": "document.pdf",
                    "mimeType": "application/pdf",
                    "size": "1048576"
                })
                .to_string(),
            )
            .create();

        let file = driven.get("abc123").unwrap();
        assert_eq!(file.title(), "document.pdf");
        assert!(!file.has_details());

        let display = format!("{}", file);
        assert!(display.contains("abc123"));
        assert!(display.contains("1.00 MB"));
        assert!(display.contains("application/pdf"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(not_found_body())
            .create();

        let err = driven.get("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_details_merge_full_record() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::Regex("size".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "id": "abc123",
                    "name": "document.pdf",
                    "createdTime": "2024-01-01T00:00:00.000Z",
                    "md5Checksum": "d41d8cd98f00b204e9800998ecf8427e"
                })
                .to_string(),
            )
            .create();
        server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::Regex("trashed&supportsAllDrives".to_string()))
            .with_status(200)
            .with_body(json!({"id": "abc123", "name": "document.pdf", "mimeType": "application/pdf"}).to_string())
            .create();

        let file = driven.get("abc123").unwrap();
        let detailed = driven.details(&file).unwrap();

        assert!(detailed.has_details());
        assert_eq!(detailed.mime_type(), Some("application/pdf"));
        assert_eq!(
            detailed.model().md5_checksum.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert!(file.model().md5_checksum.is_none());
    }

    #[test]
    fn test_query_follows_page_tokens() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);

        let first_page = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("fields=[^&]*&supportsAllDrives=true".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        {"id": "f1", "name": "report-1.txt"},
                        {"id": "f2", "name": "report-2.txt"}
                    ],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .expect(1)
            .create();
        let second_page = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".to_string(), "p2".to_string()))
            .with_status(200)
            .with_body(json!({"files": [{"id": "f3", "name": "report-3.txt"}]}).to_string())
            .expect(1)
            .create();

        let ids: Vec<String> = driven
            .query("name contains 'report'")
            .unwrap()
            .map(|file| file.unwrap().id().to_string())
            .collect();

        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        first_page.assert();
        second_page.assert();
    }

    #[test]
    fn test_list_scopes_to_parent() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        let listing = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".to_string(),
                "'root' in parents and trashed = false".to_string(),
            ))
            .with_status(200)
            .with_body(json!({"files": [{"id": "f1", "name": "a.txt"}]}).to_string())
            .create();

        assert_eq!(driven.list().unwrap().count(), 1);
        listing.assert();
    }

    #[test]
    fn test_first_without_match_is_none() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create();

        assert!(driven.first("name = 'nothing'").unwrap().is_none());
    }

    #[test]
    fn test_first_skips_empty_pages() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);

        let empty_page = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("fields=[^&]*&supportsAllDrives=true".to_string()))
            .with_status(200)
            .with_body(json!({"files": [], "nextPageToken": "p2"}).to_string())
            .expect(2)
            .create();
        let second_page = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".to_string(), "p2".to_string()))
            .with_status(200)
            .with_body(json!({"files": [{"id": "f1", "name": "Title01"}]}).to_string())
            .expect(2)
            .create();

        let found = driven.first("name = 'Title01'").unwrap().unwrap();
        assert_eq!(found.id(), "f1");

        let by_title = driven.title("Title01").unwrap();
        assert_eq!(by_title.id(), "f1");

        empty_page.assert();
        second_page.assert();
    }

    #[test]
    fn test_shared_lists_shared_with_me() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        let listing = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".to_string(),
                "sharedWithMe = true and trashed = false".to_string(),
            ))
            .with_status(200)
            .with_body(
                json!({"files": [{"id": "s1", "name": "from-alice.txt", "sharedWithMeTime": "2024-01-01T00:00:00Z"}]})
                    .to_string(),
            )
            .create();

        let ids: Vec<String> = driven
            .shared()
            .unwrap()
            .map(|file| file.unwrap().id().to_string())
            .collect();

        assert_eq!(ids, vec!["s1"]);
        listing.assert();
    }

    #[test]
    fn test_delete_reports_existence() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("DELETE", "/files/gone")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(not_found_body())
            .create();
        server
            .mock("DELETE", "/files/abc123")
            .match_query(Matcher::Any)
            .with_status(204)
            .create();

        assert!(!driven.delete("gone").unwrap());
        assert!(driven.delete("abc123").unwrap());
    }

    #[test]
    fn test_server_error_is_remote_failure() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("DELETE", "/files/abc123")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(json!({"error": {"code": 500, "message": "Backend Error"}}).to_string())
            .create();

        let err = driven.delete("abc123").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert!(err.to_string().contains("Backend Error"));
    }

    #[test]
    fn test_create_folder_and_upload() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        let folder_mock = server
            .mock("POST", "/files")
            .match_query(Matcher::Regex("^fields=".to_string()))
            .match_body(Matcher::PartialJson(json!({
                "name": "Reports",
                "mimeType": "application/vnd.google-apps.folder"
            })))
            .with_status(200)
            .with_body(
                json!({
                    "id": "folder1",
                    "name": "Reports",
                    "mimeType": "application/vnd.google-apps.folder"
                })
                .to_string(),
            )
            .create();
        let upload_mock = server
            .mock("POST", "/files")
            .match_query(Matcher::UrlEncoded(
                "uploadType".to_string(),
                "multipart".to_string(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "id": "file1",
                    "name": "q1.csv",
                    "mimeType": "text/csv",
                    "parents": ["folder1"]
                })
                .to_string(),
            )
            .create();

        let folder = driven.create("Reports").unwrap();
        assert!(folder.is_folder());

        let content = FileContent::from_bytes("text/csv", b"a,b\n1,2\n".to_vec());
        let file = driven.create_in_with(&folder, "q1.csv", content).unwrap();
        assert_eq!(file.model().parents, vec!["folder1".to_string()]);

        folder_mock.assert();
        upload_mock.assert();
    }

    #[test]
    fn test_update_returns_backend_record() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "abc123", "name": "notes", "mimeType": "text/plain"}).to_string())
            .create();
        server
            .mock("PATCH", "/files/abc123")
            .match_query(Matcher::UrlEncoded(
                "uploadType".to_string(),
                "multipart".to_string(),
            ))
            .with_status(200)
            .with_body(json!({"id": "abc123", "name": "notes", "mimeType": "text/markdown"}).to_string())
            .create();

        let file = driven.get("abc123").unwrap();
        let content = FileContent::from_bytes("text/markdown", b"# notes".to_vec());
        let updated = driven.update(&file, content).unwrap();

        assert_eq!(updated.mime_type(), Some("text/markdown"));
        assert_eq!(file.mime_type(), Some("text/plain"));
    }

    #[test]
    fn test_share_and_download() {
        let mut server = Server::new();
        let driven = signed_in(&mut server);
        server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::Regex("fields=".to_string()))
            .with_status(200)
            .with_body(json!({"id": "abc123", "name": "hello.txt"}).to_string())
            .create();
        let media = server
            .mock("GET", "/files/abc123")
            .match_query(Matcher::UrlEncoded("alt".to_string(), "media".to_string()))
            .with_status(200)
            .with_body("hello world")
            .create();
        let permission = server
            .mock("POST", "/files/abc123/permissions")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "role": "reader",
                "type": "user",
                "emailAddress": "reader@example.com"
            })))
            .with_status(200)
            .with_body(json!({"id": "perm-2"}).to_string())
            .create();

        let file = driven.get("abc123").unwrap();
        assert!(driven.share(&file, "reader@example.com").unwrap());
        permission.assert();

        let dir = tempfile::tempdir().unwrap();
        let saved = driven.download(&file, dir.path()).unwrap();
        assert_eq!(saved, dir.path().join("hello.txt"));
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "hello world");
        media.assert();
    }
}
