use crate::{
    cli::{Format, Quality},
    errors::AppError,
};
use anyhow::bail;
use indicatif::ProgressBar;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::{
    io::Read,
    path::{Path, PathBuf},
};

/// Client side of the gateway api.
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(addr: &str) -> ApiClient {
        let base_url = addr.strip_suffix('/').unwrap_or(addr).to_string();

        ApiClient { base_url }
    }

    fn post(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        log::info!("{}{}", self.base_url, path);
        let url = format!("{}{}", self.base_url, path);

        reqwest::blocking::Client::new().post(&url)
    }

    /// Ask the gateway for the provider's direct stream url.
    pub fn resolve_direct_url(&self, url: &str) -> Result<String, AppError> {
        if url.trim().is_empty() {
            return Err(AppError::EmptyUrl);
        }

        let resp = self
            .post("/api/download")
            .json(&json!({ "url": url }))
            .send()?;

        let direct: DirectUrlResponse = handle_response(resp)?;

        Ok(direct.download_url)
    }

    /// Send one download request and save the payload next to the caller.
    ///
    /// The url must be non-empty before anything goes on the wire. A single
    /// attempt only; on failure the caller resubmits.
    pub fn download(
        &self,
        url: &str,
        format: Format,
        quality: Quality,
        dest_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        if url.trim().is_empty() {
            return Err(AppError::EmptyUrl);
        }

        let mut resp = self
            .post("/downloader/download/")
            .json(&json!({
                "url": url,
                "format": format,
                "quality": quality,
            }))
            .send()?
            .error_for_status()?;

        let len = resp.content_length();
        save_payload(&mut resp, len, format, dest_dir)
    }
}

/// Write the payload to `video.<ext>` in `dest_dir`.
///
/// The bytes land in a named temp file first and are persisted in one rename,
/// so a failed transfer never leaves a partial `video.mp4` behind and the
/// temp file itself is removed on every failure path.
fn save_payload(
    reader: &mut impl Read,
    len: Option<u64>,
    format: Format,
    dest_dir: &Path,
) -> Result<PathBuf, AppError> {
    let pb = match len {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dest_dir)?;
    std::io::copy(&mut pb.wrap_read(reader), &mut tmp)?;
    pb.finish_and_clear();

    let dest = dest_dir.join(format!("video.{}", format.ext()));
    tmp.persist(&dest).map_err(|err| AppError::IO(err.error))?;

    Ok(dest)
}

#[derive(Deserialize, Debug, Clone)]
struct DirectUrlResponse {
    #[serde(rename = "downloadUrl")]
    download_url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum WebResponse<T> {
    Error { error: String },
    Data(T),
}

fn handle_response<T>(response: reqwest::blocking::Response) -> anyhow::Result<T>
where
    T: DeserializeOwned + Clone,
{
    let text = response.text()?;

    let web_response = serde_json::from_str::<WebResponse<T>>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        err
    })?;

    match web_response {
        WebResponse::Data(data) => Ok(data),
        WebResponse::Error { error } => {
            bail!(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // port 9 is discard; nothing listens there in the test environment, so a
    // request that actually went on the wire would come back as a transport
    // error, not EmptyUrl
    fn unroutable_client() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9")
    }

    #[test]
    fn test_download_empty_url_never_hits_network() {
        let tmp = tempfile::tempdir().unwrap();
        let client = unroutable_client();

        let err = client
            .download("", Format::Video, Quality::Highest, tmp.path())
            .unwrap_err();

        assert!(matches!(err, AppError::EmptyUrl));
    }

    #[test]
    fn test_download_whitespace_url_never_hits_network() {
        let tmp = tempfile::tempdir().unwrap();
        let client = unroutable_client();

        let err = client
            .download("   ", Format::Audio, Quality::Lowest, tmp.path())
            .unwrap_err();

        assert!(matches!(err, AppError::EmptyUrl));
    }

    #[test]
    fn test_resolve_empty_url_never_hits_network() {
        let client = unroutable_client();

        let err = client.resolve_direct_url("").unwrap_err();

        assert!(matches!(err, AppError::EmptyUrl));
    }

    #[test]
    fn test_save_payload_video_naming() {
        let tmp = tempfile::tempdir().unwrap();
        let mut payload = Cursor::new(b"media-bytes".to_vec());

        let path = save_payload(&mut payload, Some(11), Format::Video, tmp.path()).unwrap();

        assert_eq!(path, tmp.path().join("video.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"media-bytes");
        // exactly one file: the temp file was consumed by the rename
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_payload_audio_naming() {
        let tmp = tempfile::tempdir().unwrap();
        let mut payload = Cursor::new(b"sound".to_vec());

        let path = save_payload(&mut payload, None, Format::Audio, tmp.path()).unwrap();

        assert_eq!(path, tmp.path().join("video.mp3"));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("stream cut off"))
        }
    }

    #[test]
    fn test_save_payload_failure_leaves_no_files() {
        let tmp = tempfile::tempdir().unwrap();

        let err = save_payload(&mut FailingReader, None, Format::Video, tmp.path()).unwrap_err();

        assert!(matches!(err, AppError::IO(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_wire_response_data() {
        let parsed: WebResponse<DirectUrlResponse> =
            serde_json::from_str(r#"{"downloadUrl":"https://cdn.example/v"}"#).unwrap();

        match parsed {
            WebResponse::Data(data) => assert_eq!(data.download_url, "https://cdn.example/v"),
            WebResponse::Error { .. } => panic!("expected data"),
        }
    }

    #[test]
    fn test_wire_response_error() {
        let parsed: WebResponse<DirectUrlResponse> =
            serde_json::from_str(r#"{"error":"No download URL found"}"#).unwrap();

        match parsed {
            WebResponse::Error { error } => assert_eq!(error, "No download URL found"),
            WebResponse::Data(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
