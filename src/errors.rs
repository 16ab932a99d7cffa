#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("please enter a video url")]
    EmptyUrl,

    #[error("no download url found")]
    NoDownloadUrl,

    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
