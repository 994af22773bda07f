use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GiCatError {
    #[error("missing service URL (pass --url, set GICAT_URL or add base_url to gicat.json)")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GI-Cat request failed: {0}")]
    Http(String),

    #[error("GI-Cat returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to parse GI-Cat XML response: {0}")]
    Xml(String),

    #[error("the profile '{0}' does not exist")]
    ProfileNotFound(String),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("failed to initiate harvesting GI-Cat resource {title}")]
    HarvestStart { title: String },

    #[error("error harvesting the resource {title}: {raw_status}")]
    HarvestFailed { title: String, raw_status: String },

    #[error("failed to query GI-Cat ESIP OpenSearch interface: {0}")]
    OpenSearch(String),
}
