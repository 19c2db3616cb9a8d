// Script execution client
//
// The controller runs HomeMatic script posted to `/a.exe` on its script
// port and answers with a flat XML document holding every variable the
// script defined. Replies carry no XML declaration but are windows-1252.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default port of the controller's script endpoint.
pub const DEFAULT_SCRIPT_PORT: u16 = 8181;

/// Collects `address=name` for every device and channel into `output`.
pub const DEVICE_NAMES_SCRIPT: &str = r#"string output = "";
string devId;
foreach(devId, root.Devices().EnumUsedIDs()) {
  object dev = dom.GetObject(devId);
  output = output # dev.Address() # "=" # dev.Name() # "\n";
  string chId;
  foreach(chId, dev.Channels().EnumUsedIDs()) {
    object ch = dom.GetObject(chId);
    output = output # ch.Address() # "=" # ch.Name() # "\n";
  }
}
"#;

/// Variable holding the name listing produced by [`DEVICE_NAMES_SCRIPT`].
pub const OUTPUT_VARIABLE: &str = "output";

/// Resolves device addresses to user-assigned names.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn device_names(&self) -> Result<HashMap<String, String>, Error>;
}

// ── Result ───────────────────────────────────────────────────────────

/// Variables returned by a script run, by element name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptResult(BTreeMap<String, String>);

impl ScriptResult {
    /// Decode a reply body of the form `<xml><name>text</name>…</xml>`.
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let root = crate::xml::parse_with_encoding(body, WINDOWS_1252)?;
        Ok(Self(
            root.children
                .into_iter()
                .map(|e| (e.name, e.text))
                .collect(),
        ))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse the variable `key` as `key=value` lines. Lines without `=` are
    /// skipped; `None` if the variable is absent.
    pub fn get_map(&self, key: &str) -> Option<HashMap<String, String>> {
        let entry = self.0.get(key)?;
        Some(
            entry
                .lines()
                .filter_map(|line| line.split_once('='))
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScriptResult {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client for the controller's script endpoint.
pub struct ScriptClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ScriptClient {
    /// `base_url` is the script server root, e.g. `http://ccu:8181/`.
    pub fn new(base_url: &Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            endpoint: base_url.join("a.exe")?,
        })
    }

    pub fn for_host(host: &str, port: u16, transport: &TransportConfig) -> Result<Self, Error> {
        let base = Url::parse(&format!("http://{host}:{port}/"))?;
        Self::new(&base, transport)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run `script` on the controller.
    pub async fn run(&self, script: &str) -> Result<ScriptResult, Error> {
        debug!(url = %self.endpoint, len = script.len(), "running script");
        let resp = self
            .http
            .post(self.endpoint.clone())
            .body(script.to_owned())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: self.endpoint.to_string(),
            });
        }

        ScriptResult::parse(&resp.bytes().await?)
    }
}

#[async_trait]
impl NameLookup for ScriptClient {
    async fn device_names(&self) -> Result<HashMap<String, String>, Error> {
        let result = self.run(DEVICE_NAMES_SCRIPT).await?;
        Ok(result.get_map(OUTPUT_VARIABLE).unwrap_or_default())
    }
}
