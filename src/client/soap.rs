//! Plain SOAP client for Viera TVs that do not require encryption
//!
//! Speaks the unencrypted UPnP control endpoints over HTTP. TVs from the
//! encrypted firmware generations reject these calls; the rejection is
//! surfaced as [`ClientError::EncryptionRequired`] so the session layer can
//! tell the operator to pair. Credentialed sessions and PIN authorization
//! need the encrypted protocol and are reported as unsupported here.

use crate::client::traits::{AppInfo, ClientError, ClientFactory, Credentials, VieraClient};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;
use viera_shared::keys;

const URL_CONTROL_NRC: &str = "nrc/control_0";
const URL_CONTROL_DMR: &str = "dmr/control_0";
const URN_REMOTE_CONTROL: &str = "panasonic-com:service:p00NetworkControl:1";
const URN_RENDERING_CONTROL: &str = "schemas-upnp-org:service:RenderingControl:1";

/// Resource id of the built-in web browser
const BROWSER_RESOURCE_ID: &str = "1063";

/// HTTP-backed handle to one TV
pub struct SoapClient {
    http: reqwest::Client,
    base_url: String,
    device_name: String,
}

impl SoapClient {
    pub fn new(http: reqwest::Client, host: &str, port: u16, device_name: &str) -> Self {
        Self {
            http,
            base_url: format!("http://{}:{}", host, port),
            device_name: device_name.to_string(),
        }
    }

    async fn soap_request(
        &self,
        path: &str,
        urn: &str,
        action: &str,
        params: &str,
    ) -> Result<String, ClientError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("SOAP {} -> {}", action, url);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", format!("\"urn:{}#{}\"", urn, action))
            .body(soap_envelope(urn, action, params))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport_error)?;

        if status == 401 || status == 403 {
            return Err(ClientError::EncryptionRequired(format!(
                "{} rejected with HTTP {}",
                action, status
            )));
        }

        if !(200..300).contains(&status) {
            if fault_requires_encryption(&body) {
                return Err(ClientError::EncryptionRequired(format!(
                    "{} rejected: {}",
                    action,
                    tag_value(&body, "errorDescription").unwrap_or_default()
                )));
            }
            return Err(ClientError::Protocol(format!(
                "{} failed with HTTP {}",
                action, status
            )));
        }

        Ok(body)
    }

    async fn nrc(&self, action: &str, params: &str) -> Result<String, ClientError> {
        self.soap_request(URL_CONTROL_NRC, URN_REMOTE_CONTROL, action, params)
            .await
    }

    async fn dmr(&self, action: &str, params: &str) -> Result<String, ClientError> {
        self.soap_request(URL_CONTROL_DMR, URN_RENDERING_CONTROL, action, params)
            .await
    }

    async fn launch(&self, keyword: &str) -> Result<(), ClientError> {
        let params = format!(
            "<X_AppType>vc_app</X_AppType><X_LaunchKeyword>{}</X_LaunchKeyword>",
            xml_escape(keyword)
        );
        self.nrc("X_LaunchApp", &params).await?;
        Ok(())
    }
}

#[async_trait]
impl VieraClient for SoapClient {
    async fn get_volume(&self) -> Result<Option<u8>, ClientError> {
        let body = self
            .dmr(
                "GetVolume",
                "<InstanceID>0</InstanceID><Channel>Master</Channel>",
            )
            .await?;
        Ok(tag_value(&body, "CurrentVolume").and_then(|v| v.parse().ok()))
    }

    async fn get_mute(&self) -> Result<Option<bool>, ClientError> {
        let body = self
            .dmr("GetMute", "<InstanceID>0</InstanceID><Channel>Master</Channel>")
            .await?;
        Ok(tag_value(&body, "CurrentMute").and_then(|v| match v.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }))
    }

    async fn set_volume(&self, volume: u8) -> Result<(), ClientError> {
        let params = format!(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredVolume>{}</DesiredVolume>",
            volume
        );
        self.dmr("SetVolume", &params).await?;
        Ok(())
    }

    async fn set_mute(&self, muted: bool) -> Result<(), ClientError> {
        let params = format!(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredMute>{}</DesiredMute>",
            u8::from(muted)
        );
        self.dmr("SetMute", &params).await?;
        Ok(())
    }

    async fn send_key(&self, key: &str) -> Result<(), ClientError> {
        let params = format!("<X_KeyEvent>{}</X_KeyEvent>", xml_escape(key));
        self.nrc("X_SendKey", &params).await?;
        Ok(())
    }

    async fn turn_on(&self) -> Result<(), ClientError> {
        self.send_key(keys::KEY_POWER).await
    }

    async fn turn_off(&self) -> Result<(), ClientError> {
        self.send_key(keys::KEY_POWER).await
    }

    async fn open_webpage(&self, url: &str) -> Result<(), ClientError> {
        self.launch(&format!("resource_id={}&url={}", BROWSER_RESOURCE_ID, url))
            .await
    }

    async fn get_apps(&self) -> Result<Vec<AppInfo>, ClientError> {
        let body = self.nrc("X_GetAppList", "").await?;
        Ok(tag_value(&body, "X_AppList")
            .map(|list| parse_app_list(&xml_unescape(&list)))
            .unwrap_or_default())
    }

    async fn launch_app(&self, app: &AppInfo) -> Result<(), ClientError> {
        self.launch(&format!("product_id={}", app.id)).await
    }

    async fn request_pin_code(&self) -> Result<(), ClientError> {
        let params = format!(
            "<X_DeviceName>{}</X_DeviceName>",
            xml_escape(&self.device_name)
        );
        let body = self.nrc("X_DisplayPinCode", &params).await?;
        if tag_value(&body, "X_ChallengeKey").is_none() {
            return Err(ClientError::Protocol(
                "PIN request returned no challenge key".into(),
            ));
        }
        Ok(())
    }

    async fn authorize_pin_code(&mut self, _pin: &str) -> Result<(), ClientError> {
        Err(ClientError::Unsupported(
            "PIN authorization needs an encrypting client",
        ))
    }

    fn credentials(&self) -> Option<Credentials> {
        None
    }
}

/// Factory producing plain SOAP handles
pub struct SoapClientFactory {
    http: reqwest::Client,
    device_name: String,
}

impl SoapClientFactory {
    /// Create a factory whose handles share one HTTP client
    pub fn new(request_timeout: Duration, device_name: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Protocol(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            device_name: device_name.into(),
        })
    }
}

#[async_trait]
impl ClientFactory for SoapClientFactory {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn VieraClient>, ClientError> {
        if credentials.is_some() {
            return Err(ClientError::Unsupported(
                "credentialed sessions need an encrypting client",
            ));
        }

        Ok(Box::new(SoapClient::new(
            self.http.clone(),
            host,
            port,
            &self.device_name,
        )))
    }
}

fn map_transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(err.to_string())
    } else if err.is_connect() {
        ClientError::Refused(err.to_string())
    } else if err.is_request() || err.is_body() {
        ClientError::Reset(err.to_string())
    } else {
        ClientError::Protocol(err.to_string())
    }
}

fn soap_envelope(urn: &str, action: &str, params: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" ",
            "s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">",
            "<s:Body><u:{action} xmlns:u=\"urn:{urn}\">{params}</u:{action}></s:Body>",
            "</s:Envelope>"
        ),
        action = action,
        urn = urn,
        params = params
    )
}

/// Whether a SOAP fault body signals that encryption is required
fn fault_requires_encryption(body: &str) -> bool {
    let code = tag_value(body, "errorCode").unwrap_or_default();
    let description = tag_value(body, "errorDescription")
        .unwrap_or_default()
        .to_ascii_lowercase();

    code == "401"
        || code == "403"
        || description.contains("unauthorized")
        || description.contains("encrypt")
}

/// Leaf element with text content; the name is captured with and without prefix
static LEAF_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:\w+:)?(\w+)(?:\s[^>]*)?>([^<]*)</(?:\w+:)?(\w+)>")
        .expect("leaf element pattern is valid")
});

static APP_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"product_id=([^']+)'([^']+)'").expect("app entry pattern is valid")
});

/// Text content of the first `<tag>` (any namespace prefix)
fn tag_value(xml: &str, tag: &str) -> Option<String> {
    LEAF_ELEMENT
        .captures_iter(xml)
        .find(|caps| &caps[1] == tag && &caps[3] == tag)
        .map(|caps| caps[2].trim().to_string())
}

/// Parse the `X_AppList` payload into app entries, in reported order
fn parse_app_list(list: &str) -> Vec<AppInfo> {
    APP_ENTRY
        .captures_iter(list)
        .map(|caps| AppInfo::new(&caps[1], &caps[2]))
        .collect()
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
