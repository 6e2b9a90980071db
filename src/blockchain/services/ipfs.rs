//! IPFS URI handling, gateway fetches and local-node writes.
//!
//! Read operations only need an HTTP gateway; add/pin go through the HTTP
//! API of a local node (`/api/v0/add`, `/api/v0/pin/add`).

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};

/// Loose CID shape check: CIDv0 (Qm..., 46 chars) or lowercase CIDv1 (baf...).
pub fn looks_like_cid(s: &str) -> bool {
    (s.len() == 46 && s.starts_with("Qm"))
        || (s.len() >= 46 && s.starts_with("baf") && s.chars().all(|c| c.is_ascii_alphanumeric()))
}

pub fn is_ipfs_uri(uri: &str) -> bool {
    uri.starts_with("ipfs://") || uri.contains("/ipfs/") || looks_like_cid(uri)
}

/// Split any accepted form (ipfs://CID/path, gateway URL, bare CID) into
/// (cid, path). Path keeps its leading slash or is empty.
pub fn extract_cid(uri: &str) -> Option<(String, String)> {
    let rest = if let Some(stripped) = uri.strip_prefix("ipfs://") {
        stripped
    } else if let Some(idx) = uri.find("/ipfs/") {
        &uri[idx + "/ipfs/".len()..]
    } else if looks_like_cid(uri) {
        uri
    } else {
        return None;
    };

    let (cid, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if cid.is_empty() {
        return None;
    }
    Some((cid.to_string(), path.to_string()))
}

/// Canonical `ipfs://CID[/path]` form.
pub fn normalize_ipfs_uri(uri: &str) -> Option<String> {
    let (cid, path) = extract_cid(uri)?;
    Some(format!("ipfs://{}{}", cid, path))
}

/// Rewrite any accepted form into a gateway HTTP URL.
pub fn to_gateway_url(gateway: &str, cid: &str, path: &str) -> String {
    let gateway = if gateway.ends_with('/') {
        gateway.to_string()
    } else {
        format!("{}/", gateway)
    };
    format!("{}{}{}", gateway, cid, path)
}

/// Fetch content through a gateway, shaping the body by content type.
pub async fn gateway_fetch(
    client: &Client,
    gateway: &str,
    cid: &str,
    path: &str,
) -> Result<Value> {
    let url = to_gateway_url(gateway, cid, path);
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Failed to retrieve content: HTTP {}", status));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response.bytes().await?;

    let content = if content_type.contains("application/json") {
        serde_json::from_slice::<Value>(&body)
            .unwrap_or_else(|_| Value::String("[Binary data not displayed]".to_string()))
    } else if content_type.starts_with("text/") || content_type.contains("application/xml") {
        match String::from_utf8(body.to_vec()) {
            Ok(text) => Value::String(text),
            Err(_) => Value::String("[Binary data not displayed]".to_string()),
        }
    } else {
        Value::String("[Binary data not displayed]".to_string())
    };

    Ok(json!({
        "cid": cid,
        "path": path,
        "content_type": content_type,
        "gateway_url": url,
        "size": body.len(),
        "content": content,
    }))
}

/// Add bytes via a local node's HTTP API; returns the new CID.
pub async fn node_add(client: &Client, api_url: &str, content: Vec<u8>) -> Result<String> {
    let url = format!("{}/api/v0/add", api_url.trim_end_matches('/'));
    let part = reqwest::multipart::Part::bytes(content).file_name("file");
    let form = reqwest::multipart::Form::new().part("file", part);
    let response = client.post(&url).multipart(form).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        return Err(anyhow!("IPFS node add failed: HTTP {} {}", status, body));
    }
    body["Hash"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("IPFS node add response missing Hash"))
}

/// Pin an existing CID on a local node.
pub async fn node_pin(client: &Client, api_url: &str, cid: &str) -> Result<()> {
    let url = format!("{}/api/v0/pin/add", api_url.trim_end_matches('/'));
    let response = client.post(&url).query(&[("arg", cid)]).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("IPFS node pin failed: HTTP {} {}", status, body));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[test]
    fn extracts_cid_from_all_accepted_forms() {
        assert_eq!(
            extract_cid(&format!("ipfs://{}/meta.json", CID)),
            Some((CID.to_string(), "/meta.json".to_string()))
        );
        assert_eq!(
            extract_cid(&format!("https://ipfs.io/ipfs/{}", CID)),
            Some((CID.to_string(), String::new()))
        );
        assert_eq!(extract_cid(CID), Some((CID.to_string(), String::new())));
        assert_eq!(extract_cid("https://example.com/nothing"), None);
    }

    #[test]
    fn normalizes_gateway_urls_to_ipfs_scheme() {
        assert_eq!(
            normalize_ipfs_uri(&format!("https://gateway.pinata.cloud/ipfs/{}/1.png", CID)),
            Some(format!("ipfs://{}/1.png", CID))
        );
    }

    #[test]
    fn gateway_url_handles_missing_trailing_slash() {
        assert_eq!(
            to_gateway_url("https://ipfs.io/ipfs", CID, "/x"),
            format!("https://ipfs.io/ipfs/{}/x", CID)
        );
    }

    #[test]
    fn cid_shape_check() {
        assert!(looks_like_cid(CID));
        assert!(!looks_like_cid("Qmshort"));
        assert!(!looks_like_cid("vitalik.eth"));
    }
}
