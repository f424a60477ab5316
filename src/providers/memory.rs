//! In-memory WebDAV server used by the tests
//!
//! Behaves like a strict server: directory DELETE and MOVE require the
//! trailing separator, MKCOL/PUT under a missing parent answer 409, MKCOL on
//! an existing resource answers 405.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use url::Url;

use super::multistatus::status_code;
use super::{DavBody, DavError, DavMethod, DavRequest, DavResponse, DavTransport, TransferTick};
use crate::paths::{percent_decode, storage_path_of};

pub const ROOT_URL: &str = "https://dav.example.com/remote.php/dav/files/user/";

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File {
        data: Vec<u8>,
        content_type: Option<String>,
    },
}

/// One request as the server saw it
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRequest {
    pub method: DavMethod,
    /// Root-relative, still encoded, trailing separator kept
    pub path: String,
    pub depth: Option<String>,
    pub destination: Option<String>,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    log: Vec<LoggedRequest>,
    canned_propfind: Option<(u16, String)>,
    forced_status: Option<u16>,
}

pub struct MemoryDav {
    root: Url,
    state: Mutex<State>,
}

impl MemoryDav {
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(String::new(), Node::Dir);
        Self {
            root: Url::parse(ROOT_URL).expect("valid root"),
            state: Mutex::new(state),
        }
    }

    pub fn with_dir(self, key: &str) -> Self {
        self.state.lock().unwrap().nodes.insert(key.to_string(), Node::Dir);
        self
    }

    pub fn with_file(self, key: &str, data: &[u8]) -> Self {
        self.state.lock().unwrap().nodes.insert(
            key.to_string(),
            Node::File {
                data: data.to_vec(),
                content_type: None,
            },
        );
        self
    }

    /// Serve under another root; hrefs are rendered with its spelling
    pub fn with_root(self, root: &str) -> Self {
        Self {
            root: Url::parse(root).expect("valid root"),
            ..self
        }
    }

    /// Answer every PROPFIND with this status and body
    pub fn with_propfind_response(self, status: u16, body: &str) -> Self {
        self.state.lock().unwrap().canned_propfind = Some((status, body.to_string()));
        self
    }

    /// Answer every request with this status
    pub fn with_forced_status(self, status: u16) -> Self {
        self.state.lock().unwrap().forced_status = Some(status);
        self
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn requests_of(&self, method: DavMethod) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.path)
            .collect()
    }

    pub fn is_dir(&self, key: &str) -> bool {
        matches!(self.state.lock().unwrap().nodes.get(key), Some(Node::Dir))
    }

    pub fn file(&self, key: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(key) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(key)
    }

    /// Encoded root-relative path of a URL
    fn relative(&self, url: &Url) -> String {
        storage_path_of(url.path(), self.root.as_str())
    }

    /// Node key: decoded, no leading or trailing separator
    fn key_of(relative: &str) -> String {
        percent_decode(relative).trim_matches('/').to_string()
    }

    fn parent_key(key: &str) -> String {
        match key.rfind('/') {
            Some(i) => key[..i].to_string(),
            None => String::new(),
        }
    }

    fn href(&self, key: &str, is_dir: bool) -> String {
        let mut href = self.root.path().to_string();
        let encoded: Vec<String> = key
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        href.push_str(&encoded.join("/"));
        if is_dir && !key.is_empty() {
            href.push('/');
        }
        href
    }

    fn render_entry(&self, key: &str, node: &Node) -> String {
        match node {
            Node::Dir => format!(
                "<d:response><d:href>{}</d:href><d:propstat><d:prop>\
                 <d:resourcetype><d:collection/></d:resourcetype>\
                 <d:getlastmodified>Tue, 01 Oct 2024 10:00:00 GMT</d:getlastmodified>\
                 <oc:permissions>RGDNVCK</oc:permissions>\
                 </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
                self.href(key, true)
            ),
            Node::File { data, content_type } => format!(
                "<d:response><d:href>{}</d:href><d:propstat><d:prop>\
                 <d:resourcetype/><d:getcontentlength>{}</d:getcontentlength>\
                 {}<d:getlastmodified>Wed, 02 Oct 2024 08:30:00 GMT</d:getlastmodified>\
                 <d:creationdate>2024-10-01T07:00:00Z</d:creationdate>\
                 </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
                self.href(key, false),
                data.len(),
                content_type
                    .as_ref()
                    .map(|ct| format!("<d:getcontenttype>{}</d:getcontenttype>", ct))
                    .unwrap_or_default()
            ),
        }
    }

    fn propfind(&self, state: &State, key: &str, depth: &str) -> DavResponse {
        let Some(node) = state.nodes.get(key) else {
            return DavResponse::new(404, "");
        };
        let mut body = String::from(
            "<?xml version=\"1.0\"?><d:multistatus xmlns:d=\"DAV:\" xmlns:oc=\"http://owncloud.org/ns\">",
        );
        body.push_str(&self.render_entry(key, node));
        if depth == "1" && matches!(node, Node::Dir) {
            for (child, child_node) in &state.nodes {
                if !child.is_empty() && child != key && Self::parent_key(child) == key {
                    body.push_str(&self.render_entry(child, child_node));
                }
            }
        }
        body.push_str("</d:multistatus>");
        DavResponse::new(207, body)
    }

    fn put(state: &mut State, key: &str, request: &DavRequest) -> Result<DavResponse, DavError> {
        match state.nodes.get(&Self::parent_key(key)) {
            Some(Node::Dir) => {}
            _ => return Ok(DavResponse::new(409, "")),
        }
        if matches!(state.nodes.get(key), Some(Node::Dir)) {
            return Ok(DavResponse::new(405, ""));
        }
        let data = match &request.body {
            DavBody::Empty => Vec::new(),
            DavBody::Bytes(bytes) => bytes.clone(),
            DavBody::File(path) => std::fs::read(path)?,
        };
        if let Some(tx) = &request.progress {
            let total = data.len() as u64;
            for quarter in 1..=4u64 {
                let _ = tx.send(TransferTick {
                    loaded: total * quarter / 4,
                    total,
                });
            }
        }
        let existed = state.nodes.contains_key(key);
        state.nodes.insert(
            key.to_string(),
            Node::File {
                data,
                content_type: request.header_value("Content-Type").map(str::to_string),
            },
        );
        Ok(DavResponse::new(if existed { 204 } else { 201 }, ""))
    }

    fn subtree(state: &State, key: &str) -> Vec<String> {
        let prefix = format!("{}/", key);
        state
            .nodes
            .keys()
            .filter(|k| *k == key || k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn handle(&self, request: &DavRequest) -> Result<DavResponse, DavError> {
        let relative = self.relative(&request.url);
        let key = Self::key_of(&relative);
        let trailing = relative.ends_with('/');

        let mut state = self.state.lock().unwrap();
        state.log.push(LoggedRequest {
            method: request.method,
            path: relative.clone(),
            depth: request.header_value("Depth").map(str::to_string),
            destination: request.header_value("Destination").map(str::to_string),
        });

        if let Some(status) = state.forced_status {
            return Ok(DavResponse::new(status, ""));
        }

        let response = match request.method {
            DavMethod::Propfind => {
                if let Some((status, body)) = &state.canned_propfind {
                    return Ok(DavResponse::new(*status, body.clone()));
                }
                let depth = request.header_value("Depth").unwrap_or("1").to_string();
                self.propfind(&state, &key, &depth)
            }
            DavMethod::Mkcol => {
                if state.nodes.contains_key(&key) {
                    DavResponse::new(405, "")
                } else if !matches!(state.nodes.get(&Self::parent_key(&key)), Some(Node::Dir)) {
                    DavResponse::new(409, "")
                } else {
                    state.nodes.insert(key, Node::Dir);
                    DavResponse::new(201, "")
                }
            }
            DavMethod::Put => Self::put(&mut state, &key, request)?,
            DavMethod::Get => match state.nodes.get(&key) {
                Some(Node::File { data, .. }) => DavResponse::new(200, data.clone()),
                Some(Node::Dir) => DavResponse::new(405, ""),
                None => DavResponse::new(404, ""),
            },
            DavMethod::Delete => match state.nodes.get(&key) {
                None => DavResponse::new(404, ""),
                Some(Node::Dir) if !trailing => DavResponse::new(409, ""),
                Some(_) => {
                    for k in Self::subtree(&state, &key) {
                        state.nodes.remove(&k);
                    }
                    DavResponse::new(204, "")
                }
            },
            DavMethod::Move => {
                let destination = request
                    .header_value("Destination")
                    .and_then(|d| Url::parse(d).ok());
                let Some(destination) = destination else {
                    return Ok(DavResponse::new(400, ""));
                };
                let dest_relative = self.relative(&destination);
                let dest_key = Self::key_of(&dest_relative);
                match state.nodes.get(&key) {
                    None => DavResponse::new(404, ""),
                    Some(Node::Dir) if !trailing || !dest_relative.ends_with('/') => {
                        DavResponse::new(409, "")
                    }
                    Some(_) if !matches!(
                        state.nodes.get(&Self::parent_key(&dest_key)),
                        Some(Node::Dir)
                    ) =>
                    {
                        DavResponse::new(409, "")
                    }
                    Some(_) => {
                        for k in Self::subtree(&state, &key) {
                            if let Some(node) = state.nodes.remove(&k) {
                                let moved = format!("{}{}", dest_key, &k[key.len()..]);
                                state.nodes.insert(moved, node);
                            }
                        }
                        DavResponse::new(201, "")
                    }
                }
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl DavTransport for MemoryDav {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, DavError> {
        self.handle(&request)
    }
}

/// Build a multistatus body from (href, status line, is_collection) triples
pub fn multistatus(blocks: &[(&str, &str, bool)]) -> String {
    let mut body = String::from("<?xml version=\"1.0\"?><d:multistatus xmlns:d=\"DAV:\">");
    for (href, status, is_dir) in blocks {
        let resourcetype = if *is_dir {
            "<d:resourcetype><d:collection/></d:resourcetype>"
        } else {
            "<d:resourcetype/><d:getcontentlength>7</d:getcontentlength>"
        };
        body.push_str(&format!(
            "<d:response><d:href>{}</d:href><d:propstat><d:prop>{}</d:prop>\
             <d:status>{}</d:status></d:propstat></d:response>",
            href, resourcetype, status
        ));
    }
    body.push_str("</d:multistatus>");
    debug_assert!(blocks.iter().all(|(_, s, _)| status_code(s).is_some()));
    body
}
