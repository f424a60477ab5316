//! WebDAV multistatus document parsing
//!
//! Turns a `207 Multi-Status` body into per-resource blocks without
//! interpreting them. Element names are matched on their local part only, so
//! `<d:href>`, `<D:href>` and `<href xmlns="DAV:">` are treated alike.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::DavError;

/// Properties of one `<propstat>` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropValues {
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub display_name: Option<String>,
    pub creation_date: Option<String>,
    pub permissions: Option<String>,
    /// `<collection/>` found inside `<resourcetype>`
    pub is_collection: bool,
    pub wopi_url: Option<String>,
    pub token: Option<String>,
    pub token_ttl: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propstat {
    /// Raw status line, e.g. "HTTP/1.1 200 OK"
    pub status: Option<String>,
    pub props: PropValues,
}

impl Propstat {
    pub fn is_success(&self) -> bool {
        self.status
            .as_deref()
            .and_then(status_code)
            .map(|code| (200..300).contains(&code))
            .unwrap_or(false)
    }
}

/// One `<response>` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceBlock {
    pub href: Option<String>,
    pub propstats: Vec<Propstat>,
}

impl ResourceBlock {
    /// First property block reported with a 2xx status
    pub fn successful_props(&self) -> Option<&PropValues> {
        self.propstats
            .iter()
            .find(|p| p.is_success())
            .map(|p| &p.props)
    }
}

/// Extract the numeric code from an HTTP status line
pub fn status_code(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Resolve a general entity reference (`amp`, `#38`, `#x26`, ...)
fn resolve_entity(name: &str) -> String {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };
    match resolved {
        Some(c) => c.to_string(),
        None => format!("&{};", name),
    }
}

fn store_prop(props: &mut PropValues, name: &str, text: String) {
    let value = Some(text).filter(|t| !t.is_empty());
    match name {
        "getlastmodified" => props.last_modified = value,
        "getcontenttype" => props.content_type = value,
        "getcontentlength" => props.content_length = value,
        "displayname" => props.display_name = value,
        "creationdate" => props.creation_date = value,
        "permissions" => props.permissions = value,
        "wopi-url" => props.wopi_url = value,
        "token" => props.token = value,
        "token-ttl" => props.token_ttl = value,
        _ => {}
    }
}

/// Parse a multistatus body into resource blocks.
///
/// Fails only when the document itself is unusable (not XML, unbalanced, or
/// no `<multistatus>` root). Incomplete blocks are returned as-is and left
/// for the caller to skip.
pub fn parse_multistatus(xml: &str) -> Result<Vec<ResourceBlock>, DavError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    let mut blocks = Vec::new();
    let mut block: Option<ResourceBlock> = None;
    let mut propstat: Option<Propstat> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                text.clear();
                match name.as_str() {
                    "multistatus" => saw_root = true,
                    "response" => block = Some(ResourceBlock::default()),
                    "propstat" if block.is_some() => propstat = Some(Propstat::default()),
                    "collection" if stack.iter().any(|s| s == "resourcetype") => {
                        if let Some(ps) = propstat.as_mut() {
                            ps.props.is_collection = true;
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "collection" && stack.last().map(String::as_str) == Some("resourcetype") {
                    if let Some(ps) = propstat.as_mut() {
                        ps.props.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(ref e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(ref e)) => {
                text.push_str(&resolve_entity(&String::from_utf8_lossy(e.as_ref())));
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                stack.pop();
                let parent = stack.last().map(String::as_str);
                let value = text.trim().to_string();
                match (name.as_str(), parent) {
                    ("href", Some("response")) => {
                        if let Some(b) = block.as_mut() {
                            b.href = Some(value).filter(|h| !h.is_empty());
                        }
                    }
                    ("status", Some("propstat")) => {
                        if let Some(ps) = propstat.as_mut() {
                            ps.status = Some(value);
                        }
                    }
                    ("propstat", _) => {
                        if let (Some(b), Some(ps)) = (block.as_mut(), propstat.take()) {
                            b.propstats.push(ps);
                        }
                    }
                    ("response", _) => {
                        if let Some(b) = block.take() {
                            blocks.push(b);
                        }
                    }
                    (prop_name, Some("prop")) => {
                        if let Some(ps) = propstat.as_mut() {
                            store_prop(&mut ps.props, prop_name, value);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DavError::MalformedResponse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DavError::MalformedResponse(format!(
            "document ended inside <{}>",
            stack.join("><")
        )));
    }
    if !saw_root {
        return Err(DavError::MalformedResponse(
            "no <multistatus> element in response".to_string(),
        ));
    }

    Ok(blocks)
}
