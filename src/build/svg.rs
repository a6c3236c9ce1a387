//! SVG rewriting shared by the sprite builder and the SVG compressor.
//!
//! Both walk the document as a `quick-xml` event stream and re-emit it with
//! some attributes or nodes dropped. Text and attribute values are copied
//! through in their escaped form.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Attributes stripped from icons so they inherit color from surrounding markup.
pub const PRESENTATION_ATTRS: [&str; 3] = ["fill", "stroke", "style"];

/// Error while rewriting an SVG document.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("root element is <{0}>, expected <svg>")]
    NotSvg(String),
    #[error("document has no root element")]
    Empty,
}

/// An icon ready to be nested in a sprite sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    /// Fragment identifier (the icon's file stem)
    pub id: String,
    /// Root viewBox, or one derived from width/height
    pub view_box: Option<String>,
    /// Serialized children of the root element
    pub body: String,
}

impl Icon {
    /// Serialize as a nested `<svg>` element.
    pub fn to_nested_svg(&self) -> String {
        let mut out = format!("<svg id=\"{}\"", escape(self.id.as_str()));
        if let Some(view_box) = &self.view_box {
            out.push_str(&format!(" viewBox=\"{}\"", escape(view_box.as_str())));
        }
        out.push('>');
        out.push_str(&self.body);
        out.push_str("</svg>");
        out
    }
}

/// Parse an icon, dropping presentational attributes from every element.
///
/// Declarations, doctypes, comments and processing instructions are removed.
/// The root `<svg>` element itself is not kept; its viewBox is recorded.
pub fn parse_icon(id: &str, source: &str) -> Result<Icon, SvgError> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut depth = 0usize;
    let mut root: Option<RootAttrs> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if root.is_none() {
                    root = Some(RootAttrs::read(&e)?);
                } else {
                    writer.write_event(Event::Start(rebuild(&e, |key| {
                        !PRESENTATION_ATTRS.contains(&key)
                    })?))?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if root.is_none() {
                    root = Some(RootAttrs::read(&e)?);
                } else {
                    writer.write_event(Event::Empty(rebuild(&e, |key| {
                        !PRESENTATION_ATTRS.contains(&key)
                    })?))?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth > 0 {
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::Text(t) if depth > 0 => writer.write_event(Event::Text(t))?,
            Event::CData(c) if depth > 0 => writer.write_event(Event::CData(c))?,
            Event::Eof => break,
            _ => {}
        }
    }

    let root = root.ok_or(SvgError::Empty)?;
    let derived = root.derived_view_box();
    Ok(Icon {
        id: id.to_string(),
        view_box: root.view_box.or(derived),
        body: String::from_utf8_lossy(&writer.into_inner()).into_owned(),
    })
}

/// Structural cleanup options for standalone SVG files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgCleanOptions {
    /// Drop a root viewBox that only restates width and height
    pub remove_view_box: bool,
    /// Drop ids that nothing in the document references
    pub cleanup_ids: bool,
}

/// Minify a standalone SVG document.
///
/// Removes declarations, doctypes, comments, processing instructions,
/// `<metadata>` subtrees and whitespace-only text.
pub fn clean_svg(source: &str, options: SvgCleanOptions) -> Result<String, SvgError> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut seen_root = false;
    let mut skip_depth = 0usize;

    let keep_attr = |is_root: bool, root: Option<&RootAttrs>, key: &str, value: &str| -> bool {
        if is_root && key == "viewBox" && options.remove_view_box {
            if let Some(derived) = root.and_then(RootAttrs::derived_view_box) {
                return normalize_view_box(value) != derived;
            }
        }
        if key == "id" && options.cleanup_ids {
            return source.contains(&format!("#{}", value));
        }
        true
    };

    loop {
        let event = reader.read_event()?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) if e.name().as_ref() == b"metadata" => skip_depth = 1,
            Event::Empty(e) if e.name().as_ref() == b"metadata" => {}
            Event::Start(e) => {
                let is_root = !seen_root;
                let root = if is_root { Some(RootAttrs::read(&e)?) } else { None };
                seen_root = true;
                let cleaned = rebuild_with_values(&e, |key, value| {
                    keep_attr(is_root, root.as_ref(), key, value)
                })?;
                writer.write_event(Event::Start(cleaned))?;
            }
            Event::Empty(e) => {
                let is_root = !seen_root;
                let root = if is_root { Some(RootAttrs::read(&e)?) } else { None };
                seen_root = true;
                let cleaned = rebuild_with_values(&e, |key, value| {
                    keep_attr(is_root, root.as_ref(), key, value)
                })?;
                writer.write_event(Event::Empty(cleaned))?;
            }
            Event::End(e) => writer.write_event(Event::End(e))?,
            Event::Text(t) => writer.write_event(Event::Text(t))?,
            Event::CData(c) => writer.write_event(Event::CData(c))?,
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(SvgError::Empty);
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Attributes of the root element that matter for viewBox handling.
#[derive(Debug, Default)]
struct RootAttrs {
    view_box: Option<String>,
    width: Option<String>,
    height: Option<String>,
}

impl RootAttrs {
    fn read(e: &BytesStart<'_>) -> Result<Self, SvgError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if name != "svg" {
            return Err(SvgError::NotSvg(name));
        }

        let mut attrs = RootAttrs::default();
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.as_ref() {
                b"viewBox" => attrs.view_box = Some(normalize_view_box(&value)),
                b"width" => attrs.width = Some(value),
                b"height" => attrs.height = Some(value),
                _ => {}
            }
        }
        Ok(attrs)
    }

    /// `0 0 W H` from numeric width/height (a `px` suffix is accepted).
    fn derived_view_box(&self) -> Option<String> {
        let number = |v: &String| -> Option<f64> {
            v.trim().trim_end_matches("px").parse::<f64>().ok().filter(|n| *n > 0.0)
        };
        let width = self.width.as_ref().and_then(number)?;
        let height = self.height.as_ref().and_then(number)?;
        Some(format!("0 0 {} {}", width, height))
    }
}

fn normalize_view_box(value: &str) -> String {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map(|n| n.to_string()).unwrap_or_else(|_| s.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Copy an element, keeping only attributes whose key passes `keep`.
fn rebuild<F>(e: &BytesStart<'_>, keep: F) -> Result<BytesStart<'static>, SvgError>
where
    F: Fn(&str) -> bool,
{
    rebuild_with_values(e, |key, _| keep(key))
}

fn rebuild_with_values<F>(e: &BytesStart<'_>, keep: F) -> Result<BytesStart<'static>, SvgError>
where
    F: Fn(&str, &str) -> bool,
{
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if keep(&key, &value) {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}
