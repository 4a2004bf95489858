//! Gelbooru backend.
//!
//! Gelbooru's XML API is read-only. Writes go through the site's own forms,
//! authenticated by the `user_id` and `pass_hash` cookies a web login sets,
//! and the edit form needs hidden fields that only the HTML post page
//! carries. A post therefore fetches its metadata one of two ways:
//!
//! - [`Mode::Read`]: `index.php?page=dapi&s=post&q=index&id={id}` (XML).
//! - [`Mode::Write`]: `index.php?page=post&s=view&id={id}` (HTML), scraped
//!   for the edit form fields, plus the `PHPSESSID` session cookie.
//!
//! Both produce the same keys for `tags`, `height` and `width`; the HTML
//! page's `lupdated` input is stored as `change`, like the XML attribute.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::events::{BytesStart, Event};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::COOKIE;
use scraper::{ElementRef, Html, Selector};

use crate::auth::{Credentials, PromptField};
use crate::error::{NoteCopyError, Result};
use crate::http;
use crate::models::{parse_pixels, Dimensions, Mode, Note, PostInfo};
use crate::tags::rewrite_tags;
use crate::traits::{Post, Site, SiteContext};

pub const SITE_NAME: &str = "Gelbooru";
pub const SHORT_CODE: &str = "g";
pub const DOMAIN: &str = "gelbooru.com";
pub const DEFAULT_BASE_URL: &str = "https://gelbooru.com";
pub const COOLDOWN: Duration = Duration::from_secs(15);

const USER_ID: &str = "user_id";
const PASS_HASH: &str = "pass_hash";
const API_KEY: &str = "api_key";
const SESSION_COOKIE: &str = "PHPSESSID";
const CSRF_FIELD: &str = "csrf-token";

/// Markup Gelbooru uses for line breaks inside note bodies.
const LINE_BREAK: &str = "<br />";

/// Characters left as-is in an encoded note body: alphanumerics, `_.-~` and `/`.
const BODY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

const PROMPT_FIELDS: [PromptField; 3] = [
    PromptField {
        key: "user",
        label: "Username",
        secret: false,
    },
    PromptField {
        key: "pass",
        label: "Password",
        secret: true,
    },
    PromptField {
        key: API_KEY,
        label: "API key",
        secret: true,
    },
];

pub struct GelbooruSite {
    ctx: Rc<SiteContext>,
}

impl GelbooruSite {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx: Rc::new(ctx) }
    }
}

impl Site for GelbooruSite {
    fn name(&self) -> &str {
        SITE_NAME
    }

    fn short_code(&self) -> &str {
        SHORT_CODE
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn cooldown(&self) -> Duration {
        self.ctx.cooldown
    }

    fn open(&self, post_id: u64, mode: Mode) -> Box<dyn Post> {
        Box::new(GelbooruPost::new(post_id, mode, Rc::clone(&self.ctx)))
    }
}

pub struct GelbooruPost {
    post_id: u64,
    mode: Mode,
    ctx: Rc<SiteContext>,
    auth: Option<Credentials>,
    post_info: Option<PostInfo>,
    notes: Option<Vec<Note>>,
}

impl GelbooruPost {
    pub fn new(post_id: u64, mode: Mode, ctx: Rc<SiteContext>) -> Self {
        Self {
            post_id,
            mode,
            ctx,
            auth: None,
            post_info: None,
            notes: None,
        }
    }

    fn context(&self) -> String {
        format!("{} post {}", SITE_NAME, self.post_id)
    }

    fn auth(&mut self) -> Result<&Credentials> {
        let creds = match self.auth.take() {
            Some(creds) => creds,
            None => {
                let ctx = Rc::clone(&self.ctx);
                ctx.auth
                    .credentials(SITE_NAME, &PROMPT_FIELDS, |answers| login(&ctx, &answers))?
            }
        };
        Ok(self.auth.insert(creds))
    }

    /// `api_key` and `user_id` query parameters for the XML API, when known.
    fn api_params(&mut self) -> Result<Vec<(&'static str, String)>> {
        let creds = self.auth()?;
        Ok([API_KEY, USER_ID]
            .into_iter()
            .filter_map(|key| creds.get(key).map(|v| (key, v.clone())))
            .collect())
    }

    /// `user_id` and `pass_hash` cookies, plus any `extra` ones.
    fn session_cookies(&mut self, extra: &[(&str, &str)]) -> Result<String> {
        let creds = self.auth()?;
        let context = format!("{} credentials", SITE_NAME);
        let user_id = creds
            .get(USER_ID)
            .ok_or_else(|| NoteCopyError::missing_field(context.clone(), USER_ID))?;
        let pass_hash = creds
            .get(PASS_HASH)
            .ok_or_else(|| NoteCopyError::missing_field(context, PASS_HASH))?;

        let mut cookies = vec![(USER_ID, user_id.as_str()), (PASS_HASH, pass_hash.as_str())];
        cookies.extend_from_slice(extra);
        Ok(http::cookie_header(cookies))
    }

    fn fetch_post_info(&mut self) -> Result<PostInfo> {
        match self.mode {
            Mode::Read => {
                let params = self.api_params()?;
                let url = format!(
                    "{}/index.php?page=dapi&s=post&q=index&id={}",
                    self.ctx.base_url, self.post_id
                );
                let response =
                    http::send(self.ctx.client.get(&url).query(&params), "GET", &url)?;
                let xml = http::read_text(response, "GET", &url)?;
                parse_api_post(&xml, &self.context())
            }
            Mode::Write => {
                let cookies = self.session_cookies(&[])?;
                let url = format!(
                    "{}/index.php?page=post&s=view&id={}",
                    self.ctx.base_url, self.post_id
                );
                let request = self.ctx.client.get(&url).header(COOKIE, cookies);
                let response = http::send(request, "GET", &url)?;
                let session = response
                    .cookies()
                    .find(|c| c.name() == SESSION_COOKIE)
                    .map(|c| c.value().to_string());
                let html = http::read_text(response, "GET", &url)?;

                let mut info = parse_edit_page(&html, &self.context())?;
                if let Some(session) = session {
                    info.insert(SESSION_COOKIE, session);
                }
                Ok(info)
            }
        }
    }

    fn fetch_notes(&mut self) -> Result<Vec<Note>> {
        let params = self.api_params()?;
        let url = format!(
            "{}/index.php?page=dapi&s=note&q=index&post_id={}",
            self.ctx.base_url, self.post_id
        );
        let response = http::send(self.ctx.client.get(&url).query(&params), "GET", &url)?;
        let xml = http::read_text(response, "GET", &url)?;
        parse_notes(&xml, &self.context())
    }
}

impl Post for GelbooruPost {
    fn site_name(&self) -> &str {
        SITE_NAME
    }

    fn post_id(&self) -> u64 {
        self.post_id
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn cooldown(&self) -> Duration {
        self.ctx.cooldown
    }

    fn post_info(&mut self) -> Result<&PostInfo> {
        let info = match self.post_info.take() {
            Some(info) => info,
            None => self.fetch_post_info()?,
        };
        Ok(self.post_info.insert(info))
    }

    fn dimensions(&mut self) -> Result<Dimensions> {
        self.post_info()?.dimensions("height", "width")
    }

    fn tag_string(&mut self) -> Result<String> {
        Ok(self.post_info()?.require("tags")?.to_string())
    }

    fn notes(&mut self) -> Result<&[Note]> {
        let notes = match self.notes.take() {
            Some(notes) => notes,
            None => self.fetch_notes()?,
        };
        Ok(self.notes.insert(notes))
    }

    fn write_note(&mut self, note: &Note) -> Result<()> {
        let cookies = self.session_cookies(&[])?;
        let url = format!("{}/public/note_save.php?id=-2", self.ctx.base_url);
        let form = [
            ("note[html_id]", "x".to_string()),
            ("note[x]", note.x.to_string()),
            ("note[y]", note.y.to_string()),
            ("note[width]", note.width.to_string()),
            ("note[height]", note.height.to_string()),
            ("note[body]", encode_body(&note.body)),
            ("note[post_id]", self.post_id.to_string()),
        ];
        let request = self.ctx.client.post(&url).header(COOKIE, cookies).form(&form);
        http::send(request, "POST", &url)?;
        tracing::debug!(post = self.post_id, note = %note, "wrote note");
        Ok(())
    }

    fn update_tags(&mut self) -> Result<()> {
        let info = self.post_info()?.clone();
        let tags = rewrite_tags(info.require("tags")?);

        let mut form = vec![
            ("rating", info.require("rating")?.to_string()),
            ("title", info.get("title").unwrap_or_default().to_string()),
            ("source", info.get("source").unwrap_or_default().to_string()),
            ("tags", tags),
            ("id", self.post_id.to_string()),
            ("pconf", "1".to_string()),
            ("lupdated", info.require("change")?.to_string()),
            ("submit", "Save changes".to_string()),
        ];
        for key in [CSRF_FIELD, "uname", "userid"] {
            if let Some(value) = info.get(key) {
                form.push((key, value.to_string()));
            }
        }

        let session: Vec<(&str, &str)> = info
            .get(SESSION_COOKIE)
            .map(|s| vec![(SESSION_COOKIE, s)])
            .unwrap_or_default();
        let cookies = self.session_cookies(&session)?;

        let url = format!("{}/public/edit_post.php", self.ctx.base_url);
        let request = self.ctx.client.post(&url).header(COOKIE, cookies).form(&form);
        http::send(request, "POST", &url)?;
        Ok(())
    }

    fn set_notes(&mut self, notes: Vec<Note>) {
        self.notes = Some(notes);
    }

    fn invalidate_post_info(&mut self) {
        self.post_info = None;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Login
// ═══════════════════════════════════════════════════════════════════════

/// Log in through the web form and keep the session cookies it sets.
///
/// `answers` holds `user`, `pass` and optionally `api_key`; the result holds
/// `user_id`, `pass_hash` and `api_key` when one was given.
fn login(ctx: &SiteContext, answers: &Credentials) -> Result<Credentials> {
    let context = format!("{} login", SITE_NAME);
    let user = answers
        .get("user")
        .ok_or_else(|| NoteCopyError::missing_field(context.clone(), "user"))?;
    let pass = answers
        .get("pass")
        .ok_or_else(|| NoteCopyError::missing_field(context.clone(), "pass"))?;

    let jar = Arc::new(Jar::default());
    let client = http::cookie_client(&ctx.http, Arc::clone(&jar))?;
    let url = format!("{}/index.php?page=account&s=login&code=00", ctx.base_url);
    let form = [
        ("user", user.as_str()),
        ("pass", pass.as_str()),
        ("submit", "Log in"),
    ];
    http::send(client.post(&url).form(&form), "POST", &url)?;

    let base = reqwest::Url::parse(&ctx.base_url)
        .map_err(|e| NoteCopyError::InvalidConfig(format!("bad base URL {}: {}", ctx.base_url, e)))?;
    let cookies = jar
        .cookies(&base)
        .and_then(|header| header.to_str().ok().map(http::parse_cookie_header))
        .unwrap_or_default();

    let cookie_context = format!("{} login cookies (wrong username or password?)", SITE_NAME);
    let mut creds = Credentials::new();
    for key in [USER_ID, PASS_HASH] {
        let value = cookies
            .get(key)
            .ok_or_else(|| NoteCopyError::missing_field(cookie_context.clone(), key))?;
        creds.insert(key.to_string(), value.clone());
    }
    if let Some(api_key) = answers.get(API_KEY).filter(|k| !k.is_empty()) {
        creds.insert(API_KEY.to_string(), api_key.clone());
    }
    tracing::info!(site = SITE_NAME, user = %user, "logged in");
    Ok(creds)
}

/// Percent-encode a note body the way the note form expects it.
pub fn encode_body(body: &str) -> String {
    utf8_percent_encode(body, BODY_ENCODE_SET).to_string()
}

// ═══════════════════════════════════════════════════════════════════════
// XML API parsing
// ═══════════════════════════════════════════════════════════════════════

/// Metadata of the first `<post>` in an API response.
pub fn parse_api_post(xml: &str, context: &str) -> Result<PostInfo> {
    let record = xml_records(xml, "post", context)?
        .into_iter()
        .next()
        .ok_or_else(|| NoteCopyError::parse(context, "no <post> element in response"))?;

    let mut info = PostInfo::new(context);
    for (key, value) in record {
        info.insert(key, value);
    }
    Ok(info)
}

/// Notes from an API response, with `<br />` turned into newlines.
pub fn parse_notes(xml: &str, context: &str) -> Result<Vec<Note>> {
    let note_context = format!("{} note", context);
    xml_records(xml, "note", context)?
        .into_iter()
        .map(|record| {
            let pixels = |key: &str| -> Result<u32> {
                let raw = record
                    .get(key)
                    .ok_or_else(|| NoteCopyError::missing_field(note_context.clone(), key))?;
                parse_pixels(raw).ok_or_else(|| {
                    NoteCopyError::parse(
                        format!("{} field '{}'", note_context, key),
                        format!("'{}' is not a pixel count", raw),
                    )
                })
            };
            let body = record
                .get("body")
                .ok_or_else(|| NoteCopyError::missing_field(note_context.clone(), "body"))?;
            Ok(Note::new(
                pixels("x")?,
                pixels("y")?,
                pixels("width")?,
                pixels("height")?,
                body.replace(LINE_BREAK, "\n"),
            ))
        })
        .collect()
}

/// Every `<tag>` element as a flat map of its attributes and the text of
/// its direct children. Newer API versions use attributes, older ones
/// child elements; both end up in the same map.
fn xml_records(xml: &str, tag: &str, context: &str) -> Result<Vec<BTreeMap<String, String>>> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut current: Option<BTreeMap<String, String>> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == tag {
                    current = Some(attributes(&e, context)?);
                } else if let Some(record) = current.as_mut() {
                    record.entry(name.clone()).or_default();
                    field = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if name == tag {
                    records.push(attributes(&e, context)?);
                } else if let Some(record) = current.as_mut() {
                    record.entry(name).or_default();
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(record), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = t.unescape().map_err(|e| NoteCopyError::parse(context, e))?;
                    record.insert(name.clone(), text.into_owned());
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(record), Some(name)) = (current.as_mut(), field.as_ref()) {
                    record.insert(name.clone(), String::from_utf8_lossy(&c).into_owned());
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == tag.as_bytes() {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(NoteCopyError::parse(
                    context,
                    format!("XML error at byte {}: {}", reader.buffer_position(), e),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attributes(element: &BytesStart<'_>, context: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| NoteCopyError::parse(context, e))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| NoteCopyError::parse(context, e))?;
        map.insert(key, value.into_owned());
    }
    Ok(map)
}

// ═══════════════════════════════════════════════════════════════════════
// HTML post page parsing
// ═══════════════════════════════════════════════════════════════════════

/// Edit form fields and image size from a post's HTML page.
///
/// `tags`, `rating`, `change` (from `lupdated`), `csrf-token`, `height` and
/// `width` are required; `title`, `source`, `uname` and `userid` are kept
/// when the form has them.
pub fn parse_edit_page(html: &str, context: &str) -> Result<PostInfo> {
    let document = Html::parse_document(html);
    let mut info = PostInfo::new(context);

    for name in ["title", "source", "uname", "userid"] {
        if let Some(value) = input_value(&document, name)? {
            info.insert(name, value);
        }
    }

    let token = input_value(&document, CSRF_FIELD)?
        .ok_or_else(|| NoteCopyError::missing_field(context, CSRF_FIELD))?;
    info.insert(CSRF_FIELD, token);

    let change = input_value(&document, "lupdated")?
        .ok_or_else(|| NoteCopyError::missing_field(context, "lupdated"))?;
    info.insert("change", change);

    let tags = select_first(&document, "textarea[name=\"tags\"]")?
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| NoteCopyError::missing_field(context, "tags"))?;
    info.insert("tags", tags.trim());

    let rating = select_first(&document, "input[name=\"rating\"][checked]")?
        .and_then(|el| el.value().attr("value"))
        .ok_or_else(|| NoteCopyError::missing_field(context, "rating"))?;
    info.insert("rating", rating);

    let image = select_first(&document, "img#image")?
        .ok_or_else(|| NoteCopyError::missing_field(context, "image"))?;
    for side in ["height", "width"] {
        let value = image
            .value()
            .attr(side)
            .ok_or_else(|| NoteCopyError::missing_field(format!("{} image", context), side))?;
        info.insert(side, value);
    }

    Ok(info)
}

/// Value of the first `<input name="...">`; an input without a value is empty.
fn input_value(document: &Html, name: &str) -> Result<Option<String>> {
    let css = format!("input[name=\"{}\"]", name);
    Ok(select_first(document, &css)?
        .map(|el| el.value().attr("value").unwrap_or_default().to_string()))
}

fn select_first<'a>(document: &'a Html, css: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = Selector::parse(css)
        .map_err(|e| NoteCopyError::parse(format!("selector {}", css), e.to_string()))?;
    let first = document.select(&selector).next();
    Ok(first)
}
