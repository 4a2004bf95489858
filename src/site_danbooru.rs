//! Danbooru backend.
//!
//! Everything goes through the JSON API. Credentials are a login name and
//! an API key, sent as query parameters on every request.
//!
//! | Operation    | Request                                              |
//! |--------------|------------------------------------------------------|
//! | post info    | `GET /posts/{id}.json`                               |
//! | notes        | `GET /notes.json?group_by=note&search[post_id]={id}` |
//! | write note   | `POST /notes.json` with `note[...]` form fields      |
//! | update tags  | `PUT /posts/{id}.json` with `post[tag_string]`       |

use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::auth::{Credentials, PromptField};
use crate::error::{NoteCopyError, Result};
use crate::http;
use crate::models::{parse_pixels, Dimensions, Mode, Note, PostInfo};
use crate::tags::rewrite_tags;
use crate::traits::{Post, Site, SiteContext};

pub const SITE_NAME: &str = "Danbooru";
pub const SHORT_CODE: &str = "d";
pub const DOMAIN: &str = "danbooru.donmai.us";
pub const DEFAULT_BASE_URL: &str = "https://danbooru.donmai.us";
pub const COOLDOWN: Duration = Duration::from_secs(1);

/// Largest page the notes endpoint serves.
const NOTES_PAGE_LIMIT: &str = "1000";

const PROMPT_FIELDS: [PromptField; 2] = [
    PromptField {
        key: "login",
        label: "Username",
        secret: false,
    },
    PromptField {
        key: "api_key",
        label: "API key",
        secret: true,
    },
];

pub struct DanbooruSite {
    ctx: Rc<SiteContext>,
}

impl DanbooruSite {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx: Rc::new(ctx) }
    }
}

impl Site for DanbooruSite {
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
        Box::new(DanbooruPost::new(post_id, mode, Rc::clone(&self.ctx)))
    }
}

/// A Danbooru post. Read and write mode behave the same.
pub struct DanbooruPost {
    post_id: u64,
    mode: Mode,
    ctx: Rc<SiteContext>,
    auth: Option<Credentials>,
    post_info: Option<PostInfo>,
    notes: Option<Vec<Note>>,
}

impl DanbooruPost {
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

    fn post_url(&self) -> String {
        format!("{}/posts/{}.json", self.ctx.base_url, self.post_id)
    }

    fn notes_url(&self) -> String {
        format!("{}/notes.json", self.ctx.base_url)
    }

    fn context(&self) -> String {
        format!("{} post {}", SITE_NAME, self.post_id)
    }

    /// Stored credentials are used verbatim as query parameters.
    fn auth_params(&mut self) -> Result<Vec<(String, String)>> {
        let creds = match self.auth.take() {
            Some(creds) => creds,
            None => self.ctx.auth.credentials(SITE_NAME, &PROMPT_FIELDS, Ok)?,
        };
        let params = creds
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.auth = Some(creds);
        Ok(params)
    }

    fn fetch_post_info(&mut self) -> Result<PostInfo> {
        let params = self.auth_params()?;
        let url = self.post_url();
        let response = http::send(self.ctx.client.get(&url).query(&params), "GET", &url)?;
        let json = http::read_json(response, "GET", &url)?;
        parse_post_info(&json, &self.context())
    }

    fn fetch_notes(&mut self) -> Result<Vec<Note>> {
        let params = self.auth_params()?;
        let url = self.notes_url();
        let post_id = self.post_id.to_string();
        let search = [
            ("group_by", "note"),
            ("search[post_id]", post_id.as_str()),
            ("limit", NOTES_PAGE_LIMIT),
        ];
        let request = self.ctx.client.get(&url).query(&search).query(&params);
        let json = http::read_json(http::send(request, "GET", &url)?, "GET", &url)?;
        parse_notes(&json, &self.context())
    }
}

impl Post for DanbooruPost {
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
        self.post_info()?.dimensions("image_height", "image_width")
    }

    fn tag_string(&mut self) -> Result<String> {
        Ok(self.post_info()?.require("tag_string")?.to_string())
    }

    fn notes(&mut self) -> Result<&[Note]> {
        let notes = match self.notes.take() {
            Some(notes) => notes,
            None => self.fetch_notes()?,
        };
        Ok(self.notes.insert(notes))
    }

    fn write_note(&mut self, note: &Note) -> Result<()> {
        let params = self.auth_params()?;
        let url = self.notes_url();
        let form = [
            ("note[post_id]", self.post_id.to_string()),
            ("note[x]", note.x.to_string()),
            ("note[y]", note.y.to_string()),
            ("note[width]", note.width.to_string()),
            ("note[height]", note.height.to_string()),
            ("note[body]", note.body.clone()),
        ];
        let request = self.ctx.client.post(&url).query(&params).form(&form);
        http::send(request, "POST", &url)?;
        tracing::debug!(post = self.post_id, note = %note, "wrote note");
        Ok(())
    }

    fn update_tags(&mut self) -> Result<()> {
        let tags = rewrite_tags(&self.tag_string()?);
        let params = self.auth_params()?;
        let url = self.post_url();
        let request = self
            .ctx
            .client
            .put(&url)
            .query(&params)
            .form(&[("post[tag_string]", tags.as_str())]);
        http::send(request, "PUT", &url)?;
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
// Response parsing
// ═══════════════════════════════════════════════════════════════════════

/// Flatten a post object into [`PostInfo`]. Scalars are kept as text;
/// nulls, arrays and nested objects are dropped.
pub fn parse_post_info(json: &Value, context: &str) -> Result<PostInfo> {
    let object = json
        .as_object()
        .ok_or_else(|| NoteCopyError::parse(context, "expected a JSON object"))?;

    let mut info = PostInfo::new(context);
    for (key, value) in object {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        info.insert(key.as_str(), text);
    }
    Ok(info)
}

/// Active notes from a `notes.json` response, in response order.
pub fn parse_notes(json: &Value, context: &str) -> Result<Vec<Note>> {
    let entries = json
        .as_array()
        .ok_or_else(|| NoteCopyError::parse(format!("{} notes", context), "expected a JSON array"))?;

    let mut notes = Vec::new();
    for entry in entries {
        if !entry.get("is_active").and_then(Value::as_bool).unwrap_or(true) {
            continue;
        }
        notes.push(Note::new(
            json_pixels(entry, "x", context)?,
            json_pixels(entry, "y", context)?,
            json_pixels(entry, "width", context)?,
            json_pixels(entry, "height", context)?,
            entry
                .get("body")
                .and_then(Value::as_str)
                .ok_or_else(|| NoteCopyError::missing_field(format!("{} note", context), "body"))?,
        ));
    }
    Ok(notes)
}

fn json_pixels(entry: &Value, key: &str, context: &str) -> Result<u32> {
    let value = entry
        .get(key)
        .ok_or_else(|| NoteCopyError::missing_field(format!("{} note", context), key))?;
    let parsed = match value {
        Value::Number(n) => parse_pixels(&n.to_string()),
        Value::String(s) => parse_pixels(s),
        _ => None,
    };
    parsed.ok_or_else(|| {
        NoteCopyError::parse(
            format!("{} note field '{}'", context, key),
            format!("{} is not a pixel count", value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_info_flattens_scalars() {
        let json = json!({
            "id": 1437880,
            "image_height": 1192,
            "image_width": 1064,
            "tag_string": "1girl translation_request",
            "is_banned": false,
            "parent_id": null,
            "media_asset": { "id": 1 },
            "pools": [1, 2]
        });
        let info = parse_post_info(&json, "Danbooru post 1437880").unwrap();

        assert_eq!(info.get("id"), Some("1437880"));
        assert_eq!(info.get("is_banned"), Some("false"));
        assert_eq!(info.get("tag_string"), Some("1girl translation_request"));
        assert!(info.get("parent_id").is_none());
        assert!(info.get("media_asset").is_none());
        assert!(info.get("pools").is_none());
        assert_eq!(
            info.dimensions("image_height", "image_width").unwrap(),
            Dimensions::new(1192, 1064).unwrap()
        );
    }

    #[test]
    fn post_info_requires_an_object() {
        let err = parse_post_info(&json!([1, 2]), "Danbooru post 1").unwrap_err();
        assert!(matches!(err, NoteCopyError::Parse { .. }));
    }

    #[test]
    fn notes_keep_active_only_in_order() {
        let json = json!([
            { "x": 10, "y": 20, "width": 30, "height": 40, "body": "first", "is_active": true },
            { "x": 1, "y": 1, "width": 1, "height": 1, "body": "deleted", "is_active": false },
            { "x": 5, "y": 6, "width": 7, "height": 8, "body": "second", "is_active": true }
        ]);
        let notes = parse_notes(&json, "Danbooru post 1").unwrap();
        assert_eq!(
            notes,
            vec![
                Note::new(10, 20, 30, 40, "first"),
                Note::new(5, 6, 7, 8, "second"),
            ]
        );
    }

    #[test]
    fn notes_empty_array() {
        assert!(parse_notes(&json!([]), "Danbooru post 1").unwrap().is_empty());
    }

    #[test]
    fn notes_missing_body_is_an_error() {
        let json = json!([{ "x": 1, "y": 1, "width": 1, "height": 1, "is_active": true }]);
        let err = parse_notes(&json, "Danbooru post 1").unwrap_err();
        assert_eq!(err.to_string(), "missing field 'body' in Danbooru post 1 note");
    }

    #[test]
    fn notes_reject_non_array() {
        let json = json!({ "success": false, "message": "That record was not found." });
        assert!(parse_notes(&json, "Danbooru post 1").is_err());
    }

    #[test]
    fn note_pixels_accept_decimal_numbers() {
        let json = json!([{ "x": 10.7, "y": "20", "width": 30, "height": 40, "body": "b" }]);
        let notes = parse_notes(&json, "Danbooru post 1").unwrap();
        assert_eq!(notes[0], Note::new(10, 20, 30, 40, "b"));
    }
}
