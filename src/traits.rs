//! Site and post contracts, and the registry of supported sites.
//!
//! A [`Site`] describes one imageboard (name, short code, domain, cooldown)
//! and opens [`Post`]s on it. A [`Post`] is the per-post backend: it fetches
//! metadata and notes lazily, caches them, and performs the writes needed
//! to copy notes onto it.
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           SiteRegistry           │
//! │  ┌──────────┐    ┌──────────┐    │
//! │  │ Danbooru │    │ Gelbooru │ …  │
//! │  └────┬─────┘    └────┬─────┘    │
//! └───────┼───────────────┼──────────┘
//!         ▼ open(id, mode)▼
//!    Box<dyn Post>   Box<dyn Post>
//!         └──────┬────────┘
//!                ▼
//!       transfer::transfer()
//! ```

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::auth::Authenticator;
use crate::config::{Config, HttpConfig};
use crate::error::Result;
use crate::models::{Dimensions, Mode, Note, PostInfo};

// ═══════════════════════════════════════════════════════════════════════
// Post Trait
// ═══════════════════════════════════════════════════════════════════════

/// A single post on a site, as seen by the transfer.
///
/// Metadata and notes are fetched on first access and cached until
/// [`invalidate_post_info`](Post::invalidate_post_info) or
/// [`set_notes`](Post::set_notes). Credentials are resolved on the first
/// request that needs them.
///
/// Two posts are equal when they are on the same site and have the same id,
/// whatever has been fetched so far.
pub trait Post {
    /// Display name of the site, e.g. `"Danbooru"`.
    fn site_name(&self) -> &str;

    fn post_id(&self) -> u64;

    fn mode(&self) -> Mode;

    /// Delay required after each write to respect the site's rate limit.
    fn cooldown(&self) -> Duration;

    /// Flat metadata of the post (memoized).
    fn post_info(&mut self) -> Result<&PostInfo>;

    /// Full-size image dimensions, from [`post_info`](Post::post_info).
    fn dimensions(&mut self) -> Result<Dimensions>;

    /// Current space-separated tag string, from [`post_info`](Post::post_info).
    fn tag_string(&mut self) -> Result<String>;

    /// Current notes in the order the site returns them (memoized).
    fn notes(&mut self) -> Result<&[Note]>;

    /// Create a new note on this post. Does not sleep; the caller waits
    /// [`cooldown`](Post::cooldown) afterwards.
    fn write_note(&mut self, note: &Note) -> Result<()>;

    /// Replace the untranslated markers with the translated tag.
    fn update_tags(&mut self) -> Result<()>;

    /// Overwrite the cached notes.
    fn set_notes(&mut self, notes: Vec<Note>);

    /// Drop cached metadata so the next access fetches it again.
    fn invalidate_post_info(&mut self);
}

impl PartialEq for dyn Post + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.site_name() == other.site_name() && self.post_id() == other.post_id()
    }
}

impl fmt::Display for dyn Post + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.site_name(), self.post_id())
    }
}

impl fmt::Debug for dyn Post + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Post")
            .field("site", &self.site_name())
            .field("post_id", &self.post_id())
            .field("mode", &self.mode())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Site Trait
// ═══════════════════════════════════════════════════════════════════════

/// A supported imageboard.
pub trait Site {
    /// Display name, also used for the credential file name.
    fn name(&self) -> &str;

    /// One-letter code used in post identifiers, e.g. `"d"` in `d1437880`.
    fn short_code(&self) -> &str;

    /// Full domain accepted in post identifiers.
    fn domain(&self) -> &str;

    fn cooldown(&self) -> Duration;

    /// Open post `post_id`. Nothing is fetched until it is used.
    fn open(&self, post_id: u64, mode: Mode) -> Box<dyn Post>;

    /// Whether `identifier` names this site (short code or domain, any case).
    fn matches(&self, identifier: &str) -> bool {
        identifier.eq_ignore_ascii_case(self.short_code())
            || identifier.eq_ignore_ascii_case(self.domain())
    }
}

/// Shared state every backend of one site needs to talk to it.
pub struct SiteContext {
    pub client: Client,
    pub http: HttpConfig,
    /// Scheme and host, without trailing slash.
    pub base_url: String,
    pub cooldown: Duration,
    pub auth: Rc<Authenticator>,
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of supported sites.
///
/// Use [`SiteRegistry::from_config`] for the built-in sites, then optionally
/// [`register`](SiteRegistry::register) more.
pub struct SiteRegistry {
    sites: Vec<Box<dyn Site>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Registry holding every built-in site enabled in `config`.
    pub fn from_config(config: &Config, auth: Rc<Authenticator>) -> Result<Self> {
        use crate::site_danbooru::{self, DanbooruSite};
        use crate::site_gelbooru::{self, GelbooruSite};

        let client = crate::http::build_client(&config.http)?;
        let mut registry = Self::new();

        let danbooru = &config.sites.danbooru;
        if danbooru.enabled {
            registry.register(Box::new(DanbooruSite::new(SiteContext {
                client: client.clone(),
                http: config.http.clone(),
                base_url: danbooru.base_url_or(site_danbooru::DEFAULT_BASE_URL),
                cooldown: danbooru.cooldown_or(site_danbooru::COOLDOWN),
                auth: Rc::clone(&auth),
            })));
        }

        let gelbooru = &config.sites.gelbooru;
        if gelbooru.enabled {
            registry.register(Box::new(GelbooruSite::new(SiteContext {
                client,
                http: config.http.clone(),
                base_url: gelbooru.base_url_or(site_gelbooru::DEFAULT_BASE_URL),
                cooldown: gelbooru.cooldown_or(site_gelbooru::COOLDOWN),
                auth,
            })));
        }

        Ok(registry)
    }

    pub fn register(&mut self, site: Box<dyn Site>) {
        self.sites.push(site);
    }

    /// Find the site named by a short code or domain.
    pub fn find(&self, identifier: &str) -> Option<&dyn Site> {
        self.sites
            .iter()
            .find(|s| s.matches(identifier))
            .map(|s| s.as_ref())
    }

    /// Longest cooldown of any registered site; used between batch pairs.
    pub fn max_cooldown(&self) -> Duration {
        self.sites
            .iter()
            .map(|s| s.cooldown())
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
