//! # note-copy
//!
//! Copy translation notes from a post on one imageboard to the same picture
//! on another, rescaling every note to the destination image, then mark the
//! destination as translated.
//!
//! ## Architecture
//!
//! ```text
//! "d1437880" ──▶ ┌─────────┐     ┌──────────────┐
//!                │ Locator │──▶  │ Post (read)  │──┐ notes
//! "g1525416" ──▶ └─────────┘     │ Post (write) │◀─┤ scaled notes
//!                     ▲          └──────────────┘  │ tag update
//!              ┌──────┴──────┐                ┌────┴─────┐
//!              │SiteRegistry │                │ Transfer │
//!              │ Danbooru    │                └──────────┘
//!              │ Gelbooru    │
//!              └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! note-copy -s d1437880 -d g1525416   # copy one post's notes
//! note-copy -f pairs.txt              # copy every pair in a file
//! note-copy --inspect g1525416        # show a post's size, tags and notes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Notes, dimensions, post metadata |
//! | [`error`] | Error type and taxonomy |
//! | [`auth`] | Credential store, prompting, authenticator |
//! | [`http`] | Blocking HTTP helpers |
//! | [`traits`] | `Post` / `Site` contracts and the site registry |
//! | [`site_danbooru`] | Danbooru JSON backend |
//! | [`site_gelbooru`] | Gelbooru XML/HTML backend |
//! | [`scale`] | Coordinate scaling |
//! | [`tags`] | Tag rewriting |
//! | [`locator`] | Post identifier parsing |
//! | [`transfer`] | Note copy orchestration |
//! | [`batch`] | Pairs file driver |
//! | [`progress`] | Progress reporting |

pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod http;
pub mod locator;
pub mod models;
pub mod progress;
pub mod scale;
pub mod site_danbooru;
pub mod site_gelbooru;
pub mod tags;
pub mod traits;
pub mod transfer;
