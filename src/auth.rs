//! Per-site credentials: on-disk store, interactive entry, and the
//! [`Authenticator`] that combines the two.
//!
//! Credentials are a flat string map whose shape depends on the site. They
//! live in `<auth_dir>/<site>_auth.json` once the user agrees to store them.
//!
//! # Resolution
//!
//! 1. [`CredentialStore::load`] returns the stored map, if any, verbatim.
//! 2. Otherwise a [`Prompter`] asks for the site's [`PromptField`]s.
//! 3. The site turns the answers into credentials (a cookie site logs in here).
//! 4. The user is asked whether to store the result.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::{NoteCopyError, Result};

/// Flat credential map, e.g. `{"login": "...", "api_key": "..."}`.
pub type Credentials = BTreeMap<String, String>;

/// One value asked of the user on first use of a site.
#[derive(Debug, Clone, Copy)]
pub struct PromptField {
    /// Key the answer is stored under before the site transforms it.
    pub key: &'static str,
    /// Label shown to the user.
    pub label: &'static str,
    /// Read without echo.
    pub secret: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════

/// Directory of `<site>_auth.json` files.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<site_name_lowercased>_auth.json`
    pub fn path_for(&self, site_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_auth.json", site_name.to_lowercase()))
    }

    /// Read stored credentials. A missing file is `Ok(None)`; a file that is
    /// not a JSON string map is a parse error.
    pub fn load(&self, site_name: &str) -> Result<Option<Credentials>> {
        let path = self.path_for(site_name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let creds: Credentials = serde_json::from_str(&content)
            .map_err(|e| NoteCopyError::parse(format!("credentials {}", path.display()), e))?;
        tracing::debug!(site = site_name, path = %path.display(), "loaded stored credentials");
        Ok(Some(creds))
    }

    /// Write credentials, creating the directory if needed.
    pub fn save(&self, site_name: &str, creds: &Credentials) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(site_name);
        let json = serde_json::to_string_pretty(creds)
            .map_err(|e| NoteCopyError::parse("credentials", e))?;
        write_private(&path, json.as_bytes())?;
        Ok(path)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

// ═══════════════════════════════════════════════════════════════════════
// Prompting
// ═══════════════════════════════════════════════════════════════════════

/// Source of interactive answers.
pub trait Prompter {
    /// Ask for a single value.
    fn ask(&self, label: &str, secret: bool) -> Result<String>;

    /// Ask a yes/no question.
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on stderr and reads from stdin; secrets are read without echo.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, label: &str, secret: bool) -> Result<String> {
        if secret {
            return rpassword::prompt_password(format!("{}: ", label))
                .map_err(|e| NoteCopyError::Prompt(e.to_string()));
        }
        let mut stderr = std::io::stderr();
        write!(stderr, "{}: ", label)?;
        stderr.flush()?;
        read_answer(&mut std::io::stdin().lock())
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        ask_yes_no(&mut std::io::stdin().lock(), &mut std::io::stderr(), question)
    }
}

/// Ask `question` until the answer is y, yes, n or no (any case).
pub fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    loop {
        write!(output, "{} (Y/N) ", question.trim())?;
        output.flush()?;
        match read_answer(input)?.to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(NoteCopyError::Prompt("unexpected end of input".to_string()));
    }
    Ok(line.trim().to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════

/// Resolves credentials from the store, falling back to interactive entry.
pub struct Authenticator {
    store: CredentialStore,
    prompter: Box<dyn Prompter>,
}

impl Authenticator {
    pub fn new(store: CredentialStore, prompter: Box<dyn Prompter>) -> Self {
        Self { store, prompter }
    }

    /// Credentials for `site_name`.
    ///
    /// When nothing is stored, asks for `fields`, hands the answers to
    /// `acquire` (which may perform a login) and offers to store its result.
    pub fn credentials<F>(&self, site_name: &str, fields: &[PromptField], acquire: F) -> Result<Credentials>
    where
        F: FnOnce(Credentials) -> Result<Credentials>,
    {
        if let Some(creds) = self.store.load(site_name)? {
            return Ok(creds);
        }

        eprintln!("No stored {} login information.", site_name);
        let mut answers = Credentials::new();
        for field in fields {
            let value = self.prompter.ask(field.label, field.secret)?;
            answers.insert(field.key.to_string(), value);
        }

        let creds = acquire(answers)?;

        if self
            .prompter
            .confirm(&format!("Store {} login information?", site_name))?
        {
            let path = self.store.save(site_name, &creds)?;
            tracing::info!(site = site_name, path = %path.display(), "stored credentials");
        }

        Ok(creds)
    }
}
