//! Tag rewriting for posts that have just received their notes.

/// Tags meaning a post still needs (or needs a check of) its translation.
pub const TAGS_TO_REMOVE: [&str; 3] = [
    "translation_request",
    "partially_translated",
    "check_translation",
];

/// Tag appended once a post has been translated.
pub const TRANSLATED_TAG: &str = "translated";

/// Remove the untranslated markers and append the translated tag.
///
/// Removal is plain substring removal, so a tag that merely contains one of
/// the markers loses that part of its name. Calling this twice appends the
/// translated tag twice.
pub fn rewrite_tags(tag_string: &str) -> String {
    let mut tags = tag_string.to_string();
    for tag in TAGS_TO_REMOVE {
        tags = tags.replace(tag, "");
    }
    tags.push(' ');
    tags.push_str(TRANSLATED_TAG);
    tags
}
