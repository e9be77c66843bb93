//! Typed per-endpoint inputs
//!
//! Each `parse` runs every field rule, then the cross-field rules on the
//! fields that passed, and either yields a fully typed value or the
//! complete set of field errors.

use super::{Field, InputValue, Locale, RawInput, UploadedFile, ValidationErrors, Validator};
use crate::config::{MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH, MIN_BOOK_TOTAL};
use crate::database::{Book, BookChanges, NewBook, NewNote, NoteChanges};
use serde_json::Value;

/// `deleted_at` may only be sent as null; returns whether a restore was asked.
fn restore_flag(v: &mut Validator<'_>, input: &RawInput) -> bool {
    match input.get("deleted_at") {
        None => false,
        Some(InputValue::Value(Value::Null)) => true,
        Some(InputValue::Value(Value::String(s))) if s.is_empty() => true,
        Some(_) => {
            let message = v.locale().restore_only();
            v.fail("deleted_at", message);
            false
        }
    }
}

/// Field that may be omitted but not nulled when sent.
fn sometimes(input: &RawInput, field: &str) -> bool {
    input.contains(field)
}

#[derive(Debug, Clone)]
pub struct CreateBook {
    /// `cover` is left empty until the upload is stored
    pub book: NewBook,
    pub cover: Option<UploadedFile>,
}

impl CreateBook {
    pub fn parse(input: &RawInput, locale: Locale) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);

        let title = v.string("title", true, MAX_TITLE_LENGTH);
        let total = v.integer_min("total", true, MIN_BOOK_TOTAL);
        let read = v.integer_min("read", false, 0);
        let started_at = v.datetime("started_at");
        let hidden = v.boolean("hidden");
        let cover = v.image("cover");

        if let (Field::Value(total), Field::Value(read)) = (&total, &read) {
            if read > total {
                let message = locale.read_exceeds_total(*total);
                v.fail("read", message);
            }
        }

        v.finish()?;

        Ok(Self {
            book: NewBook {
                title: title.value().unwrap_or_default(),
                total: total.value().unwrap_or(MIN_BOOK_TOTAL),
                read: read.value().unwrap_or(0),
                started_at: started_at.value(),
                cover: String::new(),
                hidden: hidden.value().unwrap_or(false),
            },
            cover: cover.value(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBook {
    pub changes: BookChanges,
    /// `Some(None)` clears the cover
    pub cover: Option<Option<UploadedFile>>,
}

impl UpdateBook {
    /// `read <= total` is checked on the values the row will hold after the update.
    pub fn parse(input: &RawInput, locale: Locale, current: &Book) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);

        let title = v.string("title", sometimes(input, "title"), MAX_TITLE_LENGTH);
        let total = v.integer_min("total", sometimes(input, "total"), MIN_BOOK_TOTAL);
        let read = match v.integer_min("read", false, 0) {
            Field::Null => Field::Value(0),
            other => other,
        };
        let started_at = v.datetime("started_at");
        let hidden = v.boolean("hidden");
        let cover = v.image("cover");
        let restore = restore_flag(&mut v, input);

        if !v.has_error("read") && !v.has_error("total") {
            match (&total, &read) {
                (_, Field::Value(read)) => {
                    let effective_total = total.clone().value().unwrap_or(current.total);
                    if *read > effective_total {
                        let message = locale.read_exceeds_total(effective_total);
                        v.fail("read", message);
                    }
                }
                (Field::Value(total), _) if *total < current.read => {
                    let message = locale.total_below_read(current.read);
                    v.fail("total", message);
                }
                _ => {}
            }
        }

        v.finish()?;

        Ok(Self {
            changes: BookChanges {
                title: title.value(),
                total: total.value(),
                read: read.value(),
                started_at: started_at.into_change(),
                cover: None,
                hidden: hidden.value(),
                restore,
            },
            cover: cover.into_change(),
        })
    }
}

/// Note and post body rules. `book` is the owning book for notes and
/// `None` for posts, which have no page.
fn note_fields(
    v: &mut Validator<'_>,
    input: &RawInput,
    book: Option<&Book>,
    creating: bool,
) -> NoteChanges {
    let title = v.string("title", false, MAX_TITLE_LENGTH);
    let desc = v.string("desc", false, MAX_TITLE_LENGTH);
    let content = v.string(
        "content",
        creating || sometimes(input, "content"),
        MAX_CONTENT_LENGTH,
    );
    let html_content = v.string(
        "html_content",
        creating || sometimes(input, "html_content"),
        MAX_CONTENT_LENGTH,
    );
    let hidden = v.boolean("hidden");
    let tags = v.string_list("tags", MAX_TITLE_LENGTH);

    let page = match book {
        Some(book) => {
            let page = v.integer_min("page", creating || sometimes(input, "page"), 1);
            if let Field::Value(page) = page {
                if page > book.total {
                    let message = v.locale().page_exceeds_total(book.total);
                    v.fail("page", message);
                }
            }
            page.value()
        }
        None => None,
    };

    NoteChanges {
        title: title.into_change(),
        desc: desc.into_change(),
        content: content.value(),
        html_content: html_content.value(),
        page,
        hidden: hidden.value(),
        restore: false,
        tags: match tags {
            Field::Missing => None,
            Field::Null => Some(Vec::new()),
            Field::Value(names) => Some(names),
        },
    }
}

#[derive(Debug, Clone)]
pub struct CreateNote {
    pub note: NewNote,
}

impl CreateNote {
    pub fn parse(
        input: &RawInput,
        locale: Locale,
        book: Option<&Book>,
    ) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);
        let fields = note_fields(&mut v, input, book, true);
        v.finish()?;

        Ok(Self {
            note: NewNote {
                title: fields.title.flatten(),
                desc: fields.desc.flatten(),
                content: fields.content.unwrap_or_default(),
                html_content: fields.html_content.unwrap_or_default(),
                page: fields.page.unwrap_or(0),
                hidden: fields.hidden.unwrap_or(false),
                tags: fields.tags.unwrap_or_default(),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateNote {
    pub changes: NoteChanges,
}

impl UpdateNote {
    pub fn parse(
        input: &RawInput,
        locale: Locale,
        book: Option<&Book>,
    ) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);
        let mut changes = note_fields(&mut v, input, book, false);
        changes.restore = restore_flag(&mut v, input);
        v.finish()?;

        Ok(Self { changes })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateTag {
    pub name: String,
}

impl UpdateTag {
    pub fn parse(input: &RawInput, locale: Locale) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);
        let name = v.string("name", true, MAX_TITLE_LENGTH);
        v.finish()?;

        Ok(Self {
            name: name.value().unwrap_or_default().trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl Login {
    pub fn parse(input: &RawInput, locale: Locale) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new(input, locale);
        let username = v.string("username", true, MAX_TITLE_LENGTH);
        let password = v.string("password", true, MAX_TITLE_LENGTH);
        v.finish()?;

        Ok(Self {
            username: username.value().unwrap_or_default(),
            password: password.value().unwrap_or_default(),
        })
    }
}
