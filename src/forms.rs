//! Form payloads and their validation.
//!
//! Every field has a `clean_*` function returning `Result<value, FieldError>`;
//! a form's `clean` gathers the failures into [`FormErrors`].

use std::{collections::BTreeMap, fmt, io::Cursor};

use anyhow::Context;
use axum::{body::Bytes, extract::Multipart};
use image::{ImageFormat, ImageReader, Limits};
use serde::Deserialize;
use uuid::Uuid;

use crate::{res, AppError, AppResult};

pub const NON_FIELD: &str = "__all__";
pub const GROUP_TITLE_MAX: usize = 200;
pub const GROUP_SLUG_MAX: usize = 50;

/// Widest or tallest image accepted, in pixels.
pub const IMAGE_MAX_SIDE: u32 = 4096;
/// Decoder allocation cap: one full-size RGBA frame plus headroom.
pub const IMAGE_MAX_ALLOC: u64 = 128 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Required,
    MaxLength { max: usize, actual: usize },
    InvalidImage,
    InvalidChoice,
    InvalidSlug,
    InvalidUsername,
    Reserved,
    Duplicate { model: &'static str, field: &'static str },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use FieldError::*;
        match self {
            Required => write!(f, "This field is required."),
            MaxLength { max, actual } => write!(
                f,
                "Ensure this value has at most {max} characters (it has {actual})."
            ),
            InvalidImage => write!(
                f,
                "Upload a valid image. The file you uploaded was either not an image \
                 or a corrupted image."
            ),
            InvalidChoice => write!(
                f,
                "Select a valid choice. That choice is not one of the available choices."
            ),
            InvalidSlug => write!(
                f,
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens."
            ),
            InvalidUsername => write!(
                f,
                "Enter a valid username. This value may contain only letters, numbers, \
                 and @/./+/-/_ characters."
            ),
            Reserved => write!(f, "This name is reserved."),
            Duplicate { model, field } => write!(f, "{model} with this {field} already exists."),
        }
    }
}

/// Field name to messages, sorted by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, error: impl fmt::Display) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    pub fn add(&mut self, field: &'static str, error: impl fmt::Display) {
        self.0.entry(field).or_default().push(error.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Keeps the value of a field that cleaned, records the error otherwise.
    pub fn take<T>(&mut self, field: &'static str, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.add(field, error);
                None
            }
        }
    }

    /// `<ul class="errorlist">` for one field, empty when it has none.
    pub fn render(&self, field: &str) -> String {
        let messages = self.get(field);
        if messages.is_empty() {
            return String::new();
        }
        let items: String = messages
            .iter()
            .map(|message| format!("<li>{}</li>", res::escape(message)))
            .collect();
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

pub fn clean_required(raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::Required);
    }
    Ok(value.to_owned())
}

pub fn clean_max_length(value: String, max: usize) -> Result<String, FieldError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(FieldError::MaxLength { max, actual });
    }
    Ok(value)
}

pub fn clean_slug(raw: &str) -> Result<String, FieldError> {
    let slug = clean_max_length(clean_required(raw)?, GROUP_SLUG_MAX)?;
    if !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(FieldError::InvalidSlug);
    }
    Ok(slug)
}

/// An empty select option means "no choice"; anything else must be an id.
pub fn clean_choice(raw: Option<&str>) -> Result<Option<Uuid>, FieldError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| FieldError::InvalidChoice),
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Bytes that decoded as an image.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
}

impl ValidImage {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

fn image_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(IMAGE_MAX_SIDE);
    limits.max_image_height = Some(IMAGE_MAX_SIDE);
    limits.max_alloc = Some(IMAGE_MAX_ALLOC);
    limits
}

/// A file input left empty arrives as a part with no name and no bytes.
///
/// Decodes the whole image, so call it off the async workers. Dimensions
/// past [`IMAGE_MAX_SIDE`] are refused from the header, before any pixel
/// buffer is allocated.
pub fn clean_image(upload: Option<Upload>) -> Result<Option<ValidImage>, FieldError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    if upload.filename.is_empty() && upload.bytes.is_empty() {
        return Ok(None);
    }

    let mut reader = ImageReader::new(Cursor::new(&upload.bytes[..]))
        .with_guessed_format()
        .map_err(|_| FieldError::InvalidImage)?;
    let format = reader.format().ok_or(FieldError::InvalidImage)?;
    reader.limits(image_limits());
    reader.decode().map_err(|_| FieldError::InvalidImage)?;

    Ok(Some(ValidImage {
        bytes: upload.bytes,
        format,
    }))
}

#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<Upload>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct CleanedPost {
    pub text: String,
    pub group: Option<Uuid>,
    pub image: Option<ValidImage>,
    pub clear_image: bool,
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "text" => form.text = field.text().await?,
                "group" => form.group = Some(field.text().await?),
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_owned();
                    let bytes = field.bytes().await?;
                    form.image = Some(Upload { filename, bytes });
                }
                "image-clear" => form.clear_image = !field.text().await?.is_empty(),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validation failures come back as [`AppError::Validation`]. The image
    /// is decoded on the blocking pool.
    pub async fn clean(self) -> AppResult<CleanedPost> {
        let upload = self.image;
        let image = tokio::task::spawn_blocking(move || clean_image(upload))
            .await
            .context("image validation task")?;

        let mut errors = FormErrors::new();
        let text = errors.take("text", clean_required(&self.text));
        let group = errors.take("group", clean_choice(self.group.as_deref()));
        let image = errors.take("image", image);

        match (text, group, image) {
            (Some(text), Some(group), Some(image)) if errors.is_empty() => Ok(CleanedPost {
                text,
                group,
                image,
                clear_image: self.clear_image,
            }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        clean_required(&self.text).map_err(|e| FormErrors::single("text", e))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl GroupForm {
    pub fn clean(&self) -> Result<CleanedGroup, FormErrors> {
        let mut errors = FormErrors::new();

        let title = errors.take(
            "title",
            clean_required(&self.title).and_then(|title| clean_max_length(title, GROUP_TITLE_MAX)),
        );
        let slug = errors.take("slug", clean_slug(&self.slug));

        match (title, slug) {
            (Some(title), Some(slug)) => Ok(CleanedGroup {
                title,
                slug,
                description: self.description.trim().to_owned(),
            }),
            _ => Err(errors),
        }
    }
}
