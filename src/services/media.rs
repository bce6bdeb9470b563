//! media.rs
//!
//! Хранилище изображений шоу на локальном диске.
//!
//! Файлы кладутся в `<MEDIA_ROOT>/astronomy_shows/<slug>-<uuid>.<ext>`, а в базе
//! хранится путь относительно корня. Наружу отдаётся URL вида
//! `<MEDIA_URL>/<путь>`; сами файлы раздаёт `ServeDir`.

use image::ImageFormat;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MediaConfig;

const SHOW_IMAGE_DIR: &str = "astronomy_shows";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,
    #[error("media storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image validation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Проверяет, что байты - изображение, и сохраняет его. Возвращает относительный путь.
    pub async fn save_show_image(&self, title: &str, bytes: Vec<u8>) -> Result<String, MediaError> {
        let (format, bytes) = tokio::task::spawn_blocking(move || detect_image(&bytes).map(|f| (f, bytes))).await??;

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let relative = format!("{SHOW_IMAGE_DIR}/{}-{}.{extension}", slugify(title), Uuid::new_v4());

        let full_path = self.root.join(&relative);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, &bytes).await?;

        info!("Stored show image {} ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Удаляет ранее сохранённый файл. Ошибки только логируются.
    pub async fn remove(&self, relative: &str) {
        let path = Path::new(relative);
        if path.components().any(|c| !matches!(c, Component::Normal(_))) {
            warn!("Refusing to remove media path outside root: {}", relative);
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(path)).await {
            warn!("Failed to remove old media file {}: {}", relative, e);
        }
    }
}

/// Определяет формат и проверяет, что изображение декодируется целиком.
pub fn detect_image(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    let format = image::guess_format(bytes).map_err(|_| MediaError::InvalidImage)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(MediaError::InvalidImage);
    }
    image::load_from_memory_with_format(bytes, format).map_err(|_| MediaError::InvalidImage)?;
    Ok(format)
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "show".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(10, 10))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn storage() -> MediaStorage {
        MediaStorage::new(&MediaConfig {
            root: std::env::temp_dir().join(format!("planetarium-media-{}", Uuid::new_v4())),
            base_url: "/media".to_string(),
            max_upload_bytes: 1024 * 1024,
        })
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("The Sun & Its Planets!"), "the-sun-its-planets");
        assert_eq!(slugify("  ***  "), "show");
    }

    #[test]
    fn detect_image_accepts_png() {
        assert_eq!(detect_image(&png_bytes()).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn detect_image_rejects_text() {
        assert!(matches!(detect_image(b"not image"), Err(MediaError::InvalidImage)));
    }

    #[test]
    fn detect_image_rejects_truncated_png() {
        let bytes = png_bytes();
        assert!(detect_image(&bytes[..bytes.len() / 2]).is_err());
    }

    #[tokio::test]
    async fn saved_image_lands_under_root_and_can_be_removed() {
        let storage = storage();

        let relative = storage.save_show_image("Black Holes", png_bytes()).await.unwrap();

        assert!(relative.starts_with("astronomy_shows/black-holes-"));
        assert!(relative.ends_with(".png"));
        assert_eq!(storage.url_for(&relative), format!("/media/{relative}"));
        let full = storage.root().join(&relative);
        assert!(full.exists());

        storage.remove(&relative).await;
        assert!(!full.exists());

        let _ = std::fs::remove_dir_all(storage.root());
    }

    #[tokio::test]
    async fn remove_ignores_paths_escaping_root() {
        let storage = storage();
        // Не должно паниковать и ничего не удаляет
        storage.remove("../etc/passwd").await;
    }
}
