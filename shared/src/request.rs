use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::RequestError;

pub const GROUP_MIN_FILES: usize = 2;
pub const GROUP_MAX_FILES: usize = 3;

/// A file the user picked, held by the shell. The core only passes the handle along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

/// What drives the look of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Style {
        style_id: String,
    },
    Prompt {
        text: String,
        negative: Option<String>,
    },
}

impl Direction {
    pub fn prompt(text: impl Into<String>, negative: Option<String>) -> Self {
        Self::Prompt {
            text: text.into(),
            negative: negative.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::Prompt { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoKind {
    /// Bring a still photo to life.
    Animate,
    /// Generate a scene from text, optionally guided by a photo.
    Scene,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationRequest {
    Image {
        files: Vec<SourceFile>,
        direction: Option<Direction>,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    Group {
        files: Vec<SourceFile>,
        direction: Option<Direction>,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    Design {
        /// Field name to user text, e.g. `headline`, `date`, `venue`.
        text_content: BTreeMap<String, String>,
        style_description: String,
        logo: Option<SourceFile>,
    },
    Video {
        kind: VideoKind,
        files: Vec<SourceFile>,
        prompt: String,
    },
}

impl GenerationRequest {
    /// A single-photo request waiting for its style or prompt.
    pub fn staged_image(files: Vec<SourceFile>) -> Self {
        Self::Image {
            files,
            direction: None,
            keep_likeness: true,
            aspect_ratio: AspectRatio::Square,
        }
    }

    pub fn has_prompt(&self) -> bool {
        match self {
            Self::Image { direction, .. } | Self::Group { direction, .. } => {
                direction.as_ref().is_some_and(Direction::is_prompt)
            }
            Self::Design { .. } | Self::Video { .. } => false,
        }
    }

    pub fn source_files(&self) -> &[SourceFile] {
        match self {
            Self::Image { files, .. } | Self::Group { files, .. } | Self::Video { files, .. } => {
                files
            }
            Self::Design { .. } => &[],
        }
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        match self {
            Self::Image { aspect_ratio, .. } | Self::Group { aspect_ratio, .. } => *aspect_ratio,
            Self::Design { .. } => AspectRatio::Portrait,
            Self::Video { .. } => AspectRatio::Landscape,
        }
    }

    /// Same inputs, no look chosen yet.
    #[must_use]
    pub fn without_direction(&self) -> Option<Self> {
        match self {
            Self::Image {
                files,
                keep_likeness,
                aspect_ratio,
                ..
            } => Some(Self::Image {
                files: files.clone(),
                direction: None,
                keep_likeness: *keep_likeness,
                aspect_ratio: *aspect_ratio,
            }),
            Self::Group {
                files,
                keep_likeness,
                aspect_ratio,
                ..
            } => Some(Self::Group {
                files: files.clone(),
                direction: None,
                keep_likeness: *keep_likeness,
                aspect_ratio: *aspect_ratio,
            }),
            Self::Design { .. } | Self::Video { .. } => None,
        }
    }

    /// A request may only start generating once this passes.
    pub fn validate(&self, config: &AppConfig) -> Result<(), RequestError> {
        match self {
            Self::Image {
                files, direction, ..
            } => {
                if files.is_empty() {
                    return Err(RequestError::MissingFiles);
                }
                validate_direction(direction.as_ref(), config)
            }
            Self::Group {
                files, direction, ..
            } => {
                if files.len() < GROUP_MIN_FILES {
                    return Err(RequestError::NotEnoughFiles {
                        min: GROUP_MIN_FILES,
                    });
                }
                if files.len() > GROUP_MAX_FILES {
                    return Err(RequestError::TooManyFiles {
                        max: GROUP_MAX_FILES,
                    });
                }
                validate_direction(direction.as_ref(), config)
            }
            Self::Design {
                text_content,
                style_description,
                ..
            } => {
                let headline = text_content.get("headline").map_or("", |h| h.trim());
                if headline.is_empty() {
                    return Err(RequestError::MissingField("headline".into()));
                }
                if style_description.trim().is_empty() {
                    return Err(RequestError::MissingField("style description".into()));
                }
                Ok(())
            }
            Self::Video {
                kind,
                files,
                prompt,
            } => {
                if *kind == VideoKind::Animate && files.is_empty() {
                    return Err(RequestError::MissingFiles);
                }
                if prompt.trim().is_empty() {
                    return Err(RequestError::MissingDirection);
                }
                Ok(())
            }
        }
    }
}

fn validate_direction(direction: Option<&Direction>, config: &AppConfig) -> Result<(), RequestError> {
    match direction {
        None => Err(RequestError::MissingDirection),
        Some(Direction::Prompt { text, .. }) if text.trim().is_empty() => {
            Err(RequestError::MissingDirection)
        }
        Some(Direction::Prompt { .. }) => Ok(()),
        Some(Direction::Style { style_id }) => config
            .style(style_id)
            .map(|_| ())
            .ok_or_else(|| RequestError::UnknownStyle(style_id.clone())),
    }
}

#[cfg(test)]
pub(crate) fn file(name: &str) -> SourceFile {
    SourceFile {
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
        handle: format!("blob:{name}"),
    }
}
