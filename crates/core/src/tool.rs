//! Creation tools and their recognized options.
//!
//! Each tool has a typed options struct. Options are validated locally
//! (via [`validator`]) before a request ever leaves the client, and
//! serialize to the camelCase object the create endpoint expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// The three job-backed creation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    BackgroundRemover,
    MemeGenerator,
    ThumbnailGenerator,
}

impl Tool {
    pub const ALL: [Tool; 3] = [
        Tool::BackgroundRemover,
        Tool::MemeGenerator,
        Tool::ThumbnailGenerator,
    ];

    /// URL path segment for this tool's job endpoints.
    pub fn slug(self) -> &'static str {
        match self {
            Tool::BackgroundRemover => "background-remover",
            Tool::MemeGenerator => "meme-generator",
            Tool::ThumbnailGenerator => "thumbnail-generator",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ---------------------------------------------------------------------------
// Option enums
// ---------------------------------------------------------------------------

/// Declares a lowercase string-backed option enum with `as_str`,
/// `Display`, and a `FromStr` that reports the valid choices.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const VALID: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $( $text => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Unknown {} '{other}'. Valid values: {}",
                        $label,
                        Self::VALID.join(", ")
                    ))),
                }
            }
        }
    };
}

choice_enum! {
    /// Output resolution for background removal.
    OutputSize, "output size" {
        Preview => "preview",
        #[default]
        Full => "full",
        Hd => "hd",
    }
}

choice_enum! {
    /// Encoded image format of the cut-out.
    OutputFormat, "output format" {
        #[default]
        Png => "png",
        Webp => "webp",
        Jpg => "jpg",
    }
}

choice_enum! {
    /// Hint telling the remover what the foreground is.
    SubjectType, "subject type" {
        #[default]
        Auto => "auto",
        Person => "person",
        Product => "product",
        Animal => "animal",
        Car => "car",
    }
}

choice_enum! {
    /// Which backend model family generates text/images.
    ModelChoice, "model" {
        #[default]
        Standard => "standard",
        Fast => "fast",
        Premium => "premium",
    }
}

choice_enum! {
    /// Frame shape for generated thumbnails.
    AspectRatio, "aspect ratio" {
        #[default]
        Landscape => "16:9",
        Portrait => "9:16",
        Square => "1:1",
    }
}

// ---------------------------------------------------------------------------
// Option structs
// ---------------------------------------------------------------------------

/// Default number of meme captions requested.
pub const DEFAULT_MEME_COUNT: u8 = 3;
/// Default number of thumbnails requested.
pub const DEFAULT_THUMBNAIL_COUNT: u8 = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemoverOptions {
    pub size: OutputSize,
    pub format: OutputFormat,
    pub subject_type: SubjectType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MemeGeneratorOptions {
    /// Free-form style hint, e.g. "deadpan".
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64))]
    pub style: Option<String>,
    /// Optional topic the captions should riff on.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 280))]
    pub topic: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub count: u8,
    pub model: ModelChoice,
}

impl Default for MemeGeneratorOptions {
    fn default() -> Self {
        Self {
            style: None,
            topic: None,
            count: DEFAULT_MEME_COUNT,
            model: ModelChoice::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailGeneratorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64))]
    pub style: Option<String>,
    /// Headline text to render onto the thumbnail.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(range(min = 1, max = 8))]
    pub count: u8,
    pub aspect_ratio: AspectRatio,
    pub model: ModelChoice,
}

impl Default for ThumbnailGeneratorOptions {
    fn default() -> Self {
        Self {
            style: None,
            title: None,
            count: DEFAULT_THUMBNAIL_COUNT,
            aspect_ratio: AspectRatio::default(),
            model: ModelChoice::default(),
        }
    }
}

/// Options for one of the tools. The variant selects the tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOptions {
    BackgroundRemover(BackgroundRemoverOptions),
    MemeGenerator(MemeGeneratorOptions),
    ThumbnailGenerator(ThumbnailGeneratorOptions),
}

impl ToolOptions {
    pub fn tool(&self) -> Tool {
        match self {
            ToolOptions::BackgroundRemover(_) => Tool::BackgroundRemover,
            ToolOptions::MemeGenerator(_) => Tool::MemeGenerator,
            ToolOptions::ThumbnailGenerator(_) => Tool::ThumbnailGenerator,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            ToolOptions::BackgroundRemover(o) => o.validate()?,
            ToolOptions::MemeGenerator(o) => o.validate()?,
            ToolOptions::ThumbnailGenerator(o) => o.validate()?,
        }
        Ok(())
    }
}

impl From<BackgroundRemoverOptions> for ToolOptions {
    fn from(o: BackgroundRemoverOptions) -> Self {
        ToolOptions::BackgroundRemover(o)
    }
}

impl From<MemeGeneratorOptions> for ToolOptions {
    fn from(o: MemeGeneratorOptions) -> Self {
        ToolOptions::MemeGenerator(o)
    }
}

impl From<ThumbnailGeneratorOptions> for ToolOptions {
    fn from(o: ThumbnailGeneratorOptions) -> Self {
        ToolOptions::ThumbnailGenerator(o)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- Tool ----------------------------------------------------------------

    #[test]
    fn slugs_are_kebab_case() {
        assert_eq!(Tool::BackgroundRemover.slug(), "background-remover");
        assert_eq!(Tool::MemeGenerator.to_string(), "meme-generator");
        assert_eq!(Tool::ThumbnailGenerator.slug(), "thumbnail-generator");
    }

    #[test]
    fn options_select_tool() {
        let opts: ToolOptions = MemeGeneratorOptions::default().into();
        assert_eq!(opts.tool(), Tool::MemeGenerator);
    }

    // -- choice enums --------------------------------------------------------

    #[test]
    fn parse_choices_case_insensitive() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!(" person ".parse::<SubjectType>().unwrap(), SubjectType::Person);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
    }

    #[test]
    fn unknown_choice_lists_valid_values() {
        let err = "tiff".parse::<OutputFormat>().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("png, webp, jpg"));
    }

    // -- validation ----------------------------------------------------------

    #[test]
    fn default_options_are_valid() {
        assert!(ToolOptions::from(BackgroundRemoverOptions::default()).validate().is_ok());
        assert!(ToolOptions::from(MemeGeneratorOptions::default()).validate().is_ok());
        assert!(ToolOptions::from(ThumbnailGeneratorOptions::default()).validate().is_ok());
    }

    #[test]
    fn meme_count_out_of_range_rejected() {
        let opts = ToolOptions::from(MemeGeneratorOptions {
            count: 0,
            ..Default::default()
        });
        assert_matches!(opts.validate(), Err(CoreError::Validation(_)));

        let opts = ToolOptions::from(MemeGeneratorOptions {
            count: 11,
            ..Default::default()
        });
        assert!(opts.validate().is_err());
    }

    #[test]
    fn thumbnail_count_capped_at_eight() {
        let opts = ToolOptions::from(ThumbnailGeneratorOptions {
            count: 9,
            ..Default::default()
        });
        assert!(opts.validate().is_err());
    }

    #[test]
    fn overlong_style_rejected() {
        let opts = ToolOptions::from(MemeGeneratorOptions {
            style: Some("x".repeat(65)),
            ..Default::default()
        });
        assert!(opts.validate().is_err());
    }

    // -- serialization -------------------------------------------------------

    #[test]
    fn options_serialize_camel_case_without_tag() {
        let opts = ToolOptions::from(BackgroundRemoverOptions {
            subject_type: SubjectType::Product,
            ..Default::default()
        });
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"size": "full", "format": "png", "subjectType": "product"})
        );
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let json = serde_json::to_value(ThumbnailGeneratorOptions::default()).unwrap();
        assert!(json.get("style").is_none());
        assert_eq!(json["aspectRatio"], "16:9");
        assert_eq!(json["count"], 4);
    }
}
