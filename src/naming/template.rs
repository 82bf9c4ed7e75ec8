//! Path template grammar
//!
//! A template is a relative path whose components may contain placeholders:
//! `{name}` or `{name:spec}`, with `{{` and `}}` for literal braces. Only `date`
//! accepts a spec (chrono strftime). Templates are parsed once, up front, so every
//! grammar error surfaces as a configuration error before any download starts.

use super::FormatVariables;
use crate::error::TemplateError;
use chrono::format::{Item, StrftimeItems};
use std::fmt::Write as _;

/// Rendering of `{date}` without a spec
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// The closed set of template variables
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variable {
    /// Attachment filename without extension
    Filename,
    /// Attachment extension without the dot
    Ext,
    /// Message id
    MessageId,
    /// Attachment id
    Id,
    /// Message timestamp
    Date,
    /// Author username
    Username,
    /// Author id
    UserId,
    /// Channel id
    ChannelId,
    /// Channel name (server channels only)
    ChannelName,
    /// Channel topic (server channels only)
    ChannelTopic,
    /// Server id (server channels only)
    ServerId,
    /// Server name (server channels only)
    ServerName,
    /// Server owner's user id (server channels only)
    ServerOwnerId,
}

impl Variable {
    /// Every variable, in documentation order
    pub const ALL: [Variable; 13] = [
        Variable::Filename,
        Variable::Ext,
        Variable::MessageId,
        Variable::Id,
        Variable::Date,
        Variable::Username,
        Variable::UserId,
        Variable::ChannelId,
        Variable::ChannelName,
        Variable::ChannelTopic,
        Variable::ServerId,
        Variable::ServerName,
        Variable::ServerOwnerId,
    ];

    /// Name as written inside braces
    pub fn name(self) -> &'static str {
        match self {
            Variable::Filename => "filename",
            Variable::Ext => "ext",
            Variable::MessageId => "message_id",
            Variable::Id => "id",
            Variable::Date => "date",
            Variable::Username => "username",
            Variable::UserId => "user_id",
            Variable::ChannelId => "channel_id",
            Variable::ChannelName => "channel_name",
            Variable::ChannelTopic => "channel_topic",
            Variable::ServerId => "server_id",
            Variable::ServerName => "server_name",
            Variable::ServerOwnerId => "server_owner_id",
        }
    }

    /// Look a variable up by its placeholder name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

/// One piece of a path component
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
    /// Literal text
    Literal(String),
    /// A variable, with a strftime spec for `date`
    Placeholder {
        /// Which variable
        variable: Variable,
        /// Date format spec
        format: Option<String>,
    },
}

/// One path component (directory or final filename) of a template
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pieces: Vec<Piece>,
}

impl Segment {
    /// Pieces in order
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Substitute variables; the result is not yet sanitized
    pub fn expand(&self, vars: &FormatVariables<'_>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Placeholder {
                    variable: Variable::Date,
                    format,
                } => {
                    let spec = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                    write!(out, "{}", vars.date().format(spec)).map_err(|_| {
                        TemplateError::InvalidDateFormat {
                            spec: spec.to_string(),
                        }
                    })?;
                }
                Piece::Placeholder { variable, .. } => {
                    let value = vars.text(*variable).ok_or_else(|| TemplateError::Unresolved {
                        name: variable.name().to_string(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// A parsed path template: directory segments followed by a filename segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template string
    ///
    /// Components are split on the platform path separator. Empty components
    /// (`a//b`, trailing `/`) are ignored.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let malformed = |reason: &str| TemplateError::Malformed {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut current = Segment::default();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(malformed("nested '{' in placeholder")),
                            Some(ch) => inner.push(ch),
                            None => return Err(malformed("unclosed '{'")),
                        }
                    }
                    if !literal.is_empty() {
                        current.pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    current.pieces.push(parse_placeholder(&inner, template)?);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("single '}' outside a placeholder")),
                c if std::path::is_separator(c) => {
                    if !literal.is_empty() {
                        current.pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            current.pieces.push(Piece::Literal(literal));
        }
        if !current.is_empty() {
            segments.push(current);
        }

        if segments.is_empty() {
            return Err(malformed("template has no filename component"));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The template as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All segments; the last one is the filename
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether any placeholder references a server-only variable
    pub fn uses_server_variables(&self) -> bool {
        self.segments.iter().flat_map(|s| s.pieces().iter()).any(|p| {
            matches!(
                p,
                Piece::Placeholder {
                    variable: Variable::ChannelName
                        | Variable::ChannelTopic
                        | Variable::ServerId
                        | Variable::ServerName
                        | Variable::ServerOwnerId,
                    ..
                }
            )
        })
    }
}

fn parse_placeholder(inner: &str, template: &str) -> Result<Piece, TemplateError> {
    let (name, spec) = match inner.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec)),
        None => (inner.trim(), None),
    };
    if name.is_empty() {
        return Err(TemplateError::Malformed {
            template: template.to_string(),
            reason: "empty placeholder".to_string(),
        });
    }

    let variable = Variable::from_name(name).ok_or_else(|| TemplateError::UnknownVariable {
        name: name.to_string(),
    })?;

    let format = match spec {
        None | Some("") => None,
        Some(spec) if variable == Variable::Date => {
            if StrftimeItems::new(spec).any(|item| matches!(item, Item::Error)) {
                return Err(TemplateError::InvalidDateFormat {
                    spec: spec.to_string(),
                });
            }
            Some(spec.to_string())
        }
        Some(spec) => {
            return Err(TemplateError::UnsupportedFormat {
                name: name.to_string(),
                spec: spec.to_string(),
            });
        }
    };

    Ok(Piece::Placeholder { variable, format })
}
