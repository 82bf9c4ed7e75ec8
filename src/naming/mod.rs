//! Destination paths for attachments
//!
//! A [`PathBuilder`] holds the parsed channel and DM templates and turns the
//! [`FormatVariables`] of one (message, attachment) pair into a sanitized path under
//! the download root. Building a path performs no I/O.

mod sanitize;
mod template;

pub use sanitize::{
    MAX_FILENAME_CHARS, NamingRules, sanitize_dirname, sanitize_filename, truncate_filename,
};
pub use template::{DEFAULT_DATE_FORMAT, PathTemplate, Piece, Segment, Variable};

use crate::config::NamingConfig;
use crate::error::{Result, TemplateError};
use crate::types::{Attachment, Channel, Guild, Message};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Channel-level template variables, resolved once per channel
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelVariables {
    /// Channel id
    pub channel_id: String,
    /// Channel name (server channels)
    pub channel_name: Option<String>,
    /// Channel topic (server channels; empty when unset)
    pub channel_topic: Option<String>,
    /// Owning server, absent for direct messages
    pub server: Option<ServerVariables>,
}

/// Server-level template variables
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerVariables {
    /// Server id
    pub server_id: String,
    /// Server name
    pub server_name: String,
    /// Server owner's user id
    pub server_owner_id: String,
}

impl ChannelVariables {
    /// Variables for a direct-message channel
    pub fn direct_message(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Self::default()
        }
    }

    /// Variables from fetched channel metadata and, for server channels, its server
    pub fn from_metadata(channel: &Channel, guild: Option<&Guild>) -> Self {
        match guild {
            Some(guild) => Self {
                channel_id: channel.id.clone(),
                channel_name: Some(channel.name.clone().unwrap_or_default()),
                channel_topic: Some(channel.topic.clone().unwrap_or_default()),
                server: Some(ServerVariables {
                    server_id: guild.id.clone(),
                    server_name: guild.name.clone(),
                    server_owner_id: guild.owner_id.clone(),
                }),
            },
            None => Self::direct_message(channel.id.clone()),
        }
    }

    /// True for direct-message channels
    pub fn is_direct_message(&self) -> bool {
        self.server.is_none()
    }
}

/// Template input for one (message, attachment) pair merged with channel variables
///
/// Built fresh for every attachment and never mutated.
#[derive(Clone, Copy, Debug)]
pub struct FormatVariables<'a> {
    message: &'a Message,
    attachment: &'a Attachment,
    channel: &'a ChannelVariables,
}

impl<'a> FormatVariables<'a> {
    /// Combine message, attachment and channel data
    pub fn new(
        message: &'a Message,
        attachment: &'a Attachment,
        channel: &'a ChannelVariables,
    ) -> Self {
        Self {
            message,
            attachment,
            channel,
        }
    }

    /// Message timestamp
    pub fn date(&self) -> DateTime<FixedOffset> {
        self.message.timestamp
    }

    /// Channel-level variables
    pub fn channel(&self) -> &ChannelVariables {
        self.channel
    }

    /// Text value of a variable; `None` when the channel does not carry it
    ///
    /// `date` is rendered through its format spec instead; here it yields `None`.
    pub fn text(&self, variable: Variable) -> Option<&'a str> {
        let server = self.channel.server.as_ref();
        match variable {
            Variable::Filename => Some(self.attachment.stem()),
            Variable::Ext => Some(self.attachment.extension()),
            Variable::MessageId => Some(&self.message.id),
            Variable::Id => Some(&self.attachment.id),
            Variable::Date => None,
            Variable::Username => Some(&self.message.author.username),
            Variable::UserId => Some(&self.message.author.id),
            Variable::ChannelId => Some(&self.channel.channel_id),
            Variable::ChannelName => self.channel.channel_name.as_deref(),
            Variable::ChannelTopic => self.channel.channel_topic.as_deref(),
            Variable::ServerId => server.map(|s| s.server_id.as_str()),
            Variable::ServerName => server.map(|s| s.server_name.as_str()),
            Variable::ServerOwnerId => server.map(|s| s.server_owner_id.as_str()),
        }
    }
}

/// Parsed templates plus naming rules
#[derive(Clone, Debug)]
pub struct PathBuilder {
    channel_template: PathTemplate,
    dm_template: PathTemplate,
    rules: NamingRules,
}

impl PathBuilder {
    /// Parse both templates from configuration
    pub fn new(config: &NamingConfig) -> Result<Self> {
        Ok(Self {
            channel_template: PathTemplate::parse(&config.channel_format)?,
            dm_template: PathTemplate::parse(&config.dm_format)?,
            rules: NamingRules::new(config.windows_filenames, config.restrict_filenames),
        })
    }

    /// Template used for these variables: the DM one when no server is attached
    pub fn template_for(&self, vars: &FormatVariables<'_>) -> &PathTemplate {
        if vars.channel().is_direct_message() {
            &self.dm_template
        } else {
            &self.channel_template
        }
    }

    /// Destination path for one attachment under `base`
    pub fn build(
        &self,
        vars: &FormatVariables<'_>,
        base: &Path,
    ) -> std::result::Result<PathBuf, TemplateError> {
        build_path(vars, base, self.template_for(vars), self.rules)
    }
}

/// Expand and sanitize `template` segment by segment and join the result onto `base`
///
/// Directory segments that come out empty or `.` are dropped and `..` becomes `_`,
/// so the result always stays under `base`.
pub fn build_path(
    vars: &FormatVariables<'_>,
    base: &Path,
    template: &PathTemplate,
    rules: NamingRules,
) -> std::result::Result<PathBuf, TemplateError> {
    let segments = template.segments();
    let mut path = base.to_path_buf();

    let Some((filename, dirs)) = segments.split_last() else {
        return Err(TemplateError::Malformed {
            template: template.as_str().to_string(),
            reason: "template has no filename component".to_string(),
        });
    };

    for segment in dirs {
        let dir = sanitize_dirname(&segment.expand(vars)?, rules);
        match dir.as_str() {
            "" | "." => continue,
            ".." => path.push("_"),
            _ => path.push(dir),
        }
    }

    let name = truncate_filename(&sanitize_filename(&filename.expand(vars)?, rules));
    match name.as_str() {
        "" | "." | ".." => path.push("_"),
        _ => path.push(name),
    }

    Ok(path)
}
