//! Typed requests. Every verb the gateway understands is a variant of
//! [`Request`]; adding one forces every `match` over it to be updated.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::lenient::{object_or_json_string, option_scalar_or_string};

macro_rules! command_kinds {
    ($($name:ident),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $($name),+
        }

        impl CommandKind {
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$name),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$name => stringify!($name)),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($name) => Some(CommandKind::$name),)+
                    _ => None,
                }
            }
        }
    };
}

command_kinds!(
    ListAllowedDirectories,
    ReadFile,
    WebReadFile,
    WriteFile,
    AppendFile,
    EditFile,
    ListDirectory,
    FileInfo,
    CopyFile,
    MoveFile,
    RenameFile,
    DeleteFile,
    CreateDirectory,
    SearchFiles,
    DownloadFile,
);

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileArgs {
    pub file_path: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebReadFileArgs {
    #[serde(alias = "filePath")]
    pub url: String,
}

/// Shared by `WriteFile`, `AppendFile` and `EditFile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentArgs {
    pub file_path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePathArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDirectoryArgs {
    pub directory_path: String,
    #[serde(default, deserialize_with = "option_scalar_or_string")]
    pub show_hidden: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryArgs {
    pub directory_path: String,
}

/// Source/destination pair for copy, move and rename.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferArgs {
    pub source_path: String,
    pub destination_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeFilter {
    #[default]
    All,
    File,
    #[serde(alias = "dir")]
    Directory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(
        default,
        deserialize_with = "option_scalar_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub case_sensitive: Option<bool>,
    #[serde(
        default,
        deserialize_with = "option_scalar_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub include_hidden: Option<bool>,
    #[serde(default)]
    pub file_type: FileTypeFilter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    pub search_path: String,
    pub pattern: String,
    #[serde(default, deserialize_with = "object_or_json_string")]
    pub options: SearchOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlArgs {
    pub url: String,
}

#[derive(Debug, Clone)]
pub enum Request {
    ListAllowedDirectories,
    ReadFile(ReadFileArgs),
    WebReadFile(WebReadFileArgs),
    WriteFile(ContentArgs),
    AppendFile(ContentArgs),
    EditFile(ContentArgs),
    ListDirectory(ListDirectoryArgs),
    FileInfo(FilePathArgs),
    CopyFile(TransferArgs),
    MoveFile(TransferArgs),
    RenameFile(TransferArgs),
    DeleteFile(FilePathArgs),
    CreateDirectory(DirectoryArgs),
    SearchFiles(SearchArgs),
    DownloadFile(UrlArgs),
}

impl Request {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ListAllowedDirectories => CommandKind::ListAllowedDirectories,
            Self::ReadFile(_) => CommandKind::ReadFile,
            Self::WebReadFile(_) => CommandKind::WebReadFile,
            Self::WriteFile(_) => CommandKind::WriteFile,
            Self::AppendFile(_) => CommandKind::AppendFile,
            Self::EditFile(_) => CommandKind::EditFile,
            Self::ListDirectory(_) => CommandKind::ListDirectory,
            Self::FileInfo(_) => CommandKind::FileInfo,
            Self::CopyFile(_) => CommandKind::CopyFile,
            Self::MoveFile(_) => CommandKind::MoveFile,
            Self::RenameFile(_) => CommandKind::RenameFile,
            Self::DeleteFile(_) => CommandKind::DeleteFile,
            Self::CreateDirectory(_) => CommandKind::CreateDirectory,
            Self::SearchFiles(_) => CommandKind::SearchFiles,
            Self::DownloadFile(_) => CommandKind::DownloadFile,
        }
    }

    /// Build a request from a command name and its flat parameter map.
    pub fn from_params(command: &str, params: Map<String, Value>) -> GatewayResult<Self> {
        let kind = CommandKind::from_name(command)
            .ok_or_else(|| GatewayError::UnknownAction(command.to_string()))?;
        let params = Value::Object(params);
        Ok(match kind {
            CommandKind::ListAllowedDirectories => Self::ListAllowedDirectories,
            CommandKind::ReadFile => Self::ReadFile(args(kind, params)?),
            CommandKind::WebReadFile => Self::WebReadFile(args(kind, params)?),
            CommandKind::WriteFile => Self::WriteFile(args(kind, params)?),
            CommandKind::AppendFile => Self::AppendFile(args(kind, params)?),
            CommandKind::EditFile => Self::EditFile(args(kind, params)?),
            CommandKind::ListDirectory => Self::ListDirectory(args(kind, params)?),
            CommandKind::FileInfo => Self::FileInfo(args(kind, params)?),
            CommandKind::CopyFile => Self::CopyFile(args(kind, params)?),
            CommandKind::MoveFile => Self::MoveFile(args(kind, params)?),
            CommandKind::RenameFile => Self::RenameFile(args(kind, params)?),
            CommandKind::DeleteFile => Self::DeleteFile(args(kind, params)?),
            CommandKind::CreateDirectory => Self::CreateDirectory(args(kind, params)?),
            CommandKind::SearchFiles => Self::SearchFiles(args(kind, params)?),
            CommandKind::DownloadFile => Self::DownloadFile(args(kind, params)?),
        })
    }
}

fn args<T: DeserializeOwned>(kind: CommandKind, params: Value) -> GatewayResult<T> {
    serde_json::from_value(params)
        .map_err(|e| GatewayError::MalformedRequest(format!("invalid parameters for {kind}: {e}")))
}
