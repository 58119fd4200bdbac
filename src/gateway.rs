use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_recursion::async_recursion;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::allowed::AllowedDirs;
use crate::config::{GatewayConfig, Limits};
use crate::download::{self, DownloadRegistry};
use crate::error::{GatewayError, GatewayResult, io_err};
use crate::extract::{self, ContentPart, ExtractedContent};
use crate::format::{format_size, format_time, format_time_opt, modified, permissions_string};
use crate::fs_ops::TextEncoding;
use crate::path::{OperationKind, PathGuard, absolutize, real_path};
use crate::request::{
    ContentArgs, DirectoryArgs, FilePathArgs, ListDirectoryArgs, ReadFileArgs, Request,
    SearchArgs, TransferArgs, UrlArgs, WebReadFileArgs,
};
use crate::search::{SearchParams, search_paths};
use crate::trash::{DirectoryTrash, Recycler, SystemTrash};
use crate::unique::unique_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

impl EntryType {
    fn of(meta: &Metadata) -> Self {
        if meta.is_dir() { Self::Directory } else { Self::File }
    }

    fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// Stat-derived description of an existing path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: u64,
    pub size_formatted: String,
    pub last_modified: Option<String>,
    pub permissions: String,
}

impl FileMetadata {
    fn new(path: &Path, meta: &Metadata) -> Self {
        Self {
            path: display(path),
            name: file_name(path),
            kind: EntryType::of(meta),
            size: meta.len(),
            size_formatted: format_size(meta.len()),
            last_modified: modified(meta),
            permissions: permissions_string(meta),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutput {
    pub path: String,
    pub file_name: String,
    pub size: u64,
    pub size_formatted: String,
    pub last_modified: Option<String>,
    pub encoding: String,
    pub is_extracted: bool,
    pub content: ExtractedContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutput {
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed: Option<bool>,
    pub size: u64,
    pub size_formatted: String,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutput {
    pub message: String,
    pub source: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed: Option<bool>,
    pub size: u64,
    pub size_formatted: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: Option<u64>,
    pub size_formatted: Option<String>,
    pub last_modified: Option<String>,
    pub permissions: String,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutput {
    pub path: String,
    pub items: Vec<ListItem>,
    pub total_items: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoOutput {
    #[serde(flatten)]
    pub meta: FileMetadata,
    pub directory: String,
    pub extension: String,
    pub last_accessed: Option<String>,
    pub created: Option<String>,
    pub is_directory: bool,
    pub is_file: bool,
    pub is_symbolic_link: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub path: String,
    pub name: String,
    pub directory: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: Option<u64>,
    pub size_formatted: Option<String>,
    pub last_modified: Option<String>,
    pub relative_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutput {
    pub message: String,
    pub path: String,
    pub original_path: String,
    pub renamed: bool,
    pub source_url: String,
    pub detached: bool,
}

/// Owns the immutable configuration and performs every file operation.
pub struct FileGateway {
    config: GatewayConfig,
    guard: PathGuard,
    download_dir: PathBuf,
    http: Client,
    downloads: DownloadRegistry,
    recycler: Arc<dyn Recycler>,
}

impl FileGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let guard = PathGuard::new(AllowedDirs::new(config.allowed_dirs.clone()));
        let http = download::build_client(config.connect_timeout)?;
        let recycler: Arc<dyn Recycler> = match &config.trash_dir {
            Some(dir) => Arc::new(DirectoryTrash::new(absolutize(&dir.to_string_lossy()))),
            None => Arc::new(SystemTrash),
        };
        let download_dir = absolutize(&config.download_dir.to_string_lossy());
        Ok(Self {
            config,
            guard,
            download_dir,
            http,
            downloads: DownloadRegistry::default(),
            recycler,
        })
    }

    pub fn downloads(&self) -> &DownloadRegistry {
        &self.downloads
    }

    fn limits(&self) -> Limits {
        self.config.limits
    }

    /// Run one request to completion and return its `data` payload.
    pub async fn execute(&self, request: Request) -> GatewayResult<Value> {
        match request {
            Request::ListAllowedDirectories => self.list_allowed_directories().await,
            Request::ReadFile(args) => to_json(self.read_file(args).await?),
            Request::WebReadFile(args) => to_json(self.web_read_file(args).await?),
            Request::WriteFile(args) => to_json(self.write_file(args).await?),
            Request::AppendFile(args) => to_json(self.append_file(args).await?),
            Request::EditFile(args) => to_json(self.edit_file(args).await?),
            Request::ListDirectory(args) => to_json(self.list_directory(args).await?),
            Request::FileInfo(args) => to_json(self.file_info(args).await?),
            Request::CopyFile(args) => to_json(self.copy_file(args).await?),
            Request::MoveFile(args) => to_json(self.move_file(args).await?),
            Request::RenameFile(args) => to_json(self.rename_file(args).await?),
            Request::DeleteFile(args) => self.delete_file(args).await,
            Request::CreateDirectory(args) => self.create_directory(args).await,
            Request::SearchFiles(args) => self.search_files(args).await,
            Request::DownloadFile(args) => to_json(self.download_file(args).await?),
        }
    }

    pub async fn read_file(&self, args: ReadFileArgs) -> GatewayResult<ReadOutput> {
        debug!(file_path = %args.file_path, encoding = ?args.encoding, "reading file");
        let path = self.guard.check(&args.file_path, OperationKind::ReadFile)?;
        let encoding = parse_encoding(args.encoding.as_deref())?;

        let meta = fs::metadata(&path).await.map_err(io_err(&path))?;
        if meta.is_dir() {
            return Err(GatewayError::external(format!(
                "'{}' is a directory, not a file",
                path.display()
            )));
        }
        let max = self.limits().max_file_size;
        if meta.len() > max {
            return Err(GatewayError::SizeLimitExceeded(format!(
                "File too large: {} exceeds limit of {}",
                format_size(meta.len()),
                format_size(max)
            )));
        }

        let bytes = fs::read(&path).await.map_err(io_err(&path))?;
        let extraction = extract::extract(&path, bytes, encoding)
            .await
            .map_err(|e| GatewayError::External(e.context("Failed to read or process file")))?;

        Ok(ReadOutput {
            path: display(&path),
            file_name: file_name(&path),
            size: meta.len(),
            size_formatted: format_size(meta.len()),
            last_modified: modified(&meta),
            encoding: extraction.encoding,
            is_extracted: extraction.is_extracted,
            content: extraction.content,
            local_path: None,
            original_url: None,
        })
    }

    pub async fn web_read_file(&self, args: WebReadFileArgs) -> GatewayResult<ReadOutput> {
        let context = "Failed to read or download file from URL";
        let url = download::parse_url(&args.url)
            .map_err(|e| GatewayError::External(e.context(context)))?;
        let name = download::file_name_from_url(&url)
            .map_err(|e| GatewayError::External(e.context(context)))?;

        fs::create_dir_all(&self.download_dir)
            .await
            .map_err(io_err(&self.download_dir))?;
        let local = self.download_dir.join(&name);
        debug!(%url, local = %local.display(), "downloading file for read");
        download::fetch_to_file(&self.http, url, &local, self.limits().max_file_size)
            .await
            .map_err(|e| GatewayError::External(e.context(context)))?;

        let mut out = self
            .read_file(ReadFileArgs {
                file_path: display(&local),
                encoding: None,
            })
            .await?;
        if let ExtractedContent::Parts(parts) = &mut out.content
            && let Some(first) = parts.first_mut()
            && matches!(first, ContentPart::Text { .. })
        {
            *first = ContentPart::text(format!(
                "read file '{}' from URL and saved it locally",
                out.file_name
            ));
        }
        out.local_path = Some(display(&local));
        out.original_url = Some(args.url);
        Ok(out)
    }

    pub async fn write_file(&self, args: ContentArgs) -> GatewayResult<WriteOutput> {
        debug!(file_path = %args.file_path, content_length = args.content.len(), "writing file");
        let path = self.guard.check(&args.file_path, OperationKind::WriteFile)?;
        let bytes = self.encode_capped(&args)?;

        let (target, renamed) = unique_path(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        fs::write(&target, &bytes).await.map_err(io_err(&target))?;
        let meta = fs::metadata(&target).await.map_err(io_err(&target))?;

        let message = if renamed {
            format!(
                "A file named \"{}\" already exists; created \"{}\" instead",
                file_name(&path),
                file_name(&target)
            )
        } else {
            "File written successfully".to_string()
        };

        Ok(WriteOutput {
            message,
            path: display(&target),
            original_path: Some(display(&path)),
            renamed: Some(renamed),
            size: meta.len(),
            size_formatted: format_size(meta.len()),
            last_modified: modified(&meta),
        })
    }

    pub async fn append_file(&self, args: ContentArgs) -> GatewayResult<WriteOutput> {
        debug!(
            file_path = %args.file_path,
            content_length = args.content.len(),
            "appending to file"
        );
        let path = self.guard.check(&args.file_path, OperationKind::AppendFile)?;
        let encoding = parse_encoding(args.encoding.as_deref())?;
        let bytes = encoding.encode(&args.content)?;

        let existing = match fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(io_err(&path)(err)),
        };
        let max = self.limits().max_file_size;
        if existing + bytes.len() as u64 > max {
            return Err(GatewayError::SizeLimitExceeded(format!(
                "File would be too large after append: exceeds limit of {}",
                format_size(max)
            )));
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err(&path))?;
        file.write_all(&bytes).await.map_err(io_err(&path))?;
        file.flush().await.map_err(io_err(&path))?;
        let meta = fs::metadata(&path).await.map_err(io_err(&path))?;

        Ok(WriteOutput {
            message: "Content appended successfully".to_string(),
            path: display(&path),
            original_path: None,
            renamed: None,
            size: meta.len(),
            size_formatted: format_size(meta.len()),
            last_modified: modified(&meta),
        })
    }

    /// Overwrite an existing regular file. Never creates files.
    pub async fn edit_file(&self, args: ContentArgs) -> GatewayResult<WriteOutput> {
        debug!(file_path = %args.file_path, content_length = args.content.len(), "editing file");
        let path = self.guard.check(&args.file_path, OperationKind::EditFile)?;

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(GatewayError::external(
                    "Path points to a directory, not a file. Cannot edit.",
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(GatewayError::NotFound(format!(
                    "File not found at '{}'. Use WriteFile to create a new file.",
                    args.file_path
                )));
            }
            Err(err) => return Err(io_err(&path)(err)),
        }

        let bytes = self.encode_capped(&args)?;
        fs::write(&path, &bytes).await.map_err(io_err(&path))?;
        let meta = fs::metadata(&path).await.map_err(io_err(&path))?;

        Ok(WriteOutput {
            message: "File edited successfully".to_string(),
            path: display(&path),
            original_path: None,
            renamed: None,
            size: meta.len(),
            size_formatted: format_size(meta.len()),
            last_modified: modified(&meta),
        })
    }

    pub async fn list_directory(&self, args: ListDirectoryArgs) -> GatewayResult<ListOutput> {
        let show_hidden = args.show_hidden.unwrap_or(self.config.show_hidden);
        debug!(directory_path = %args.directory_path, show_hidden, "listing directory");
        let path = self.guard.check(&args.directory_path, OperationKind::ListDirectory)?;

        let mut names = read_dir_names(&path).await?;
        if !show_hidden {
            names.retain(|n| !n.starts_with('.'));
        }
        let max = self.limits().max_directory_items;
        let truncated = names.len() > max;
        names.truncate(max);

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let item_path = path.join(&name);
            let meta = match fs::metadata(&item_path).await {
                Ok(meta) => meta,
                Err(err) => {
                    debug!(path = %item_path.display(), "skipping entry that cannot be stat'ed: {err}");
                    continue;
                }
            };
            let is_file = meta.is_file();
            items.push(ListItem {
                is_hidden: name.starts_with('.'),
                name,
                path: display(&item_path),
                kind: EntryType::of(&meta),
                size: is_file.then(|| meta.len()),
                size_formatted: is_file.then(|| format_size(meta.len())),
                last_modified: modified(&meta),
                permissions: permissions_string(&meta),
            });
        }

        Ok(ListOutput {
            path: display(&path),
            total_items: items.len(),
            items,
            truncated,
        })
    }

    pub async fn file_info(&self, args: FilePathArgs) -> GatewayResult<FileInfoOutput> {
        debug!(file_path = %args.file_path, "getting file info");
        let path = self.guard.check(&args.file_path, OperationKind::FileInfo)?;
        let meta = fs::metadata(&path).await.map_err(io_err(&path))?;
        let is_symbolic_link = fs::symlink_metadata(&path)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        Ok(FileInfoOutput {
            directory: path.parent().map(display).unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            last_accessed: format_time_opt(meta.accessed()),
            created: format_time_opt(meta.created()),
            is_directory: meta.is_dir(),
            is_file: meta.is_file(),
            is_symbolic_link,
            meta: FileMetadata::new(&path, &meta),
        })
    }

    pub async fn copy_file(&self, args: TransferArgs) -> GatewayResult<TransferOutput> {
        debug!(source = %args.source_path, destination = %args.destination_path, "copying file");
        let (source, destination) =
            self.guard
                .check_pair(&args.source_path, &args.destination_path, OperationKind::CopyFile)?;
        let meta = source_metadata(&source, &args.source_path).await?;
        let max = self.limits().max_file_size;

        let (target, renamed) = unique_path(&destination);
        let size = if meta.is_dir() {
            if !self.config.recursive {
                return Err(GatewayError::external(format!(
                    "Recursive operations are disabled; cannot copy directory '{}'",
                    args.source_path
                )));
            }
            if real_path(&target).starts_with(real_path(&source)) {
                return Err(GatewayError::external(format!(
                    "Cannot copy directory '{}' into itself",
                    args.source_path
                )));
            }
            copy_dir_recursive(&source, &target, max).await?
        } else {
            if meta.len() > max {
                return Err(GatewayError::SizeLimitExceeded(format!(
                    "File too large to copy: {} exceeds limit of {}",
                    format_size(meta.len()),
                    format_size(max)
                )));
            }
            fs::copy(&source, &target).await.map_err(io_err(&target))?
        };

        let message = if renamed {
            format!(
                "A file named \"{}\" already exists at the destination; copied as \"{}\"",
                file_name(&destination),
                file_name(&target)
            )
        } else {
            "File copied successfully".to_string()
        };

        Ok(TransferOutput {
            message,
            source: display(&source),
            destination: display(&target),
            original_destination: Some(display(&destination)),
            renamed: Some(renamed),
            size,
            size_formatted: format_size(size),
        })
    }

    /// Rename-based move. No size cap since no bytes are copied.
    pub async fn move_file(&self, args: TransferArgs) -> GatewayResult<TransferOutput> {
        debug!(source = %args.source_path, destination = %args.destination_path, "moving file");
        let (source, destination) =
            self.guard
                .check_pair(&args.source_path, &args.destination_path, OperationKind::MoveFile)?;
        source_metadata(&source, &args.source_path).await?;

        let (target, renamed) = unique_path(&destination);
        fs::rename(&source, &target).await.map_err(io_err(&source))?;
        let meta = fs::metadata(&target).await.map_err(io_err(&target))?;

        let message = if renamed {
            format!(
                "A file named \"{}\" already exists at the destination; moved and renamed to \"{}\"",
                file_name(&destination),
                file_name(&target)
            )
        } else {
            "File moved successfully".to_string()
        };

        Ok(TransferOutput {
            message,
            source: display(&source),
            destination: display(&target),
            original_destination: Some(display(&destination)),
            renamed: Some(renamed),
            size: meta.len(),
            size_formatted: format_size(meta.len()),
        })
    }

    /// Like `move_file`, but an existing destination is a hard error.
    pub async fn rename_file(&self, args: TransferArgs) -> GatewayResult<TransferOutput> {
        debug!(source = %args.source_path, destination = %args.destination_path, "renaming file");
        let (source, destination) =
            self.guard
                .check_pair(&args.source_path, &args.destination_path, OperationKind::RenameFile)?;
        source_metadata(&source, &args.source_path).await?;

        if fs::symlink_metadata(&destination).await.is_ok() {
            return Err(GatewayError::AlreadyExists(format!(
                "Destination file already exists: '{}'. Please choose a different name.",
                args.destination_path
            )));
        }

        fs::rename(&source, &destination)
            .await
            .map_err(io_err(&source))?;
        let meta = fs::metadata(&destination).await.map_err(io_err(&destination))?;

        Ok(TransferOutput {
            message: "File renamed successfully".to_string(),
            source: display(&source),
            destination: display(&destination),
            original_destination: None,
            renamed: None,
            size: meta.len(),
            size_formatted: format_size(meta.len()),
        })
    }

    pub async fn delete_file(&self, args: FilePathArgs) -> GatewayResult<Value> {
        debug!(file_path = %args.file_path, "deleting file");
        let path = self.guard.check(&args.file_path, OperationKind::DeleteFile)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            // Dangling symlinks can still be trashed.
            Err(_) => fs::symlink_metadata(&path).await.map_err(io_err(&path))?,
        };
        let kind = EntryType::of(&meta);

        let recycler = Arc::clone(&self.recycler);
        let target = path.clone();
        tokio::task::spawn_blocking(move || recycler.recycle(&target))
            .await
            .map_err(|e| GatewayError::external(format!("Trash task failed: {e}")))??;

        Ok(json!({
            "message": format!("{} moved to trash successfully", kind.label()),
            "deletedItem": {
                "path": display(&path),
                "size": meta.len(),
                "sizeFormatted": format_size(meta.len()),
                "type": kind,
            }
        }))
    }

    pub async fn create_directory(&self, args: DirectoryArgs) -> GatewayResult<Value> {
        debug!(directory_path = %args.directory_path, "creating directory");
        let path = self
            .guard
            .check(&args.directory_path, OperationKind::CreateDirectory)?;
        fs::create_dir_all(&path).await.map_err(io_err(&path))?;
        let meta = fs::metadata(&path).await.map_err(io_err(&path))?;
        let created = meta.created().or_else(|_| meta.modified()).ok().map(format_time);

        Ok(json!({
            "message": "Directory created successfully",
            "path": display(&path),
            "created": created,
        }))
    }

    pub async fn search_files(&self, args: SearchArgs) -> GatewayResult<Value> {
        debug!(
            search_path = %args.search_path,
            pattern = %args.pattern,
            options = ?args.options,
            "searching files"
        );
        let root = self.guard.check(&args.search_path, OperationKind::SearchFiles)?;
        let root_meta = fs::metadata(&root).await.map_err(io_err(&root))?;
        if !root_meta.is_dir() {
            return Err(GatewayError::external(format!(
                "Search path '{}' is not a directory",
                args.search_path
            )));
        }

        let params = SearchParams {
            case_sensitive: args.options.case_sensitive.unwrap_or(false),
            include_hidden: args.options.include_hidden.unwrap_or(self.config.show_hidden),
            file_type: args.options.file_type,
            recursive: self.config.recursive,
            max_results: self.limits().max_search_results,
        };
        let outcome = search_paths(&root, &args.pattern, params).await?;

        let mut results = Vec::with_capacity(outcome.hits.len());
        for hit in outcome.hits {
            let meta = match fs::metadata(&hit.path).await {
                Ok(meta) => meta,
                Err(err) => {
                    debug!(path = %hit.path.display(), "skipping search result that cannot be stat'ed: {err}");
                    continue;
                }
            };
            results.push(SearchResultItem {
                path: display(&hit.path),
                name: file_name(&hit.path),
                directory: hit.path.parent().map(display).unwrap_or_default(),
                kind: if hit.is_dir { EntryType::Directory } else { EntryType::File },
                size: (!hit.is_dir).then(|| meta.len()),
                size_formatted: (!hit.is_dir).then(|| format_size(meta.len())),
                last_modified: modified(&meta),
                relative_path: display(&hit.relative),
            });
        }

        Ok(json!({
            "searchPath": display(&root),
            "pattern": args.pattern,
            "totalResults": results.len(),
            "results": results,
            "truncated": outcome.truncated,
            "options": args.options,
        }))
    }

    /// Start a detached download and answer immediately with the path the
    /// file will land on.
    pub async fn download_file(&self, args: UrlArgs) -> GatewayResult<DownloadOutput> {
        let context = "Failed to initiate download";
        let url = download::parse_url(&args.url)
            .map_err(|e| GatewayError::External(e.context(context)))?;
        let name = download::file_name_from_url(&url)
            .map_err(|e| GatewayError::External(e.context(context)))?;
        let destination = self.download_dir.join(name);
        debug!(%url, destination = %destination.display(), "initiating background download");

        let destination = self
            .guard
            .check(&display(&destination), OperationKind::DownloadFile)?;
        fs::create_dir_all(&self.download_dir)
            .await
            .map_err(io_err(&self.download_dir))?;

        // Reserve the predicted name so later requests skip past it.
        let (target, renamed) = loop {
            let (candidate, renamed) = unique_path(&destination);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(_) => break (candidate, renamed),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(io_err(&candidate)(err)),
            }
        };

        let max = self.limits().max_file_size;
        self.downloads.spawn(self.http.clone(), url, target.clone(), max);

        Ok(DownloadOutput {
            message: format!(
                "Download started in the background; the file will be saved to {}",
                target.display()
            ),
            path: display(&target),
            original_path: display(&destination),
            renamed,
            source_url: args.url,
            detached: true,
        })
    }

    pub async fn list_allowed_directories(&self) -> GatewayResult<Value> {
        debug!("listing allowed directories");
        let allowed = self.guard.allowed();
        if allowed.is_empty() {
            return Err(GatewayError::external(
                "No allowed directories configured. Cannot list projects.",
            ));
        }

        let max = self.limits().max_directory_items;
        let mut roots = Map::new();
        for dir in allowed.iter() {
            let mut names = read_dir_names(&dir.configured).await?;
            names.truncate(max);
            let mut entries = Vec::with_capacity(names.len());
            for name in names {
                if let Ok(meta) = fs::metadata(dir.configured.join(&name)).await {
                    entries.push(json!({ "name": name, "type": EntryType::of(&meta) }));
                }
            }
            roots.insert(display(&dir.configured), Value::Array(entries));
        }
        Ok(json!({ "allowedRoots": roots }))
    }

    fn encode_capped(&self, args: &ContentArgs) -> GatewayResult<Vec<u8>> {
        let encoding = parse_encoding(args.encoding.as_deref())?;
        let bytes = encoding.encode(&args.content)?;
        let max = self.limits().max_file_size;
        if bytes.len() as u64 > max {
            return Err(GatewayError::SizeLimitExceeded(format!(
                "Content too large: exceeds limit of {}",
                format_size(max)
            )));
        }
        Ok(bytes)
    }
}

fn to_json<T: Serialize>(value: T) -> GatewayResult<Value> {
    serde_json::to_value(value).map_err(|e| GatewayError::External(e.into()))
}

fn parse_encoding(label: Option<&str>) -> GatewayResult<TextEncoding> {
    TextEncoding::parse(label).map_err(|e| GatewayError::MalformedRequest(e.to_string()))
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn source_metadata(source: &Path, raw: &str) -> GatewayResult<Metadata> {
    match fs::metadata(source).await {
        Ok(meta) => Ok(meta),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(GatewayError::NotFound(
            format!("Source file not found: '{raw}'"),
        )),
        Err(err) => Err(io_err(source)(err)),
    }
}

async fn read_dir_names(path: &Path) -> GatewayResult<Vec<String>> {
    let mut dir = fs::read_dir(path).await.map_err(io_err(path))?;
    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(io_err(path))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Copy a directory tree, applying the per-file size cap. Returns bytes copied.
#[async_recursion]
async fn copy_dir_recursive(src: &Path, dst: &Path, max_file_size: u64) -> GatewayResult<u64> {
    fs::create_dir_all(dst).await.map_err(io_err(dst))?;
    let mut rd = fs::read_dir(src).await.map_err(io_err(src))?;
    let mut total = 0;
    while let Some(entry) = rd.next_entry().await.map_err(io_err(src))? {
        let ty = entry.file_type().await.map_err(io_err(src))?;
        let dest_path = dst.join(entry.file_name());
        if ty.is_dir() {
            total += copy_dir_recursive(&entry.path(), &dest_path, max_file_size).await?;
        } else {
            let len = entry.metadata().await.map_err(io_err(src))?.len();
            if len > max_file_size {
                return Err(GatewayError::SizeLimitExceeded(format!(
                    "File too large to copy: '{}' is {} and exceeds limit of {}",
                    entry.path().display(),
                    format_size(len),
                    format_size(max_file_size)
                )));
            }
            total += fs::copy(entry.path(), &dest_path)
                .await
                .map_err(io_err(&dest_path))?;
        }
    }
    Ok(total)
}
