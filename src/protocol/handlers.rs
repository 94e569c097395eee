//! Request handlers for the file gateway.
//!
//! Each handler validates its path arguments through the resolver, runs the
//! matching storage or archive operation on the blocking pool, and wraps the
//! outcome in the uniform envelope. Handlers hold no state between requests.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use log::info;

use crate::archive::Cancellation;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::requests::{
    ChmodQuery, CompressRequest, CopyQuery, DecompressRequest, PathQuery, RenameQuery, WriteBody,
};
use crate::protocol::responses::{
    CompressResponse, ContentResponse, DecompressResponse, ListResponse, MessageResponse,
};
use crate::server::AppState;
use crate::storage::operations;

/// Runs blocking file-system work off the async runtime
async fn run_blocking<T, F>(work: F) -> GatewayResult<T>
where
    F: FnOnce() -> GatewayResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Runs archive work on the blocking pool. Dropping the returned future (a
/// client that went away) cancels the work at its next entry boundary.
async fn run_cancellable<T, F>(work: F) -> GatewayResult<T>
where
    F: FnOnce(&Cancellation) -> GatewayResult<T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = Cancellation::new();
    let _guard = cancel.cancel_on_drop();
    run_blocking(move || work(&cancel)).await
}

/// Liveness probe
pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse::new("pong"))
}

/// GET /files/contents?path=
pub async fn get_file_contents(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> GatewayResult<Json<ContentResponse>> {
    let Query(query) = query?;
    let path = state.resolver.resolve(query.path.as_deref())?;

    let file = run_blocking(move || operations::read_contents(&path)).await?;
    Ok(Json(ContentResponse {
        content: file.content,
        encoding: file.encoding,
    }))
}

/// GET /files/list-directory?path=
pub async fn list_directory(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> GatewayResult<Json<ListResponse>> {
    let Query(query) = query?;
    let path = state.resolver.resolve(query.path.as_deref())?;

    let files = run_blocking(move || operations::list_directory(&path)).await?;
    Ok(Json(ListResponse { files }))
}

/// PUT /files/rename?old_path=&new_path=
pub async fn rename_file(
    State(state): State<AppState>,
    query: Result<Query<RenameQuery>, QueryRejection>,
) -> GatewayResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let from = state.resolver.resolve(query.old_path.as_deref())?;
    let to = state.resolver.resolve(query.new_path.as_deref())?;

    run_blocking(move || operations::rename_entry(&from, &to, query.overwrite)).await?;
    Ok(Json(MessageResponse::new("File renamed successfully")))
}

/// POST /files/copy?src=&dest=
pub async fn copy_file(
    State(state): State<AppState>,
    query: Result<Query<CopyQuery>, QueryRejection>,
) -> GatewayResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let src = state.resolver.resolve(query.src.as_deref())?;
    let dest = state.resolver.resolve(query.dest.as_deref())?;

    run_blocking(move || operations::copy_file(&src, &dest, query.overwrite)).await?;
    Ok(Json(MessageResponse::new("File copied successfully")))
}

/// POST /files/write?path= with a `content` body field
pub async fn write_file(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
    body: WriteBody,
) -> GatewayResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let path = state.resolver.resolve(query.path.as_deref())?;
    let bytes = operations::decode_content(&body.content, body.encoding)?;

    run_blocking(move || operations::write_file(&path, &bytes)).await?;
    Ok(Json(MessageResponse::new("File written successfully")))
}

/// POST /files/delete?path=
pub async fn delete_file(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> GatewayResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let path = state.resolver.resolve(query.path.as_deref())?;

    run_blocking(move || operations::delete_file(&path)).await?;
    Ok(Json(MessageResponse::new("File deleted successfully")))
}

/// POST /files/chmod?path=&mode=
pub async fn chmod_file(
    State(state): State<AppState>,
    query: Result<Query<ChmodQuery>, QueryRejection>,
) -> GatewayResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let path = state.resolver.resolve(query.path.as_deref())?;
    let mode = query
        .mode
        .filter(|mode| !mode.trim().is_empty())
        .ok_or_else(|| GatewayError::InvalidInput("mode is required".into()))?;

    run_blocking(move || operations::change_mode(&path, &mode)).await?;
    Ok(Json(MessageResponse::new("File permissions changed successfully")))
}

/// POST /files/compress with `{sources, destination, overwrite}`
pub async fn compress_files(
    State(state): State<AppState>,
    body: Result<Json<CompressRequest>, JsonRejection>,
) -> GatewayResult<Json<CompressResponse>> {
    let Json(request) = body?;

    let sources = request
        .sources
        .iter()
        .map(|source| state.resolver.resolve(Some(source)))
        .collect::<Result<Vec<_>, _>>()?;

    // An archive destination outside the root is a bad argument for this operation
    let destination = state
        .resolver
        .resolve(request.destination.as_deref())
        .map_err(|e| match e {
            GatewayError::PathRejected(path) => {
                GatewayError::InvalidInput(format!("archive destination {} is outside the allowed root", path))
            }
            other => other,
        })?;

    let engine = state.engine.clone();
    let summary = run_cancellable(move |cancel| {
        engine.compress(&sources, &destination, request.overwrite, cancel)
    })
    .await?;

    info!("Compress request produced {} entries", summary.entries);
    Ok(Json(CompressResponse {
        message: "Files compressed successfully".into(),
        entries: summary.entries,
        size: summary.size,
    }))
}

/// POST /files/decompress with `{source, destination, overwrite}`
pub async fn decompress_file(
    State(state): State<AppState>,
    body: Result<Json<DecompressRequest>, JsonRejection>,
) -> GatewayResult<Json<DecompressResponse>> {
    let Json(request) = body?;
    let source = state.resolver.resolve(request.source.as_deref())?;
    let destination = state.resolver.resolve(request.destination.as_deref())?;

    let engine = state.engine.clone();
    let summary = run_cancellable(move |cancel| {
        engine.decompress(&source, &destination, request.overwrite, cancel)
    })
    .await?;

    Ok(Json(DecompressResponse {
        message: "Archive decompressed successfully".into(),
        entries: summary.entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dropped_request_cancels_blocking_work() {
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (stopped_tx, stopped_rx) = mpsc::channel();

        let request = tokio::spawn(run_cancellable(move |cancel: &Cancellation| {
            let _ = started_tx.send(());
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            let _ = stopped_tx.send(());
            cancel.check()
        }));

        started_rx.await.unwrap();
        request.abort();

        let stopped = tokio::task::spawn_blocking(move || stopped_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_completed_work_returns_its_result() {
        let entries = run_cancellable(|cancel: &Cancellation| {
            cancel.check()?;
            Ok(3usize)
        })
        .await
        .unwrap();
        assert_eq!(entries, 3);
    }
}
