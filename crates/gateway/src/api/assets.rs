//! Widget asset serving (spec.md §4.7, §6): static HTML/JS/CSS re-read from
//! disk on every fetch so UI rebuilds propagate without a restart. Path
//! containment check follows the teacher's workspace-path-validation idiom
//! (`sa_tools::file_ops::validate_path`), applied to a read-only asset root.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

fn content_type(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// `GET /assets/<name>.html|.js|.css|.png|…`
pub async fn serve_asset(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let requested = std::path::Path::new(&name);
    if requested.is_absolute() || requested.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Ok(root) = state.assets_dir.canonicalize() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let candidate = root.join(requested);
    let Ok(resolved) = candidate.canonicalize() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !resolved.starts_with(&root) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type(&name)),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type("widget.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("widget.js"), "text/javascript; charset=utf-8");
        assert_eq!(content_type("widget.unknown"), "application/octet-stream");
    }
}
