/// The filesystem path of a request's document, or an early `Ok(None)` from
/// the handler when the URI is not a file.
macro_rules! params_path {
    ($uri:expr) => {
        match $uri.to_file_path() {
            Ok(path) => path,
            Err(()) => {
                tracing::debug!("ignoring request for non-file uri {}", $uri);
                return Ok(None);
            }
        }
    };
}

/// Path and cursor position of a `TextDocumentPositionParams`.
macro_rules! params_position_path {
    ($params:expr) => {
        (
            params_path!($params.text_document.uri),
            $params.position,
        )
    };
}
