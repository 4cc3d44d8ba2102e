//! Endpoint URL construction.

/// Strip trailing slashes so paths can be appended with a single `/`.
///
/// ```
/// use threadchat::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta//"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and a relative path with exactly one slash.
pub fn construct_api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        path.trim_start_matches('/')
    )
}

/// `{base}/models/{model}:{method}`. A model given as `models/<name>` is
/// accepted as well.
///
/// ```
/// use threadchat::utils::url::model_method_url;
///
/// assert_eq!(
///     model_method_url("http://localhost:8080/v1beta/", "gemini-pro", "streamGenerateContent"),
///     "http://localhost:8080/v1beta/models/gemini-pro:streamGenerateContent"
/// );
/// ```
pub fn model_method_url(base_url: &str, model: &str, method: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    construct_api_url(base_url, &format!("models/{model}:{method}"))
}
